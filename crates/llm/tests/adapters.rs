//! Adapter behaviour against a scripted backend

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use ops_assist_core::{AnswerGenerator, Context, Error, GroundednessJudge, Message, Passage, Role};
use ops_assist_llm::{
    FinishReason, GenerationResult, LlmAnswerGenerator, LlmBackend, LlmError,
    LlmGroundednessJudge,
};

/// Backend replaying canned replies and recording every prompt
struct ScriptedBackend {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    seen: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedBackend {
    fn new(replies: Vec<Result<String, LlmError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            seen: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl LlmBackend for ScriptedBackend {
    async fn generate(&self, messages: &[Message]) -> Result<GenerationResult, LlmError> {
        self.seen.lock().push(messages.to_vec());
        let reply = self
            .replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::Generation("script exhausted".into())))?;
        Ok(GenerationResult {
            text: reply,
            tokens: 0,
            total_time_ms: 0,
            finish_reason: FinishReason::Stop,
        })
    }

    async fn is_available(&self) -> bool {
        true
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

fn context() -> Context {
    let mut builder = Context::builder(200);
    builder
        .try_push(
            Arc::new(Passage::new(
                "kb-12",
                "runbook",
                "Job PAYROLL_01 ends RC=8 when the input dataset is locked.",
            )),
            15,
            1,
        )
        .unwrap();
    builder.build()
}

#[tokio::test]
async fn test_generator_passes_context_and_history() {
    let backend = ScriptedBackend::new(vec![Ok("The dataset was locked [1].".into())]);
    let generator = LlmAnswerGenerator::new(backend.clone());

    let history = vec![Message::system("Remove unsupported claims.")];
    let answer = generator
        .generate("why RC=8 on PAYROLL_01?", &context(), &history)
        .await
        .unwrap();
    assert_eq!(answer, "The dataset was locked [1].");

    let seen = backend.seen.lock();
    let prompt = &seen[0];
    assert!(prompt.iter().any(|m| m.content.contains("(kb-12)")));
    assert!(prompt.iter().any(|m| m.content == "Remove unsupported claims."));
    assert_eq!(prompt.last().map(|m| m.role), Some(Role::User));
}

#[tokio::test]
async fn test_generator_error_is_generation_error() {
    let backend = ScriptedBackend::new(vec![Err(LlmError::Timeout)]);
    let generator = LlmAnswerGenerator::new(backend);

    let err = generator.generate("q", &context(), &[]).await.unwrap_err();
    assert!(matches!(err, Error::Generation(_)));
}

#[tokio::test]
async fn test_judge_parses_verdicts() {
    let backend = ScriptedBackend::new(vec![
        Ok(r#"Verdict: {"grounded": true, "confidence": 0.8, "unsupported_claims": [], "rationale": "all cited"}"#.into()),
        Ok(r#"{"useful": false, "confidence": 0.7, "rationale": "talks about a different job"}"#.into()),
    ]);
    let judge = LlmGroundednessJudge::new(backend);

    let grounded = judge.judge_groundedness("locked [1]", &context()).await.unwrap();
    assert!(grounded.passed);
    assert!((grounded.confidence - 0.8).abs() < 1e-6);

    let useful = judge.judge_usefulness("why RC=8?", "locked").await.unwrap();
    assert!(!useful.passed);
    assert_eq!(useful.rationale, "talks about a different job");
}

#[tokio::test]
async fn test_unsupported_claims_override_grounded_flag() {
    let backend = ScriptedBackend::new(vec![Ok(
        r#"{"grounded": true, "confidence": 0.9, "unsupported_claims": ["restart fixes it"]}"#.into(),
    )]);
    let judge = LlmGroundednessJudge::new(backend);

    let verdict = judge.judge_groundedness("restart fixes it", &context()).await.unwrap();
    assert!(!verdict.passed);
    assert!(verdict.rationale.contains("restart fixes it"));
}

#[tokio::test]
async fn test_malformed_judge_output_is_grader_failure() {
    let backend = ScriptedBackend::new(vec![Ok("looks grounded to me".into())]);
    let judge = LlmGroundednessJudge::new(backend);

    let err = judge.judge_groundedness("x", &context()).await.unwrap_err();
    assert!(matches!(err, Error::GraderFailure(_)));
}
