//! Grounded answering: bounded regeneration, fail-open and cancellation

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use ops_assist_config::{ContextConfig, Settings};
use async_trait::async_trait;
use parking_lot::Mutex;

use ops_assist_core::{
    AnswerGenerator, Context, Error, Grade, GroundednessJudge, Message, Passage, ScoredPassage,
    SearchFilters, SignalScores,
};
use ops_assist_rag::{ContextAssembler, GroundingPipeline, HeuristicJudge, RagError};

use common::*;

fn pipeline_with(
    settings: &Settings,
    generator: Arc<dyn AnswerGenerator>,
    judge: Arc<dyn GroundednessJudge>,
) -> GroundingPipeline {
    GroundingPipeline::new(settings, snapshot_handle(corpus()), embedder(), generator, judge)
}

#[tokio::test]
async fn not_grounded_twice_makes_three_calls() {
    let generator = Arc::new(CountingGenerator::default());
    let judge = ScriptedJudge::new(vec![Ok(false), Ok(false), Ok(true)]);
    let pipeline = pipeline_with(&settings(), generator.clone(), judge);

    let answer = pipeline
        .answer_with_grounding(
            "why did PAYROLL_01 end RC=8",
            &SearchFilters::new(),
            Some(2),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(generator.calls(), 3);
    assert_eq!(answer.attempts, 3);
    assert!(answer.answer.starts_with("attempt 3:"));
    assert_eq!(answer.grade.grade, Grade::Useful);
    assert!(!answer.exhausted);
    assert_eq!(answer.context_ids.first().map(String::as_str), Some("kb-101"));
}

#[tokio::test]
async fn generation_calls_bounded_by_max_retries() {
    for max_retries in 0..4 {
        let generator = Arc::new(CountingGenerator::default());
        let judge = ScriptedJudge::new((0..10).map(|_| Ok(false)).collect());
        let pipeline = pipeline_with(&settings(), generator.clone(), judge);

        let answer = pipeline
            .answer_with_grounding(
                "restart the scheduler agent",
                &SearchFilters::new(),
                Some(max_retries),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(generator.calls(), max_retries + 1);
        assert_eq!(answer.grade.grade, Grade::NotGrounded);
        assert!(answer.exhausted);
        assert_eq!(answer.attempt_log.iter().filter(|a| a.is_final).count(), 1);
    }
}

#[tokio::test]
async fn judge_error_fails_open_to_useful() {
    let generator = Arc::new(CountingGenerator::default());
    let judge = ScriptedJudge::new(vec![Err(Error::GraderFailure("malformed verdict".into()))]);
    let pipeline = pipeline_with(&settings(), generator.clone(), judge.clone());

    let answer = pipeline
        .answer_with_grounding(
            "restart the scheduler agent",
            &SearchFilters::new(),
            None,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(answer.grade.grade, Grade::Useful);
    assert!(answer.grade.fail_open);
    assert_eq!(generator.calls(), 1);
    assert_eq!(judge.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn generation_timeout_returns_fallback() {
    let mut settings = settings();
    settings.grading.generation_timeout_ms = 50;
    let pipeline = pipeline_with(&settings, Arc::new(StalledGenerator), ScriptedJudge::new(vec![]));

    let answer = pipeline
        .answer_with_grounding(
            "restart the scheduler agent",
            &SearchFilters::new(),
            None,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(answer.answer, settings.grading.fallback_answer);
    assert!(answer.grade.fail_open);
    assert_eq!(answer.attempts, 1);
}

#[tokio::test]
async fn cancellation_stops_in_flight_generation() {
    let pipeline = pipeline_with(
        &settings(),
        Arc::new(StalledGenerator),
        ScriptedJudge::new(vec![]),
    );
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        pipeline.answer_with_grounding(
            "restart the scheduler agent",
            &SearchFilters::new(),
            None,
            &cancel,
        ),
    )
    .await
    .expect("cancellation should end the run promptly");

    assert!(matches!(result, Err(RagError::Cancelled)));
}

#[tokio::test]
async fn context_stays_within_budget() {
    for budget in [0usize, 10, 40, 80, 200, 2048] {
        let mut settings = settings();
        settings.context.token_budget = budget;
        let pipeline = pipeline_with(
            &settings,
            Arc::new(CountingGenerator::default()),
            ScriptedJudge::new(vec![]),
        );

        let context = pipeline
            .build_context("scheduler agent batch job restart", &SearchFilters::new())
            .await
            .unwrap();

        assert!(context.total_tokens() <= budget);
        let mut ids = context.ids();
        let before = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), before);
    }
}

#[test]
fn duplicate_candidates_leave_three_unique_passages() {
    // 5 candidates, 2 of them exact duplicates; budget fits 3 passages
    let texts = [
        ("a", "Rerun PAYROLL_01 after the extract."),
        ("b", "Rerun PAYROLL_01 after the extract."),
        ("c", "Relink the workstation from console."),
        ("c", "Relink the workstation from console."),
        ("d", "Apply the monthly patch then restart"),
    ];
    let ranked: Vec<ScoredPassage> = texts
        .iter()
        .map(|(id, text)| {
            ScoredPassage::new(Arc::new(Passage::new(*id, "doc", *text)), SignalScores::default())
        })
        .collect();

    let per_passage = ops_assist_rag::text::estimate_tokens(texts[0].1);
    let assembler = ContextAssembler::new(ContextConfig {
        token_budget: per_passage * 3,
        max_passages: None,
    });
    let context = assembler.assemble(&ranked);

    assert_eq!(context.len(), 3);
    assert_eq!(context.ids(), vec!["a", "c", "d"]);
    assert!(context.total_tokens() <= per_passage * 3);
}

#[tokio::test]
async fn heuristic_judge_accepts_extractive_answer() {
    let generator = Arc::new(CountingGenerator::default());
    let config = settings();
    let pipeline = pipeline_with(
        &config,
        generator.clone(),
        Arc::new(HeuristicJudge::new(&config.grading)),
    );

    let answer = pipeline
        .answer_with_grounding(
            "why did PAYROLL_01 end RC=8",
            &SearchFilters::new(),
            None,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(answer.grade.grade, Grade::Useful);
    assert_eq!(generator.calls(), 1);
}

#[tokio::test]
async fn retrieve_honours_per_call_top_k() {
    let settings = settings();
    assert_eq!(settings.retrieval.top_k, 10);
    let pipeline = pipeline_with(
        &settings,
        Arc::new(CountingGenerator::default()),
        ScriptedJudge::new(vec![]),
    );
    let query = "scheduler agent batch job restart";

    let limited = pipeline
        .retrieve(query, &SearchFilters::new(), Some(2))
        .await
        .unwrap();
    assert_eq!(limited.passages.len(), 2);

    let default = pipeline
        .retrieve(query, &SearchFilters::new(), None)
        .await
        .unwrap();
    assert!(default.passages.len() > 2);
    assert!(default.passages.len() <= settings.retrieval.top_k);
    assert_eq!(limited.passages[0].id(), default.passages[0].id());
}

/// Records the conversation turns each generation call receives
#[derive(Default)]
struct HistoryRecorder {
    seen: Mutex<Vec<Vec<Message>>>,
}

#[async_trait]
impl AnswerGenerator for HistoryRecorder {
    async fn generate(
        &self,
        _query: &str,
        context: &Context,
        history: &[Message],
    ) -> ops_assist_core::Result<String> {
        self.seen.lock().push(history.to_vec());
        Ok(context.text())
    }
}

#[tokio::test]
async fn history_reaches_the_generator() {
    let generator = Arc::new(HistoryRecorder::default());
    let pipeline = pipeline_with(&settings(), generator.clone(), ScriptedJudge::new(vec![]));
    let history = vec![Message::user("PAYROLL_01 failed last night")];

    let answer = pipeline
        .answer_with_history(
            "what does RC=8 mean for it",
            &SearchFilters::new(),
            &history,
            None,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(answer.attempts, 1);
    assert_eq!(*generator.seen.lock(), vec![history]);
}
