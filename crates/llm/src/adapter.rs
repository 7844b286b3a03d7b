//! Adapters from `LlmBackend` to the core generation traits
//!
//! `LlmAnswerGenerator` implements `AnswerGenerator` and `LlmGroundednessJudge`
//! implements `GroundednessJudge`, so any backend can be injected into the
//! grounding pipeline.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use ops_assist_core::{
    AnswerGenerator, Context, Error, GroundednessJudge, JudgeVerdict, Message, Result,
};

use crate::backend::LlmBackend;
use crate::prompt::PromptBuilder;

/// Answer generator backed by an LLM
///
/// # Example
///
/// ```ignore
/// let backend = OllamaBackend::new(LlmConfig::from(&settings.llm))?;
/// let generator: Arc<dyn AnswerGenerator> = Arc::new(LlmAnswerGenerator::new(Arc::new(backend)));
/// ```
pub struct LlmAnswerGenerator {
    backend: Arc<dyn LlmBackend>,
}

impl LlmAnswerGenerator {
    pub fn new(backend: Arc<dyn LlmBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl AnswerGenerator for LlmAnswerGenerator {
    async fn generate(
        &self,
        query: &str,
        context: &Context,
        history: &[Message],
    ) -> Result<String> {
        let messages = PromptBuilder::answer(query, context, history);
        let result = self
            .backend
            .generate(&messages)
            .await
            .map_err(|e| Error::Generation(format!("LLM generation failed: {}", e)))?;

        tracing::debug!(
            model = self.backend.model_name(),
            tokens = result.tokens,
            elapsed_ms = result.total_time_ms,
            "Generated answer"
        );
        Ok(result.text)
    }

    fn name(&self) -> &str {
        self.backend.model_name()
    }
}

/// Judge backed by an LLM returning JSON verdicts
///
/// Malformed judge output is an `Error::GraderFailure`; the grader is
/// responsible for failing open.
pub struct LlmGroundednessJudge {
    backend: Arc<dyn LlmBackend>,
}

impl LlmGroundednessJudge {
    pub fn new(backend: Arc<dyn LlmBackend>) -> Self {
        Self { backend }
    }

    async fn ask(&self, messages: &[Message]) -> Result<String> {
        self.backend
            .generate(messages)
            .await
            .map(|r| r.text)
            .map_err(|e| Error::GraderFailure(format!("Judge call failed: {}", e)))
    }
}

#[derive(Debug, Deserialize)]
struct GroundednessResponse {
    grounded: bool,
    #[serde(default = "default_confidence")]
    confidence: f32,
    #[serde(default)]
    unsupported_claims: Vec<String>,
    #[serde(default)]
    rationale: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsefulnessResponse {
    useful: bool,
    #[serde(default = "default_confidence")]
    confidence: f32,
    #[serde(default)]
    rationale: Option<String>,
}

fn default_confidence() -> f32 {
    0.5
}

/// Extract the outermost JSON object from free-form model output
fn extract_json(response: &str) -> &str {
    match (response.find('{'), response.rfind('}')) {
        (Some(start), Some(end)) if end > start => &response[start..=end],
        _ => response,
    }
}

fn parse_verdict<T: for<'de> Deserialize<'de>>(response: &str) -> Result<T> {
    serde_json::from_str(extract_json(response))
        .map_err(|e| Error::GraderFailure(format!("Failed to parse judge response: {}", e)))
}

fn clamp_confidence(confidence: f32) -> f32 {
    if confidence.is_finite() {
        confidence.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

#[async_trait]
impl GroundednessJudge for LlmGroundednessJudge {
    async fn judge_groundedness(&self, answer: &str, context: &Context) -> Result<JudgeVerdict> {
        let text = self.ask(&PromptBuilder::groundedness(answer, context)).await?;
        let parsed: GroundednessResponse = parse_verdict(&text)?;

        let mut rationale = parsed.rationale.unwrap_or_default();
        if !parsed.unsupported_claims.is_empty() {
            if !rationale.is_empty() {
                rationale.push(' ');
            }
            rationale.push_str(&format!(
                "Unsupported: {}",
                parsed.unsupported_claims.join("; ")
            ));
        }

        // A verdict that lists unsupported claims is not grounded, whatever the flag says
        let grounded = parsed.grounded && parsed.unsupported_claims.is_empty();
        let confidence = clamp_confidence(parsed.confidence);
        Ok(if grounded {
            JudgeVerdict::pass(confidence, rationale)
        } else {
            JudgeVerdict::fail(confidence, rationale)
        })
    }

    async fn judge_usefulness(&self, query: &str, answer: &str) -> Result<JudgeVerdict> {
        let text = self.ask(&PromptBuilder::usefulness(query, answer)).await?;
        let parsed: UsefulnessResponse = parse_verdict(&text)?;

        let confidence = clamp_confidence(parsed.confidence);
        let rationale = parsed.rationale.unwrap_or_default();
        Ok(if parsed.useful {
            JudgeVerdict::pass(confidence, rationale)
        } else {
            JudgeVerdict::fail(confidence, rationale)
        })
    }

    fn name(&self) -> &str {
        self.backend.model_name()
    }
}
