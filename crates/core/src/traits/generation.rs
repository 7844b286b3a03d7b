//! Generation and judging collaborator traits

use crate::{Context, Message, Result};
use async_trait::async_trait;

/// Produces a natural-language answer from a query and its context
///
/// # Example
///
/// ```ignore
/// let generator: Arc<dyn AnswerGenerator> = Arc::new(LlmAnswerGenerator::new(backend));
/// let answer = generator.generate("why did PAYROLL_01 end RC=8?", &context, &[]).await?;
/// ```
#[async_trait]
pub trait AnswerGenerator: Send + Sync + 'static {
    async fn generate(&self, query: &str, context: &Context, history: &[Message])
        -> Result<String>;

    fn name(&self) -> &str {
        "generator"
    }
}

/// Verdict of a single judge check
#[derive(Debug, Clone, PartialEq)]
pub struct JudgeVerdict {
    pub passed: bool,
    pub confidence: f32,
    pub rationale: String,
}

impl JudgeVerdict {
    pub fn pass(confidence: f32, rationale: impl Into<String>) -> Self {
        Self {
            passed: true,
            confidence,
            rationale: rationale.into(),
        }
    }

    pub fn fail(confidence: f32, rationale: impl Into<String>) -> Self {
        Self {
            passed: false,
            confidence,
            rationale: rationale.into(),
        }
    }
}

/// Judges answers for groundedness and usefulness
///
/// Errors (including malformed judge output) are reported as `Err`; the
/// grader decides how to recover.
#[async_trait]
pub trait GroundednessJudge: Send + Sync + 'static {
    /// Does every factual claim in `answer` trace back to `context`?
    async fn judge_groundedness(&self, answer: &str, context: &Context) -> Result<JudgeVerdict>;

    /// Does `answer` address the intent of `query`?
    async fn judge_usefulness(&self, query: &str, answer: &str) -> Result<JudgeVerdict>;

    fn name(&self) -> &str {
        "judge"
    }
}
