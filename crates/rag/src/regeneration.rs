//! Bounded generate -> grade -> retry loop
//!
//! The loop runs at most `max_retries + 1` attempts. Only a `NOT_GROUNDED`
//! grade triggers another attempt; `USEFUL`, `NOT_USEFUL` and fail-open
//! grades end it immediately. Every attempt reuses the same context. A
//! cancellation token is checked before each attempt and raced against every
//! generation and grading call.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tokio_util::sync::CancellationToken;

use ops_assist_config::GradingConfig;
use ops_assist_core::{AnswerGenerator, Context, Grade, GradeResult, Message};

use crate::grader::GroundednessGrader;
use crate::RagError;

/// One generation attempt and its grade
#[derive(Debug, Clone, PartialEq)]
pub struct Attempt {
    /// 0-based attempt index
    pub index: usize,
    pub answer: String,
    pub grade: GradeResult,
    pub is_final: bool,
}

/// Terminal state of the loop
#[derive(Debug, Clone)]
pub struct RegenerationOutcome {
    pub answer: String,
    pub grade: GradeResult,
    pub attempts: Vec<Attempt>,
    /// Retries ran out while the answer was still `NOT_GROUNDED`
    pub exhausted: bool,
}

impl RegenerationOutcome {
    /// Number of generation calls made
    pub fn attempt_count(&self) -> usize {
        self.attempts.len()
    }
}

/// Drives generation attempts until one is accepted or retries run out
pub struct RegenerationController {
    generator: Arc<dyn AnswerGenerator>,
    grader: GroundednessGrader,
    generation_timeout: Duration,
    retry_feedback: bool,
    fallback_answer: String,
}

impl RegenerationController {
    pub fn new(
        generator: Arc<dyn AnswerGenerator>,
        grader: GroundednessGrader,
        config: &GradingConfig,
    ) -> Self {
        Self {
            generator,
            grader,
            generation_timeout: Duration::from_millis(config.generation_timeout_ms),
            retry_feedback: config.retry_feedback,
            fallback_answer: config.fallback_answer.clone(),
        }
    }

    pub async fn run(
        &self,
        query: &str,
        context: &Context,
        history: &[Message],
        max_retries: usize,
        cancel: &CancellationToken,
    ) -> Result<RegenerationOutcome, RagError> {
        let max_attempts = max_retries.saturating_add(1);
        let mut attempts: Vec<Attempt> = Vec::new();
        let mut feedback: Option<String> = None;

        for index in 0..max_attempts {
            if cancel.is_cancelled() {
                tracing::info!(attempt = index, "Regeneration cancelled");
                return Err(RagError::Cancelled);
            }
            let is_last = index + 1 == max_attempts;
            counter!("ops_assist_generation_attempts_total").increment(1);

            let mut turn = history.to_vec();
            if let Some(note) = feedback.take() {
                turn.push(Message::system(note));
            }

            let generated = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(RagError::Cancelled),
                result = tokio::time::timeout(
                    self.generation_timeout,
                    self.generator.generate(query, context, &turn),
                ) => result,
            };

            let answer = match generated {
                Ok(Ok(answer)) => answer,
                Ok(Err(e)) => return Ok(self.fail_open(attempts, index, e.to_string())),
                Err(_) => {
                    let reason = format!("generation timed out after {:?}", self.generation_timeout);
                    return Ok(self.fail_open(attempts, index, reason));
                },
            };

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(RagError::Cancelled),
                outcome = self.grader.grade(query, &answer, context) => outcome,
            };
            let grade = outcome.result;

            tracing::debug!(
                attempt = index,
                grade = %grade.grade,
                confidence = grade.confidence,
                fail_open = grade.fail_open,
                "Attempt graded"
            );

            let retry = grade.grade == Grade::NotGrounded && !is_last;
            if retry && self.retry_feedback {
                feedback = Some(format!(
                    "Your previous answer was not supported by the context: {}. \
                     Answer again using only facts stated in the numbered context passages.",
                    grade.rationale
                ));
            }

            attempts.push(Attempt {
                index,
                answer: answer.clone(),
                grade: grade.clone(),
                is_final: !retry,
            });

            if retry {
                continue;
            }

            let exhausted = grade.grade == Grade::NotGrounded;
            if exhausted {
                tracing::info!(
                    attempts = attempts.len(),
                    judge = self.grader.judge_name(),
                    "Regeneration retries exhausted"
                );
                counter!("ops_assist_regeneration_exhausted_total").increment(1);
            }

            return Ok(RegenerationOutcome {
                answer,
                grade,
                attempts,
                exhausted,
            });
        }

        // max_attempts >= 1 and the last attempt always returns
        Err(RagError::Generation("regeneration loop ended without an attempt".to_string()))
    }

    /// Generation failed: keep the previous answer or fall back
    fn fail_open(&self, mut attempts: Vec<Attempt>, index: usize, reason: String) -> RegenerationOutcome {
        tracing::warn!(
            attempt = index,
            generator = self.generator.name(),
            reason = %reason,
            "Generation failed, failing open"
        );

        let answer = attempts
            .last()
            .map(|a| a.answer.clone())
            .unwrap_or_else(|| self.fallback_answer.clone());

        if let Some(previous) = attempts.last_mut() {
            previous.is_final = false;
        }
        attempts.push(Attempt {
            index,
            answer: String::new(),
            grade: GradeResult::error(reason.clone()),
            is_final: true,
        });

        RegenerationOutcome {
            answer,
            grade: GradeResult::fail_open(format!("generation failed: {}", reason)),
            attempts,
            exhausted: false,
        }
    }
}
