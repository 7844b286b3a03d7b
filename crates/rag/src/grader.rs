//! Answer grading
//!
//! The grader runs two sequential checks through a [`GroundednessJudge`]:
//! groundedness first, then usefulness. Its lifecycle is
//! `Pending -> Graded -> Done`, or `Pending -> Error` when the judge fails or
//! times out. An `Error` never reaches the caller as a failure: the grade
//! fails open to `USEFUL` with a warning, since blocking every answer on a
//! grading fault is worse than letting one ungrounded answer through.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;
use once_cell::sync::Lazy;
use regex::Regex;

use ops_assist_config::GradingConfig;
use ops_assist_core::{Context, GradeResult, GroundednessJudge, JudgeVerdict};

use crate::text;

/// Grader lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraderState {
    Pending,
    Graded,
    Done,
    Error,
}

/// Grade plus the state the grader finished in
#[derive(Debug, Clone, PartialEq)]
pub struct GradeOutcome {
    pub result: GradeResult,
    /// `Done` or `Error`
    pub state: GraderState,
}

/// Two-check grader with fail-open recovery
pub struct GroundednessGrader {
    judge: Arc<dyn GroundednessJudge>,
    timeout: Duration,
}

impl GroundednessGrader {
    pub fn new(judge: Arc<dyn GroundednessJudge>, config: &GradingConfig) -> Self {
        Self {
            judge,
            timeout: Duration::from_millis(config.grading_timeout_ms),
        }
    }

    pub fn judge_name(&self) -> &str {
        self.judge.name()
    }

    pub async fn grade(&self, query: &str, answer: &str, context: &Context) -> GradeOutcome {
        let mut state = GraderState::Pending;
        let checked = self.run_checks(query, answer, context).await;

        match checked {
            Ok(result) => {
                state = transition(state, GraderState::Graded);
                tracing::debug!(
                    grade = %result.grade,
                    confidence = result.confidence,
                    judge = self.judge.name(),
                    "Answer graded"
                );
                GradeOutcome {
                    result,
                    state: transition(state, GraderState::Done),
                }
            },
            Err(reason) => {
                tracing::warn!(
                    judge = self.judge.name(),
                    reason = %reason,
                    "Grader failed, failing open to USEFUL"
                );
                counter!("ops_assist_grader_fail_open_total").increment(1);
                GradeOutcome {
                    result: GradeResult::fail_open(format!("grader failed open: {}", reason)),
                    state: transition(state, GraderState::Error),
                }
            },
        }
    }

    async fn run_checks(
        &self,
        query: &str,
        answer: &str,
        context: &Context,
    ) -> Result<GradeResult, String> {
        let grounded = self
            .bounded(self.judge.judge_groundedness(answer, context))
            .await?;
        if !grounded.passed {
            return Ok(GradeResult::not_grounded(grounded.confidence, grounded.rationale));
        }

        let useful = self.bounded(self.judge.judge_usefulness(query, answer)).await?;
        if !useful.passed {
            return Ok(GradeResult::not_useful(useful.confidence, useful.rationale));
        }

        Ok(GradeResult::useful(
            grounded.confidence.min(useful.confidence),
            useful.rationale,
        ))
    }

    async fn bounded<F>(&self, check: F) -> Result<JudgeVerdict, String>
    where
        F: std::future::Future<Output = ops_assist_core::Result<JudgeVerdict>>,
    {
        match tokio::time::timeout(self.timeout, check).await {
            Ok(Ok(verdict)) => Ok(verdict),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!("judge timed out after {:?}", self.timeout)),
        }
    }
}

fn transition(from: GraderState, to: GraderState) -> GraderState {
    tracing::trace!(?from, ?to, "Grader state");
    to
}

static SENTENCE_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?]+(?:\s+|$)|\n+").unwrap());

/// Offline judge based on token overlap
///
/// Groundedness: every answer sentence must have at least
/// `groundedness_threshold` of its content tokens present in the context.
/// Usefulness: the answer must cover at least `usefulness_threshold` of the
/// query's content tokens.
pub struct HeuristicJudge {
    groundedness_threshold: f32,
    usefulness_threshold: f32,
}

impl HeuristicJudge {
    pub fn new(config: &GradingConfig) -> Self {
        Self {
            groundedness_threshold: config.groundedness_threshold,
            usefulness_threshold: config.usefulness_threshold,
        }
    }

    /// Sentences whose content tokens are not supported by `support`
    fn unsupported<'a>(
        &self,
        answer: &'a str,
        support: &HashSet<String>,
    ) -> (Vec<&'a str>, f32) {
        let mut unsupported = Vec::new();
        let mut ratios = Vec::new();

        for sentence in SENTENCE_BREAK.split(answer) {
            let tokens = text::content_tokens(sentence);
            if tokens.is_empty() {
                continue;
            }
            let found = tokens.iter().filter(|t| support.contains(*t)).count();
            let ratio = found as f32 / tokens.len() as f32;
            ratios.push(ratio);
            if ratio < self.groundedness_threshold {
                unsupported.push(sentence.trim());
            }
        }

        let mean = if ratios.is_empty() {
            1.0
        } else {
            ratios.iter().sum::<f32>() / ratios.len() as f32
        };
        (unsupported, mean)
    }
}

impl Default for HeuristicJudge {
    fn default() -> Self {
        Self::new(&GradingConfig::default())
    }
}

#[async_trait]
impl GroundednessJudge for HeuristicJudge {
    async fn judge_groundedness(
        &self,
        answer: &str,
        context: &Context,
    ) -> ops_assist_core::Result<JudgeVerdict> {
        let support: HashSet<String> = text::content_tokens(&context.text()).into_iter().collect();
        let (unsupported, mean) = self.unsupported(answer, &support);

        Ok(match unsupported.first() {
            None => JudgeVerdict::pass(mean, "every sentence is supported by the context"),
            Some(first) => JudgeVerdict::fail(
                1.0 - mean,
                format!(
                    "{} sentence(s) not supported by the context, e.g. \"{}\"",
                    unsupported.len(),
                    first
                ),
            ),
        })
    }

    async fn judge_usefulness(
        &self,
        query: &str,
        answer: &str,
    ) -> ops_assist_core::Result<JudgeVerdict> {
        let answer_tokens: HashSet<String> = text::content_tokens(answer).into_iter().collect();
        if answer_tokens.is_empty() {
            return Ok(JudgeVerdict::fail(1.0, "answer is empty"));
        }

        let query_tokens: HashSet<String> = text::content_tokens(query).into_iter().collect();
        if query_tokens.is_empty() {
            return Ok(JudgeVerdict::pass(0.5, "query has no content terms to check"));
        }

        let covered = query_tokens.intersection(&answer_tokens).count();
        let coverage = covered as f32 / query_tokens.len() as f32;
        Ok(if coverage >= self.usefulness_threshold {
            JudgeVerdict::pass(coverage, format!("answer covers {:.0}% of the query", coverage * 100.0))
        } else {
            JudgeVerdict::fail(
                1.0 - coverage,
                format!("answer covers only {:.0}% of the query", coverage * 100.0),
            )
        })
    }

    fn name(&self) -> &str {
        "heuristic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ops_assist_core::{Error, Grade, Passage};

    fn context(texts: &[&str]) -> Context {
        let mut builder = Context::builder(10_000);
        for (i, t) in texts.iter().enumerate() {
            builder
                .try_push(Arc::new(Passage::new(format!("p{}", i), "d", *t)), 10, i + 1)
                .unwrap();
        }
        builder.build()
    }

    struct BrokenJudge;

    #[async_trait]
    impl GroundednessJudge for BrokenJudge {
        async fn judge_groundedness(
            &self,
            _answer: &str,
            _context: &Context,
        ) -> ops_assist_core::Result<JudgeVerdict> {
            Err(Error::GraderFailure("verdict was not JSON".to_string()))
        }

        async fn judge_usefulness(
            &self,
            _query: &str,
            _answer: &str,
        ) -> ops_assist_core::Result<JudgeVerdict> {
            Ok(JudgeVerdict::pass(1.0, "unused"))
        }
    }

    struct SlowJudge;

    #[async_trait]
    impl GroundednessJudge for SlowJudge {
        async fn judge_groundedness(
            &self,
            _answer: &str,
            _context: &Context,
        ) -> ops_assist_core::Result<JudgeVerdict> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(JudgeVerdict::pass(1.0, "late"))
        }

        async fn judge_usefulness(
            &self,
            _query: &str,
            _answer: &str,
        ) -> ops_assist_core::Result<JudgeVerdict> {
            Ok(JudgeVerdict::pass(1.0, "late"))
        }
    }

    fn grader(judge: Arc<dyn GroundednessJudge>) -> GroundednessGrader {
        GroundednessGrader::new(judge, &GradingConfig::default())
    }

    #[tokio::test]
    async fn test_heuristic_grades_grounded_answer_useful() {
        let ctx = context(&["Job PAYROLL_01 ended RC=8 because the input dataset was locked."]);
        let outcome = grader(Arc::new(HeuristicJudge::default()))
            .grade(
                "why did PAYROLL_01 end RC=8",
                "PAYROLL_01 ended RC=8 because the input dataset was locked.",
                &ctx,
            )
            .await;

        assert_eq!(outcome.result.grade, Grade::Useful);
        assert_eq!(outcome.state, GraderState::Done);
        assert!(!outcome.result.fail_open);
    }

    #[tokio::test]
    async fn test_heuristic_flags_unsupported_sentence() {
        let ctx = context(&["Restart the scheduler agent after the patch."]);
        let outcome = grader(Arc::new(HeuristicJudge::default()))
            .grade(
                "how to restart the agent",
                "Restart the scheduler agent after the patch. Then reformat the mainframe volume cluster.",
                &ctx,
            )
            .await;

        assert_eq!(outcome.result.grade, Grade::NotGrounded);
        assert!(outcome.result.rationale.contains("reformat"));
    }

    #[tokio::test]
    async fn test_heuristic_flags_off_topic_answer() {
        let ctx = context(&["Payroll reports are archived monthly."]);
        let outcome = grader(Arc::new(HeuristicJudge::default()))
            .grade("how to restart the scheduler agent", "Payroll reports are archived monthly.", &ctx)
            .await;
        assert_eq!(outcome.result.grade, Grade::NotUseful);
    }

    #[tokio::test]
    async fn test_judge_error_fails_open() {
        let outcome = grader(Arc::new(BrokenJudge))
            .grade("q", "a", &context(&["c"]))
            .await;

        assert_eq!(outcome.result.grade, Grade::Useful);
        assert!(outcome.result.fail_open);
        assert_eq!(outcome.state, GraderState::Error);
        assert!(outcome.result.rationale.contains("not JSON"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_judge_timeout_fails_open() {
        let outcome = grader(Arc::new(SlowJudge))
            .grade("q", "a", &context(&["c"]))
            .await;
        assert!(outcome.result.fail_open);
        assert_eq!(outcome.state, GraderState::Error);
    }
}
