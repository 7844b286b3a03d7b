//! End-to-end grounded answering
//!
//! Retrieve -> assemble context -> generate/grade/retry. The caller always
//! gets an answer together with its grade and attempt count; whether to show
//! a "may be ungrounded" notice is left to the caller.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use ops_assist_config::Settings;
use ops_assist_core::{
    AnswerGenerator, Context, GradeResult, GroundednessJudge, Message, QueryType, SearchFilters,
};

use crate::context::ContextAssembler;
use crate::embeddings::Embedder;
use crate::grader::GroundednessGrader;
use crate::regeneration::{Attempt, RegenerationController};
use crate::retriever::{HybridRetriever, RetrievalOutcome};
use crate::snapshot::SnapshotHandle;
use crate::RagError;

/// Final answer with its grade and provenance
#[derive(Debug, Clone, Serialize)]
pub struct GroundedAnswer {
    pub answer: String,
    pub grade: GradeResult,
    /// Generation calls made
    pub attempts: usize,
    pub context_ids: Vec<String>,
    pub query_type: QueryType,
    /// Filters were exhausted or a retrieval side failed
    pub degraded: bool,
    /// Retries ran out while the answer was still not grounded
    pub exhausted: bool,
    #[serde(skip)]
    pub attempt_log: Vec<Attempt>,
}

/// Retrieval, context assembly and the regeneration loop wired together
pub struct GroundingPipeline {
    retriever: HybridRetriever,
    assembler: ContextAssembler,
    controller: RegenerationController,
    default_max_retries: usize,
}

impl GroundingPipeline {
    pub fn new(
        settings: &Settings,
        snapshots: Arc<SnapshotHandle>,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn AnswerGenerator>,
        judge: Arc<dyn GroundednessJudge>,
    ) -> Self {
        let grader = GroundednessGrader::new(judge, &settings.grading);
        Self {
            retriever: HybridRetriever::new(settings, snapshots, embedder),
            assembler: ContextAssembler::new(settings.context.clone()),
            controller: RegenerationController::new(generator, grader, &settings.grading),
            default_max_retries: settings.grading.max_retries,
        }
    }

    /// Ranked passages for a query, without generation
    ///
    /// `top_k` falls back to the configured default when `None`.
    pub async fn retrieve(
        &self,
        query: &str,
        filters: &SearchFilters,
        top_k: Option<usize>,
    ) -> Result<RetrievalOutcome, RagError> {
        self.retriever.retrieve(query, filters, top_k).await
    }

    /// Context for a query, without generation
    pub async fn build_context(
        &self,
        query: &str,
        filters: &SearchFilters,
    ) -> Result<Context, RagError> {
        let outcome = self.retriever.retrieve(query, filters, None).await?;
        Ok(self.assembler.assemble(&outcome.passages))
    }

    /// Answer a query, gated by the grader
    ///
    /// `max_retries` falls back to the configured default when `None`.
    pub async fn answer_with_grounding(
        &self,
        query: &str,
        filters: &SearchFilters,
        max_retries: Option<usize>,
        cancel: &CancellationToken,
    ) -> Result<GroundedAnswer, RagError> {
        self.answer_at(query, filters, &[], max_retries, Utc::now(), cancel)
            .await
    }

    /// Answer with prior conversation turns passed to the generator
    pub async fn answer_with_history(
        &self,
        query: &str,
        filters: &SearchFilters,
        history: &[Message],
        max_retries: Option<usize>,
        cancel: &CancellationToken,
    ) -> Result<GroundedAnswer, RagError> {
        self.answer_at(query, filters, history, max_retries, Utc::now(), cancel)
            .await
    }

    /// Answer with an explicit clock for the freshness signal
    pub async fn answer_at(
        &self,
        query: &str,
        filters: &SearchFilters,
        history: &[Message],
        max_retries: Option<usize>,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<GroundedAnswer, RagError> {
        let retrieved = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RagError::Cancelled),
            result = self.retriever.retrieve_at(query, filters, None, now) => result?,
        };

        let context = self.assembler.assemble(&retrieved.passages);
        let degraded = retrieved.degraded || !retrieved.failed_sides.is_empty();
        if degraded {
            tracing::warn!(
                filters_exhausted = retrieved.degraded,
                failed_sides = ?retrieved.failed_sides,
                "Answering from degraded retrieval"
            );
        }

        let max_retries = max_retries.unwrap_or(self.default_max_retries);
        let outcome = self
            .controller
            .run(query, &context, history, max_retries, cancel)
            .await?;

        tracing::info!(
            query_type = %retrieved.classification.query_type,
            passages = context.len(),
            tokens = context.total_tokens(),
            attempts = outcome.attempt_count(),
            grade = %outcome.grade.grade,
            exhausted = outcome.exhausted,
            degraded,
            "Answer produced"
        );

        Ok(GroundedAnswer {
            answer: outcome.answer,
            attempts: outcome.attempts.len(),
            grade: outcome.grade,
            context_ids: context.ids(),
            query_type: retrieved.classification.query_type,
            degraded,
            exhausted: outcome.exhausted,
            attempt_log: outcome.attempts,
        })
    }
}
