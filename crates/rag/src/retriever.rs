//! Hybrid retrieval
//!
//! One query runs against a single acquired [`IndexSnapshot`]:
//! classify, search lexical and vector sides concurrently, fuse with
//! weighted RRF, then filter and rerank. Either side may fail or time out on
//! its own; the query then degrades to the other side's ranking. Only both
//! sides failing is fatal.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use metrics::counter;

use ops_assist_config::{RetrievalConfig, Settings};
use ops_assist_core::{PassageStore, ScoredPassage, SearchFilters, VectorHit};

use crate::classifier::{ClassifiedQuery, QueryClassifier};
use crate::embeddings::Embedder;
use crate::filter::{FilterStep, TwoPhaseFilter};
use crate::fusion::rrf_fuse;
use crate::lexical::LexicalHit;
use crate::reranker::{Candidate, MultiSignalReranker, RerankRequest};
use crate::snapshot::{IndexSnapshot, SnapshotHandle};
use crate::RagError;

/// One half of hybrid search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalSide {
    Lexical,
    Vector,
}

impl RetrievalSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetrievalSide::Lexical => "lexical",
            RetrievalSide::Vector => "vector",
        }
    }
}

impl fmt::Display for RetrievalSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ranked passages plus the trace of how they were produced
#[derive(Debug, Clone)]
pub struct RetrievalOutcome {
    pub passages: Vec<ScoredPassage>,
    pub classification: ClassifiedQuery,
    pub lexical_hits: usize,
    pub vector_hits: usize,
    /// Sides that errored or timed out
    pub failed_sides: Vec<RetrievalSide>,
    pub steps: Vec<FilterStep>,
    /// Every filter was dropped to reach the minimum result count
    pub degraded: bool,
    pub snapshot_version: u64,
}

/// Hybrid lexical + vector retriever
pub struct HybridRetriever {
    snapshots: Arc<SnapshotHandle>,
    embedder: Arc<dyn Embedder>,
    classifier: QueryClassifier,
    filter: TwoPhaseFilter,
    reranker: MultiSignalReranker,
    config: RetrievalConfig,
}

impl HybridRetriever {
    pub fn new(settings: &Settings, snapshots: Arc<SnapshotHandle>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            snapshots,
            embedder,
            classifier: QueryClassifier::new(settings.classifier.clone()),
            filter: TwoPhaseFilter::new(settings.filter.clone()),
            reranker: MultiSignalReranker::new(settings.ranking.clone(), settings.retrieval.rrf_k),
            config: settings.retrieval.clone(),
        }
    }

    /// Ranked passages for a query
    ///
    /// `top_k` falls back to `retrieval.top_k` when `None`.
    pub async fn retrieve(
        &self,
        query: &str,
        filters: &SearchFilters,
        top_k: Option<usize>,
    ) -> Result<RetrievalOutcome, RagError> {
        self.retrieve_at(query, filters, top_k, Utc::now()).await
    }

    /// Retrieve with an explicit clock, so freshness is reproducible
    pub async fn retrieve_at(
        &self,
        query: &str,
        filters: &SearchFilters,
        top_k: Option<usize>,
        now: DateTime<Utc>,
    ) -> Result<RetrievalOutcome, RagError> {
        let snapshot = self.snapshots.acquire()?;
        let classification = self.classifier.classify(query);

        let (lexical, vector) = tokio::join!(
            self.search_lexical(&snapshot, query),
            self.search_vector(&snapshot, query),
        );

        let mut failed_sides = Vec::new();
        let lexical = self.recover(RetrievalSide::Lexical, lexical, &mut failed_sides);
        let vector = self.recover(RetrievalSide::Vector, vector, &mut failed_sides);
        if failed_sides.len() == 2 {
            return Err(RagError::IndexUnavailable(
                "both lexical and vector retrieval failed".to_string(),
            ));
        }

        tracing::debug!(
            query_type = %classification.query_type,
            lexical_hits = lexical.len(),
            vector_hits = vector.len(),
            snapshot = snapshot.version(),
            "Hybrid search complete"
        );

        let fused = rrf_fuse(&lexical, &vector, classification.weights, self.config.rrf_k);
        let candidates: Vec<Candidate> = fused
            .into_iter()
            .filter_map(|fused| {
                let passage = snapshot.get(&fused.passage_id);
                if passage.is_none() {
                    tracing::debug!(id = %fused.passage_id, "Hit not in snapshot, skipping");
                }
                passage.map(|passage| Candidate { passage, fused })
            })
            .collect();

        let request = RerankRequest {
            query,
            fusion_weights: classification.weights,
            stats: snapshot.stats(),
            now,
        };
        let mut filtered = self
            .filter
            .run(&candidates, filters, |admitted| self.reranker.rerank(&request, admitted));
        filtered.results.truncate(top_k.unwrap_or(self.config.top_k));

        Ok(RetrievalOutcome {
            passages: filtered.results,
            lexical_hits: lexical.len(),
            vector_hits: vector.len(),
            classification,
            failed_sides,
            steps: filtered.steps,
            degraded: filtered.degraded,
            snapshot_version: snapshot.version(),
        })
    }

    async fn search_lexical(
        &self,
        snapshot: &Arc<IndexSnapshot>,
        query: &str,
    ) -> Result<Vec<LexicalHit>, RagError> {
        let timeout = Duration::from_millis(self.config.lexical_timeout_ms);
        let snapshot = Arc::clone(snapshot);
        let query = query.to_string();
        let top_k = self.config.lexical_top_k;

        // tantivy search is CPU bound, keep it off the async workers
        let task = tokio::task::spawn_blocking(move || snapshot.lexical().search(&query, top_k));
        match tokio::time::timeout(timeout, task).await {
            Ok(joined) => joined
                .map_err(|e| RagError::Search(format!("Lexical search task failed: {}", e)))?,
            Err(_) => Err(RagError::RetrievalTimeout(format!(
                "lexical search exceeded {:?}",
                timeout
            ))),
        }
    }

    async fn search_vector(
        &self,
        snapshot: &Arc<IndexSnapshot>,
        query: &str,
    ) -> Result<Vec<VectorHit>, RagError> {
        let timeout = Duration::from_millis(self.config.vector_timeout_ms);
        let embedder = Arc::clone(&self.embedder);
        let query = query.to_string();
        let vector = snapshot.vector();
        let top_k = self.config.vector_top_k;

        let search = async move {
            let embedding = tokio::task::spawn_blocking(move || embedder.embed(&query))
                .await
                .map_err(|e| RagError::Embedding(format!("Embedding task failed: {}", e)))??;
            vector
                .search(&embedding, top_k)
                .await
                .map_err(|e| RagError::VectorStore(e.to_string()))
        };

        match tokio::time::timeout(timeout, search).await {
            Ok(result) => result,
            Err(_) => Err(RagError::RetrievalTimeout(format!(
                "vector search exceeded {:?}",
                timeout
            ))),
        }
    }

    /// Turn a failed side into an empty list, remembering the failure
    fn recover<T>(
        &self,
        side: RetrievalSide,
        result: Result<Vec<T>, RagError>,
        failed: &mut Vec<RetrievalSide>,
    ) -> Vec<T> {
        match result {
            Ok(hits) => hits,
            Err(e) => {
                tracing::warn!(side = side.as_str(), error = %e, "Retrieval side failed, degrading");
                counter!("ops_assist_retrieval_side_failed_total", "side" => side.as_str())
                    .increment(1);
                failed.push(side);
                Vec::new()
            },
        }
    }
}
