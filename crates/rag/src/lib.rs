//! Hybrid retrieval and answer grounding
//!
//! Features:
//! - Query classification into exact-match / semantic / mixed / default
//! - Field-boosted BM25 search via Tantivy
//! - Dense vector search, in memory or via Qdrant
//! - Weighted reciprocal rank fusion
//! - Two-phase metadata filtering with recall-preserving fallback
//! - Multi-signal reranking (relevance, freshness, authority, spam)
//! - Token-budgeted context assembly
//! - Groundedness grading with fail-open recovery
//! - Bounded, cancellable regeneration loop
//! - Immutable index snapshots swapped atomically

pub mod classifier;
pub mod context;
pub mod embeddings;
pub mod filter;
pub mod fusion;
pub mod grader;
pub mod lexical;
pub mod loader;
pub mod pipeline;
pub mod regeneration;
pub mod reranker;
pub mod retriever;
pub mod signals;
pub mod snapshot;
pub mod text;
pub mod vector_store;

pub use classifier::{ClassifiedQuery, QueryClassifier};
pub use context::ContextAssembler;
pub use embeddings::{cosine_similarity, Embedder, HashingEmbedder};
pub use filter::{FilterOutcome, FilterStep, TwoPhaseFilter};
pub use fusion::{max_fused, rrf_fuse, FusedCandidate};
pub use grader::{GradeOutcome, GraderState, GroundednessGrader, HeuristicJudge};
pub use lexical::{LexicalHit, LexicalIndex};
pub use loader::{load_corpus, CorpusFile, CorpusPassage};
pub use pipeline::{GroundedAnswer, GroundingPipeline};
pub use regeneration::{Attempt, RegenerationController, RegenerationOutcome};
pub use reranker::{Candidate, MultiSignalReranker, RerankRequest, SignalWeights, SimpleScorer};
pub use retriever::{HybridRetriever, RetrievalOutcome, RetrievalSide};
pub use signals::{SpamDetector, SpamReport};
pub use snapshot::{CorpusStats, IndexSnapshot, SnapshotHandle};
pub use vector_store::{InMemoryVectorIndex, QdrantVectorStore};

use thiserror::Error;

/// RAG errors
#[derive(Error, Debug)]
pub enum RagError {
    /// One retrieval side did not answer in time; recovered by the retriever
    #[error("Retrieval timeout: {0}")]
    RetrievalTimeout(String),

    #[error("Index unavailable: {0}")]
    IndexUnavailable(String),

    /// Judge failure; recovered by failing open
    #[error("Grader failure: {0}")]
    GraderFailure(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Index error: {0}")]
    Index(String),

    #[error("Search error: {0}")]
    Search(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Corpus error: {0}")]
    Corpus(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl From<RagError> for ops_assist_core::Error {
    fn from(err: RagError) -> Self {
        use ops_assist_core::Error;
        match err {
            RagError::RetrievalTimeout(msg) => Error::RetrievalTimeout(msg),
            RagError::IndexUnavailable(msg) => Error::IndexUnavailable(msg),
            RagError::GraderFailure(msg) => Error::GraderFailure(msg),
            RagError::Generation(msg) => Error::Generation(msg),
            RagError::Cancelled => Error::Cancelled,
            other => Error::Retrieval(other.to_string()),
        }
    }
}
