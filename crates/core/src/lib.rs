//! Core traits and types for the ops assistant
//!
//! This crate provides foundational types used across all other crates:
//! - Passage data model and metadata tiers
//! - Query types and metadata filters
//! - Scored passages, assembled contexts and grade results
//! - Collaborator traits (vector search, passage store, generation, judging)
//! - Error types

pub mod context;
pub mod error;
pub mod grading;
pub mod llm_types;
pub mod passage;
pub mod query;
pub mod scoring;
pub mod traits;

pub use context::{Context, ContextBuilder, ContextPassage, PushRejection};
pub use error::{Error, Result};
pub use grading::{Grade, GradeResult};
pub use llm_types::{Message, Role};
pub use passage::{DocType, Passage, PassageField, PassageMetadata, SourceTier};
pub use query::{FilterClause, FilterKind, QueryType, SearchFilters};
pub use scoring::{sort_ranked, ScoredPassage, SignalScores};

pub use traits::{
    AnswerGenerator, GroundednessJudge, JudgeVerdict, PassageStore, VectorHit, VectorSearch,
};
