//! Collaborator traits
//!
//! ```text
//! Retrieval:
//!   - VectorSearch: embedding -> ranked (passage_id, similarity)
//!   - PassageStore: id lookup against one index snapshot
//!
//! Generation:
//!   - AnswerGenerator: query + context (+ history) -> answer
//!   - GroundednessJudge: groundedness and usefulness verdicts
//! ```

mod generation;
mod retrieval;

pub use generation::{AnswerGenerator, GroundednessJudge, JudgeVerdict};
pub use retrieval::{PassageStore, VectorHit, VectorSearch};
