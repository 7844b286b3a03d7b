//! Retrieval collaborator traits

use crate::{Passage, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One nearest-neighbour hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorHit {
    pub passage_id: String,
    pub similarity: f32,
}

/// Nearest-neighbour similarity lookup
///
/// Implementations:
/// - `InMemoryVectorIndex` - exact cosine scan held inside an index snapshot
/// - `QdrantVectorStore` - remote Qdrant collection
///
/// Hits must be ordered by similarity descending. Callers bound every call
/// with a timeout and treat failure as an empty list.
#[async_trait]
pub trait VectorSearch: Send + Sync + 'static {
    async fn search(&self, embedding: &[f32], k: usize) -> Result<Vec<VectorHit>>;

    /// Name for logging
    fn name(&self) -> &str {
        "vector"
    }
}

/// Read-only passage lookup against one consistent snapshot
pub trait PassageStore: Send + Sync {
    /// Passages for the ids that exist, in request order; unknown ids are skipped
    fn get_by_ids(&self, ids: &[String]) -> Vec<Arc<Passage>>;

    fn get(&self, id: &str) -> Option<Arc<Passage>>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
