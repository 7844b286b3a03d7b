//! Vector search collaborators
//!
//! [`InMemoryVectorIndex`] keeps embeddings inside the index snapshot and
//! scans them exactly. [`QdrantVectorStore`] talks to a Qdrant collection.
//! Both implement the core `VectorSearch` trait.

use std::collections::HashMap;

use async_trait::async_trait;
use qdrant_client::{
    qdrant::{
        value::Kind, CreateCollectionBuilder, Distance, PointStruct, SearchPointsBuilder,
        UpsertPointsBuilder, VectorParamsBuilder,
    },
    Qdrant,
};

use ops_assist_config::VectorStoreSettings;
use ops_assist_core::{Error, VectorHit, VectorSearch};

use crate::embeddings::cosine_similarity;
use crate::RagError;

/// Payload key holding the passage id (Qdrant point ids must be numeric or UUID)
const PASSAGE_ID_KEY: &str = "passage_id";

/// Exact cosine scan over embeddings held in memory
pub struct InMemoryVectorIndex {
    ids: Vec<String>,
    vectors: Vec<Vec<f32>>,
}

impl InMemoryVectorIndex {
    pub fn new(entries: Vec<(String, Vec<f32>)>) -> Self {
        let (ids, vectors) = entries.into_iter().unzip();
        Self { ids, vectors }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Synchronous search, ordered by similarity descending then id ascending
    pub fn search_sync(&self, embedding: &[f32], k: usize) -> Vec<VectorHit> {
        let mut hits: Vec<VectorHit> = self
            .ids
            .iter()
            .zip(&self.vectors)
            .map(|(id, vector)| VectorHit {
                passage_id: id.clone(),
                similarity: cosine_similarity(embedding, vector),
            })
            .filter(|hit| hit.similarity > 0.0)
            .collect();

        hits.sort_by(|a, b| {
            b.similarity
                .total_cmp(&a.similarity)
                .then_with(|| a.passage_id.cmp(&b.passage_id))
        });
        hits.truncate(k);
        hits
    }
}

#[async_trait]
impl VectorSearch for InMemoryVectorIndex {
    async fn search(&self, embedding: &[f32], k: usize) -> ops_assist_core::Result<Vec<VectorHit>> {
        Ok(self.search_sync(embedding, k))
    }

    fn name(&self) -> &str {
        "in_memory"
    }
}

/// Qdrant-backed vector search
pub struct QdrantVectorStore {
    client: Qdrant,
    collection: String,
}

impl QdrantVectorStore {
    /// Create a new vector store connection
    pub fn new(settings: &VectorStoreSettings) -> Result<Self, RagError> {
        let mut builder = Qdrant::from_url(&settings.endpoint);

        if let Some(ref api_key) = settings.api_key {
            builder = builder.api_key(api_key.clone());
            tracing::info!("Qdrant connection using API key authentication");
        }

        let client = builder
            .build()
            .map_err(|e| RagError::VectorStore(e.to_string()))?;

        Ok(Self {
            client,
            collection: settings.collection.clone(),
        })
    }

    /// Create collection if not exists
    pub async fn ensure_collection(&self, vector_dim: usize) -> Result<(), RagError> {
        let exists = self
            .client
            .collection_exists(&self.collection)
            .await
            .map_err(|e| RagError::VectorStore(e.to_string()))?;

        if !exists {
            self.client
                .create_collection(
                    CreateCollectionBuilder::new(&self.collection).vectors_config(
                        VectorParamsBuilder::new(vector_dim as u64, Distance::Cosine),
                    ),
                )
                .await
                .map_err(|e| RagError::VectorStore(e.to_string()))?;
            tracing::info!(collection = %self.collection, vector_dim, "Created Qdrant collection");
        }

        Ok(())
    }

    /// Insert passage embeddings
    pub async fn upsert(&self, entries: &[(String, Vec<f32>)]) -> Result<(), RagError> {
        if entries.is_empty() {
            return Ok(());
        }

        let points: Vec<PointStruct> = entries
            .iter()
            .map(|(passage_id, embedding)| {
                let mut payload: HashMap<String, qdrant_client::qdrant::Value> = HashMap::new();
                payload.insert(PASSAGE_ID_KEY.to_string(), passage_id.clone().into());
                PointStruct::new(point_id(passage_id), embedding.clone(), payload)
            })
            .collect();

        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, points))
            .await
            .map_err(|e| RagError::VectorStore(e.to_string()))?;

        Ok(())
    }
}

/// Stable numeric point id derived from the passage id
fn point_id(passage_id: &str) -> u64 {
    let hash = blake3::hash(passage_id.as_bytes());
    let bytes = hash.as_bytes();
    u64::from_le_bytes([
        bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
    ])
}

#[async_trait]
impl VectorSearch for QdrantVectorStore {
    async fn search(&self, embedding: &[f32], k: usize) -> ops_assist_core::Result<Vec<VectorHit>> {
        let response = self
            .client
            .search_points(
                SearchPointsBuilder::new(&self.collection, embedding.to_vec(), k as u64)
                    .with_payload(true),
            )
            .await
            .map_err(|e| Error::Retrieval(format!("Qdrant search failed: {}", e)))?;

        let mut hits: Vec<VectorHit> = response
            .result
            .into_iter()
            .filter_map(|point| {
                let passage_id = point.payload.get(PASSAGE_ID_KEY).and_then(|v| match &v.kind {
                    Some(Kind::StringValue(s)) => Some(s.clone()),
                    _ => None,
                })?;
                Some(VectorHit {
                    passage_id,
                    similarity: point.score,
                })
            })
            .collect();

        hits.sort_by(|a, b| {
            b.similarity
                .total_cmp(&a.similarity)
                .then_with(|| a.passage_id.cmp(&b.passage_id))
        });
        Ok(hits)
    }

    fn name(&self) -> &str {
        "qdrant"
    }
}
