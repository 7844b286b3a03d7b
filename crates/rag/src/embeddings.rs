//! Text embeddings
//!
//! Query and passage embeddings come from an [`Embedder`]. The bundled
//! [`HashingEmbedder`] hashes compound-aware tokens into a fixed number of
//! buckets; it is deterministic and needs no model files, which makes it the
//! default for offline operation and tests.

use crate::text;
use crate::RagError;

/// Dense text embedder
pub trait Embedder: Send + Sync {
    /// Embed a single text
    fn embed(&self, text: &str) -> Result<Vec<f32>, RagError>;

    /// Embed multiple texts
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, RagError> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    /// Embedding dimension
    fn dim(&self) -> usize;
}

/// Feature-hashing embedder
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dim: usize,
}

impl HashingEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }

    fn bucket(&self, token: &str) -> (usize, f32) {
        let hash = blake3::hash(token.as_bytes());
        let bytes = hash.as_bytes();
        let value = u64::from_le_bytes([
            bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
        ]);
        let index = (value % self.dim as u64) as usize;
        // sign bit spreads collisions around zero
        let sign = if bytes[8] & 1 == 0 { 1.0 } else { -1.0 };
        (index, sign)
    }
}

impl Embedder for HashingEmbedder {
    fn embed(&self, input: &str) -> Result<Vec<f32>, RagError> {
        let mut embedding = vec![0.0f32; self.dim];

        for token in text::content_tokens(input) {
            let (index, sign) = self.bucket(&token);
            embedding[index] += sign;
        }

        normalize(&mut embedding);
        Ok(embedding)
    }

    fn dim(&self) -> usize {
        self.dim
    }
}

/// L2-normalise in place; zero vectors stay zero
pub fn normalize(embedding: &mut [f32]) {
    let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in embedding.iter_mut() {
            *v /= norm;
        }
    }
}

/// Cosine similarity; 0.0 for mismatched or zero vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
