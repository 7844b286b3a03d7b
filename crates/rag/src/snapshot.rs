//! Immutable index snapshots
//!
//! An [`IndexSnapshot`] bundles the passages, their lexical index, a vector
//! search collaborator and corpus statistics. Snapshots are never mutated:
//! rebuilding produces a new snapshot which is published through a
//! [`SnapshotHandle`]. Each query acquires one `Arc<IndexSnapshot>` up front
//! and uses it for every lookup, so a concurrent swap never mixes two corpora
//! inside one query.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use ops_assist_config::Settings;
use ops_assist_core::{Passage, PassageStore, VectorSearch};

use crate::embeddings::Embedder;
use crate::lexical::LexicalIndex;
use crate::text;
use crate::vector_store::InMemoryVectorIndex;
use crate::RagError;

static NEXT_VERSION: AtomicU64 = AtomicU64::new(1);

/// Corpus-level content length statistics, in words
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CorpusStats {
    pub count: usize,
    pub mean_len: f32,
    pub std_len: f32,
}

impl CorpusStats {
    pub fn from_passages<'a>(passages: impl IntoIterator<Item = &'a Passage>) -> Self {
        let lengths: Vec<f32> = passages
            .into_iter()
            .map(|p| text::words(&p.content).len() as f32)
            .collect();
        let count = lengths.len();
        if count == 0 {
            return Self::default();
        }

        let mean_len = lengths.iter().sum::<f32>() / count as f32;
        let variance = lengths.iter().map(|l| (l - mean_len).powi(2)).sum::<f32>() / count as f32;
        Self {
            count,
            mean_len,
            std_len: variance.sqrt(),
        }
    }

    /// Standard score of a length, `None` when the corpus gives no spread
    pub fn z_score(&self, len: usize) -> Option<f32> {
        if self.count < 2 || self.std_len <= f32::EPSILON {
            return None;
        }
        Some((len as f32 - self.mean_len) / self.std_len)
    }
}

/// One consistent, read-only view of the corpus
pub struct IndexSnapshot {
    version: u64,
    passages: HashMap<String, Arc<Passage>>,
    lexical: LexicalIndex,
    vector: Arc<dyn VectorSearch>,
    stats: CorpusStats,
}

impl IndexSnapshot {
    /// Build lexical and in-memory vector indices over `passages`
    ///
    /// Later passages with a duplicate id replace earlier ones.
    pub fn build(
        passages: Vec<Passage>,
        embedder: &dyn Embedder,
        settings: &Settings,
    ) -> Result<Self, RagError> {
        let passages = dedup_by_id(passages);

        let texts: Vec<&str> = passages.iter().map(|p| p.content.as_str()).collect();
        let embeddings = embedder.embed_batch(&texts)?;
        let entries = passages
            .iter()
            .map(|p| p.id.clone())
            .zip(embeddings)
            .collect();
        let vector: Arc<dyn VectorSearch> = Arc::new(InMemoryVectorIndex::new(entries));

        Self::with_vector_search(passages, vector, settings)
    }

    /// Build around an external vector collaborator (e.g. Qdrant)
    pub fn with_vector_search(
        passages: Vec<Passage>,
        vector: Arc<dyn VectorSearch>,
        settings: &Settings,
    ) -> Result<Self, RagError> {
        let passages = dedup_by_id(passages);
        let lexical = LexicalIndex::build(&passages, &settings.lexical)?;
        let stats = CorpusStats::from_passages(&passages);
        let version = NEXT_VERSION.fetch_add(1, Ordering::Relaxed);

        tracing::info!(
            version,
            passages = passages.len(),
            vector = vector.name(),
            mean_len = stats.mean_len,
            "Index snapshot built"
        );

        Ok(Self {
            version,
            passages: passages
                .into_iter()
                .map(|p| (p.id.clone(), Arc::new(p)))
                .collect(),
            lexical,
            vector,
            stats,
        })
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn lexical(&self) -> &LexicalIndex {
        &self.lexical
    }

    pub fn vector(&self) -> Arc<dyn VectorSearch> {
        Arc::clone(&self.vector)
    }

    pub fn stats(&self) -> &CorpusStats {
        &self.stats
    }

    /// All passages, ordered by id
    pub fn passages(&self) -> Vec<Arc<Passage>> {
        let mut all: Vec<Arc<Passage>> = self.passages.values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }
}

fn dedup_by_id(passages: Vec<Passage>) -> Vec<Passage> {
    let mut position: HashMap<String, usize> = HashMap::new();
    let mut unique: Vec<Passage> = Vec::with_capacity(passages.len());
    for passage in passages {
        match position.get(&passage.id) {
            Some(&i) => {
                tracing::warn!(id = %passage.id, "Duplicate passage id, keeping the later one");
                unique[i] = passage;
            },
            None => {
                position.insert(passage.id.clone(), unique.len());
                unique.push(passage);
            },
        }
    }
    unique
}

impl PassageStore for IndexSnapshot {
    fn get_by_ids(&self, ids: &[String]) -> Vec<Arc<Passage>> {
        ids.iter()
            .filter_map(|id| self.passages.get(id).cloned())
            .collect()
    }

    fn get(&self, id: &str) -> Option<Arc<Passage>> {
        self.passages.get(id).cloned()
    }

    fn len(&self) -> usize {
        self.passages.len()
    }
}

/// Atomically swappable pointer to the current snapshot
#[derive(Default)]
pub struct SnapshotHandle {
    current: RwLock<Option<Arc<IndexSnapshot>>>,
}

impl SnapshotHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: IndexSnapshot) -> Self {
        Self {
            current: RwLock::new(Some(Arc::new(snapshot))),
        }
    }

    /// Snapshot to use for one whole query
    pub fn acquire(&self) -> Result<Arc<IndexSnapshot>, RagError> {
        self.current
            .read()
            .clone()
            .ok_or_else(|| RagError::IndexUnavailable("no index snapshot published".to_string()))
    }

    /// Publish a new snapshot, returning the previous one
    ///
    /// Queries holding the previous snapshot keep using it until they finish.
    pub fn swap(&self, snapshot: IndexSnapshot) -> Option<Arc<IndexSnapshot>> {
        let next = Arc::new(snapshot);
        tracing::info!(version = next.version(), "Publishing index snapshot");
        self.current.write().replace(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::HashingEmbedder;

    fn snapshot(passages: Vec<Passage>) -> IndexSnapshot {
        IndexSnapshot::build(passages, &HashingEmbedder::new(32), &Settings::default()).unwrap()
    }

    #[test]
    fn test_acquire_without_snapshot_is_unavailable() {
        let handle = SnapshotHandle::new();
        assert!(matches!(handle.acquire(), Err(RagError::IndexUnavailable(_))));
    }

    #[test]
    fn test_swap_keeps_acquired_snapshot_alive() {
        let handle = SnapshotHandle::with_snapshot(snapshot(vec![Passage::new("a", "d", "old text")]));
        let held = handle.acquire().unwrap();

        let previous = handle.swap(snapshot(vec![Passage::new("b", "d", "new text")]));
        assert_eq!(previous.map(|p| p.version()), Some(held.version()));

        // the held snapshot still answers from the old corpus
        assert!(held.get("a").is_some());
        assert!(held.get("b").is_none());

        let current = handle.acquire().unwrap();
        assert!(current.version() > held.version());
        assert!(current.get("b").is_some());
    }

    #[test]
    fn test_get_by_ids_skips_unknown_and_keeps_order() {
        let snap = snapshot(vec![
            Passage::new("a", "d", "alpha"),
            Passage::new("b", "d", "beta"),
        ]);
        let found = snap.get_by_ids(&["b".to_string(), "zz".to_string(), "a".to_string()]);
        let ids: Vec<&str> = found.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(snap.len(), 2);
    }

    #[test]
    fn test_duplicate_ids_keep_later_passage() {
        let snap = snapshot(vec![
            Passage::new("a", "d", "first"),
            Passage::new("a", "d", "second"),
        ]);
        assert_eq!(snap.len(), 1);
        assert_eq!(snap.get("a").unwrap().content, "second");
        assert_eq!(snap.lexical().doc_count(), 1);
    }

    #[test]
    fn test_corpus_stats() {
        let stats = CorpusStats::from_passages(&[
            Passage::new("a", "d", "one two"),
            Passage::new("b", "d", "one two three four"),
        ]);
        assert_eq!(stats.count, 2);
        assert!((stats.mean_len - 3.0).abs() < 1e-6);
        assert!((stats.std_len - 1.0).abs() < 1e-6);
        assert_eq!(stats.z_score(5), Some(2.0));
        assert_eq!(CorpusStats::default().z_score(5), None);
    }
}
