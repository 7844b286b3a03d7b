//! Scored passages produced by ranking

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;

use crate::passage::Passage;

/// Per-signal score vector
///
/// `final_score` is a pure function of the other signals and the configured
/// weights; it is recomputed, never stored independently.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalScores {
    /// Raw BM25 score (0.0 when absent from the lexical list)
    pub lexical: f32,
    /// Raw vector similarity (0.0 when absent from the vector list)
    pub vector: f32,
    /// Weighted reciprocal rank fusion score
    pub fused: f32,
    /// Normalised (and optionally refined) relevance in [0, 1]
    pub relevance: f32,
    pub freshness: f32,
    pub authority: f32,
    pub spam_penalty: f32,
    #[serde(rename = "final")]
    pub final_score: f32,
}

/// A passage with its ranking signals
#[derive(Debug, Clone)]
pub struct ScoredPassage {
    pub passage: Arc<Passage>,
    pub scores: SignalScores,
}

impl ScoredPassage {
    pub fn new(passage: Arc<Passage>, scores: SignalScores) -> Self {
        Self { passage, scores }
    }

    pub fn id(&self) -> &str {
        &self.passage.id
    }

    /// Ordering by final score descending, then passage id ascending
    pub fn rank_cmp(a: &ScoredPassage, b: &ScoredPassage) -> Ordering {
        b.scores
            .final_score
            .total_cmp(&a.scores.final_score)
            .then_with(|| a.passage.id.cmp(&b.passage.id))
    }
}

/// Sort scored passages into their stable final order
pub fn sort_ranked(passages: &mut [ScoredPassage]) {
    passages.sort_by(ScoredPassage::rank_cmp);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scored(id: &str, final_score: f32) -> ScoredPassage {
        ScoredPassage::new(
            Arc::new(Passage::new(id, "doc", "text")),
            SignalScores {
                final_score,
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_ties_broken_by_id() {
        let mut items = vec![scored("c", 0.5), scored("a", 0.5), scored("b", 0.9)];
        sort_ranked(&mut items);
        let ids: Vec<&str> = items.iter().map(|s| s.id()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }
}
