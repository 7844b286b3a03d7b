//! Weighted reciprocal rank fusion
//!
//! `fused = w_lex / (k + rank_lex) + w_vec / (k + rank_vec)` with 1-based
//! ranks. A passage missing from one list gets no contribution from it.

use std::collections::HashMap;

use ops_assist_config::WeightPair;
use ops_assist_core::VectorHit;

use crate::lexical::LexicalHit;

/// One passage after fusion
#[derive(Debug, Clone, PartialEq)]
pub struct FusedCandidate {
    pub passage_id: String,
    pub fused: f32,
    pub lexical_rank: Option<usize>,
    pub vector_rank: Option<usize>,
    /// Raw BM25 score, 0.0 when absent from the lexical list
    pub lexical_score: f32,
    /// Raw similarity, 0.0 when absent from the vector list
    pub vector_score: f32,
}

/// Fuse the two ranked lists
///
/// Each list is taken in the order given; a repeated id keeps its first
/// (best) rank. Output is ordered by fused score descending, then id.
pub fn rrf_fuse(
    lexical: &[LexicalHit],
    vector: &[VectorHit],
    weights: WeightPair,
    rank_offset: f32,
) -> Vec<FusedCandidate> {
    let mut by_id: HashMap<&str, FusedCandidate> = HashMap::new();

    for (i, hit) in lexical.iter().enumerate() {
        let entry = by_id
            .entry(hit.passage_id.as_str())
            .or_insert_with(|| empty(&hit.passage_id));
        if entry.lexical_rank.is_none() {
            let rank = i + 1;
            entry.lexical_rank = Some(rank);
            entry.lexical_score = hit.score;
            entry.fused += weights.lexical / (rank_offset + rank as f32);
        }
    }

    for (i, hit) in vector.iter().enumerate() {
        let entry = by_id
            .entry(hit.passage_id.as_str())
            .or_insert_with(|| empty(&hit.passage_id));
        if entry.vector_rank.is_none() {
            let rank = i + 1;
            entry.vector_rank = Some(rank);
            entry.vector_score = hit.similarity;
            entry.fused += weights.vector / (rank_offset + rank as f32);
        }
    }

    let mut fused: Vec<FusedCandidate> = by_id.into_values().collect();
    fused.sort_by(|a, b| {
        b.fused
            .total_cmp(&a.fused)
            .then_with(|| a.passage_id.cmp(&b.passage_id))
    });
    fused
}

/// Highest fused score any passage can reach: rank 1 in both lists
pub fn max_fused(weights: WeightPair, rank_offset: f32) -> f32 {
    (weights.lexical + weights.vector) / (rank_offset + 1.0)
}

fn empty(passage_id: &str) -> FusedCandidate {
    FusedCandidate {
        passage_id: passage_id.to_string(),
        fused: 0.0,
        lexical_rank: None,
        vector_rank: None,
        lexical_score: 0.0,
        vector_score: 0.0,
    }
}
