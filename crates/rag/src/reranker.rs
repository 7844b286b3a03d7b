//! Multi-signal reranking
//!
//! Combines four per-passage signals into one final score:
//!
//! ```text
//! final = w_r * relevance + w_f * freshness + w_a * authority - w_s * spam
//! ```
//!
//! Relevance is the fused RRF score normalised by the best achievable fused
//! score for the query's weight pair, optionally blended with a local keyword
//! score from [`SimpleScorer`]. When the query contains recency language the
//! freshness weight is raised and relevance/authority are rescaled so the
//! positive weights keep their sum.
//!
//! Reranking is a pure function of the candidates, the configuration, the
//! corpus statistics and `now`; identical inputs always yield the same order.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use ops_assist_config::{RankingConfig, WeightPair};
use ops_assist_core::{sort_ranked, Passage, ScoredPassage, SignalScores};

use crate::fusion::{max_fused, FusedCandidate};
use crate::signals::{self, SpamDetector};
use crate::snapshot::CorpusStats;
use crate::text;

/// Fused candidate joined with its passage
#[derive(Debug, Clone)]
pub struct Candidate {
    pub passage: Arc<Passage>,
    pub fused: FusedCandidate,
}

/// Effective signal weights for one query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalWeights {
    pub relevance: f32,
    pub freshness: f32,
    pub authority: f32,
    pub spam: f32,
}

/// Query-dependent inputs to one reranking pass
#[derive(Debug, Clone, Copy)]
pub struct RerankRequest<'a> {
    pub query: &'a str,
    /// Lexical/vector weights the candidates were fused with
    pub fusion_weights: WeightPair,
    pub stats: &'a CorpusStats,
    pub now: DateTime<Utc>,
}

/// Final-stage reranker over fused candidates
pub struct MultiSignalReranker {
    config: RankingConfig,
    rrf_k: f32,
    spam: SpamDetector,
}

impl MultiSignalReranker {
    pub fn new(config: RankingConfig, rrf_k: f32) -> Self {
        let spam = SpamDetector::new(config.spam.clone());
        Self {
            config,
            rrf_k,
            spam,
        }
    }

    /// Signal weights, with the freshness boost applied when asked for
    pub fn weights_for(&self, query: &str) -> SignalWeights {
        let base = SignalWeights {
            relevance: self.config.relevance_weight,
            freshness: self.config.freshness_weight,
            authority: self.config.authority_weight,
            spam: self.config.spam_weight,
        };

        let boosted = self.config.freshness_boosted_weight;
        if boosted <= base.freshness
            || !signals::query_wants_freshness(query, &self.config.recency_terms)
        {
            return base;
        }

        let positive = base.relevance + base.freshness + base.authority;
        let others = base.relevance + base.authority;
        let freshness = boosted.min(positive);
        let scale = if others > 0.0 {
            (positive - freshness) / others
        } else {
            0.0
        };

        SignalWeights {
            relevance: base.relevance * scale,
            freshness,
            authority: base.authority * scale,
            spam: base.spam,
        }
    }

    /// Score and order candidates
    pub fn rerank(&self, request: &RerankRequest<'_>, candidates: Vec<Candidate>) -> Vec<ScoredPassage> {
        let weights = self.weights_for(request.query);
        let ceiling = max_fused(request.fusion_weights, self.rrf_k);

        let mut scored: Vec<ScoredPassage> = candidates
            .into_iter()
            .map(|candidate| {
                let scores = self.score(request, &weights, ceiling, &candidate);
                ScoredPassage::new(candidate.passage, scores)
            })
            .collect();

        sort_ranked(&mut scored);
        scored
    }

    fn score(
        &self,
        request: &RerankRequest<'_>,
        weights: &SignalWeights,
        ceiling: f32,
        candidate: &Candidate,
    ) -> SignalScores {
        let passage = &candidate.passage;

        let mut relevance = if ceiling > 0.0 {
            (candidate.fused.fused / ceiling).clamp(0.0, 1.0)
        } else {
            0.0
        };
        if self.config.refine_relevance {
            let blend = self.config.refine_blend.clamp(0.0, 1.0);
            let keyword = SimpleScorer::score(request.query, &scoring_text(passage));
            relevance = (1.0 - blend) * relevance + blend * keyword;
        }
        let relevance = finite_or_neutral(relevance);

        let freshness = signals::freshness(&passage.metadata, request.now, &self.config);
        let authority = signals::authority(&passage.metadata);
        let spam_penalty = self.spam.penalty(passage, request.stats);

        let final_score = weights.relevance * relevance
            + weights.freshness * freshness
            + weights.authority * authority
            - weights.spam * spam_penalty;

        SignalScores {
            lexical: candidate.fused.lexical_score,
            vector: candidate.fused.vector_score,
            fused: candidate.fused.fused,
            relevance,
            freshness,
            authority,
            spam_penalty,
            final_score: finite_or_neutral(final_score),
        }
    }
}

fn finite_or_neutral(value: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        ops_assist_config::constants::ranking::NEUTRAL_SIGNAL
    }
}

/// Title and content, the text keyword scoring looks at
fn scoring_text(passage: &Passage) -> String {
    match passage.title() {
        Some(title) => format!("{} {}", title, passage.content),
        None => passage.content.clone(),
    }
}

/// Lightweight keyword relevance scorer
///
/// Scoring formula:
/// - Term frequency: sqrt(count in doc) for diminishing returns
/// - IDF approximation: ln(1 + term length) favours specific terms
/// - Position weight: earlier query terms count slightly more
/// - Length normalisation: shorter passages are favoured slightly
/// - Coverage bonus for matching more of the query
pub struct SimpleScorer;

impl SimpleScorer {
    /// Score in [0, 1); 0.0 when the query has no content terms
    pub fn score(query: &str, document: &str) -> f32 {
        let mut query_terms = text::content_tokens(query);
        let mut seen = std::collections::HashSet::new();
        query_terms.retain(|t| seen.insert(t.clone()));
        if query_terms.is_empty() {
            return 0.0;
        }

        let doc_tokens = text::tokenize(document);
        let doc_len = text::words(document).len().max(1) as f32;
        let length_norm = 1.0 / (1.0 + (doc_len / 50.0).sqrt());

        let mut total_score = 0.0f32;
        let mut matched_terms = 0usize;

        for (pos, term) in query_terms.iter().enumerate() {
            let tf = doc_tokens.iter().filter(|t| *t == term).count() as f32;
            if tf > 0.0 {
                matched_terms += 1;
                let idf_approx = (1.0 + term.chars().count() as f32).ln();
                let position_weight = 1.0 / (1.0 + pos as f32 * 0.1);
                total_score += tf.sqrt() * idf_approx * position_weight * length_norm;
            }
        }

        let coverage = matched_terms as f32 / query_terms.len() as f32;
        let raw_score = total_score + coverage * 0.3;
        (raw_score / (raw_score + 1.0)).min(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use ops_assist_core::PassageMetadata;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    fn candidate(passage: Passage, fused: f32) -> Candidate {
        Candidate {
            fused: FusedCandidate {
                passage_id: passage.id.clone(),
                fused,
                lexical_rank: Some(1),
                vector_rank: Some(1),
                lexical_score: 2.0,
                vector_score: 0.5,
            },
            passage: Arc::new(passage),
        }
    }

    fn request<'a>(query: &'a str, stats: &'a CorpusStats) -> RerankRequest<'a> {
        RerankRequest {
            query,
            fusion_weights: WeightPair::new(0.5, 0.5),
            stats,
            now: now(),
        }
    }

    #[test]
    fn test_simple_scorer() {
        let score = SimpleScorer::score(
            "scheduler agent restart",
            "Restart the scheduler agent on the workstation",
        );
        assert!(score > 0.5);
        assert!(score < 1.0);

        let unrelated = SimpleScorer::score("scheduler agent restart", "payroll report totals");
        assert!(unrelated < score);
        assert_eq!(SimpleScorer::score("the of", "anything"), 0.0);
    }

    #[test]
    fn test_authority_breaks_relevance_tie() {
        let reranker = MultiSignalReranker::new(RankingConfig::default(), 60.0);
        let stats = CorpusStats::default();
        let content = "Restart the agent after the patch";

        let tier1 = Passage::new("b-tier1", "d", content).with_metadata(PassageMetadata {
            authority_tier: Some(1),
            ..Default::default()
        });
        let tier5 = Passage::new("a-tier5", "d", content).with_metadata(PassageMetadata {
            authority_tier: Some(5),
            ..Default::default()
        });

        let fused = 1.0 / 61.0;
        let ranked = reranker.rerank(
            &request("agent restart", &stats),
            vec![candidate(tier5, fused), candidate(tier1, fused)],
        );

        assert_eq!(ranked[0].id(), "b-tier1");
        assert_eq!(ranked[0].scores.authority, 1.0);
        assert_eq!(ranked[1].scores.authority, 0.0);
        assert_eq!(ranked[0].scores.relevance, ranked[1].scores.relevance);
    }

    #[test]
    fn test_final_score_formula() {
        let config = RankingConfig {
            refine_relevance: false,
            ..Default::default()
        };
        let reranker = MultiSignalReranker::new(config.clone(), 60.0);
        let stats = CorpusStats::default();

        let ranked = reranker.rerank(
            &request("anything", &stats),
            vec![candidate(Passage::new("p", "d", "text"), 1.0 / 61.0)],
        );
        let s = ranked[0].scores;

        assert!((s.relevance - 1.0).abs() < 1e-6);
        let expected = config.relevance_weight * s.relevance
            + config.freshness_weight * s.freshness
            + config.authority_weight * s.authority
            - config.spam_weight * s.spam_penalty;
        assert!((s.final_score - expected).abs() < 1e-6);
        assert_eq!(s.lexical, 2.0);
    }

    #[test]
    fn test_recency_query_boosts_freshness_weight() {
        let reranker = MultiSignalReranker::new(RankingConfig::default(), 60.0);
        let plain = reranker.weights_for("agent restart procedure");
        let recent = reranker.weights_for("latest agent restart procedure");

        assert!(recent.freshness > plain.freshness);
        assert!(recent.relevance < plain.relevance);
        let plain_sum = plain.relevance + plain.freshness + plain.authority;
        let recent_sum = recent.relevance + recent.freshness + recent.authority;
        assert!((plain_sum - recent_sum).abs() < 1e-6);
        assert_eq!(recent.spam, plain.spam);
    }

    #[test]
    fn test_rerank_is_deterministic() {
        let reranker = MultiSignalReranker::new(RankingConfig::default(), 60.0);
        let stats = CorpusStats::default();
        let make = || {
            vec![
                candidate(Passage::new("c", "d", "agent patch"), 0.010),
                candidate(Passage::new("a", "d", "agent restart"), 0.016),
                candidate(Passage::new("b", "d", "agent restart"), 0.016),
            ]
        };

        let first: Vec<String> = reranker
            .rerank(&request("agent restart", &stats), make())
            .iter()
            .map(|s| s.id().to_string())
            .collect();
        let second: Vec<String> = reranker
            .rerank(&request("agent restart", &stats), make())
            .iter()
            .map(|s| s.id().to_string())
            .collect();
        assert_eq!(first, second);
        assert_eq!(first, vec!["a", "b", "c"]);
    }
}
