//! Per-passage ranking signals
//!
//! Freshness and authority are derived from metadata at query time; the spam
//! penalty looks at the content itself plus corpus length statistics. Every
//! signal is in [0, 1], and any signal that cannot be computed falls back to
//! the neutral value instead of failing the query.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use ops_assist_config::constants::ranking::NEUTRAL_SIGNAL;
use ops_assist_config::{RankingConfig, SpamConfig};
use ops_assist_core::{Passage, PassageMetadata};

use crate::snapshot::CorpusStats;
use crate::text;

/// Number of tiers each authority component is ranked on
const AUTHORITY_TIERS: f32 = 5.0;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Exponential-decay freshness with a recent-window bonus
///
/// `0.5 ^ (age / half_life)`, multiplied by the bonus inside the recent
/// window and capped at 1.0. Deprecated passages are scaled down by the
/// deprecation penalty. Future timestamps count as age zero.
pub fn freshness(meta: &PassageMetadata, now: DateTime<Utc>, config: &RankingConfig) -> f32 {
    let base = match meta.last_updated {
        Some(updated) => {
            let age_days = ((now - updated).num_seconds() as f64 / SECONDS_PER_DAY).max(0.0);
            let half_life = config.half_life_days.max(f64::EPSILON);
            let mut score = 0.5f64.powf(age_days / half_life) as f32;
            if age_days <= config.recent_window_days as f64 {
                score *= config.recent_bonus;
            }
            score.min(1.0)
        },
        None => NEUTRAL_SIGNAL,
    };

    let score = if meta.is_deprecated {
        base * config.deprecated_penalty
    } else {
        base
    };

    if score.is_finite() {
        score.clamp(0.0, 1.0)
    } else {
        NEUTRAL_SIGNAL
    }
}

/// Mean of the available authority components
///
/// Each of doc type, source tier and explicit authority tier maps its
/// position to `1 - rank / 4`, so the top tier scores 1.0 and the bottom 0.0.
pub fn authority(meta: &PassageMetadata) -> f32 {
    let mut components = Vec::with_capacity(3);

    if let Some(doc_type) = meta.doc_type {
        components.push(tier_score(doc_type.rank()));
    }
    if let Some(source_tier) = meta.source_tier {
        components.push(tier_score(source_tier.rank()));
    }
    if let Some(tier) = meta.authority_tier {
        components.push(tier_score(tier.clamp(1, 5) - 1));
    }

    if components.is_empty() {
        return NEUTRAL_SIGNAL;
    }
    components.iter().sum::<f32>() / components.len() as f32
}

fn tier_score(rank: u8) -> f32 {
    1.0 - rank as f32 / (AUTHORITY_TIERS - 1.0)
}

/// Whether the query asks for recent information
pub fn query_wants_freshness(query: &str, recency_terms: &[String]) -> bool {
    let words = text::words(query);
    recency_terms
        .iter()
        .any(|term| words.iter().any(|w| w.eq_ignore_ascii_case(term)))
}

/// Which heuristics fired for a passage
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SpamReport {
    pub stuffing: bool,
    pub repetition: bool,
    /// Share of required metadata fields that are absent
    pub missing_metadata: f32,
    pub length_anomaly: bool,
    pub penalty: f32,
}

/// Heuristic low-quality content detector
pub struct SpamDetector {
    config: SpamConfig,
}

impl SpamDetector {
    pub fn new(config: SpamConfig) -> Self {
        Self { config }
    }

    /// Combined penalty in [0, 1]
    pub fn penalty(&self, passage: &Passage, stats: &CorpusStats) -> f32 {
        self.inspect(passage, stats).penalty
    }

    pub fn inspect(&self, passage: &Passage, stats: &CorpusStats) -> SpamReport {
        let tokens = text::content_tokens(&passage.content);
        let mut report = SpamReport::default();

        if tokens.len() >= self.config.min_tokens {
            let mut counts: HashMap<&str, usize> = HashMap::new();
            for token in &tokens {
                *counts.entry(token.as_str()).or_insert(0) += 1;
            }
            let total = tokens.len() as f32;
            let top = counts.values().copied().max().unwrap_or(0) as f32;

            report.stuffing = top / total > self.config.stuffing_ratio;
            report.repetition = (counts.len() as f32 / total) < self.config.min_unique_ratio;
        }

        let required = &self.config.required_metadata;
        if !required.is_empty() {
            let missing = required
                .iter()
                .filter(|field| is_missing(&passage.metadata, field))
                .count();
            report.missing_metadata = missing as f32 / required.len() as f32;
        }

        let length = text::words(&passage.content).len();
        report.length_anomaly = stats
            .z_score(length)
            .map(|z| z.abs() > self.config.length_z_threshold)
            .unwrap_or(false);

        let mut penalty = report.missing_metadata * self.config.missing_metadata_penalty;
        if report.stuffing {
            penalty += self.config.stuffing_penalty;
        }
        if report.repetition {
            penalty += self.config.repetition_penalty;
        }
        if report.length_anomaly {
            penalty += self.config.length_penalty;
        }
        report.penalty = if penalty.is_finite() {
            penalty.clamp(0.0, 1.0)
        } else {
            0.0
        };

        if report.penalty > 0.0 {
            tracing::debug!(
                id = %passage.id,
                stuffing = report.stuffing,
                repetition = report.repetition,
                missing_metadata = report.missing_metadata,
                length_anomaly = report.length_anomaly,
                penalty = report.penalty,
                "Spam heuristics fired"
            );
        }
        report
    }
}

/// Unknown field names never count as missing
fn is_missing(meta: &PassageMetadata, field: &str) -> bool {
    match field {
        "doc_type" => meta.doc_type.is_none(),
        "source_tier" => meta.source_tier.is_none(),
        "authority_tier" => meta.authority_tier.is_none(),
        "last_updated" => meta.last_updated.is_none(),
        "doc_version" => meta.doc_version.is_none(),
        "platform" => meta.platform.is_none(),
        "environment" => meta.environment.is_none(),
        _ => false,
    }
}
