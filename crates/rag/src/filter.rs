//! Two-phase metadata filtering with recall-preserving fallback
//!
//! Phase 1 (inclusive) runs on fused candidates before scoring and expands
//! each value through alias hierarchies, so `platform=ios` also admits
//! `mobile` and the universal tag. Phase 2 (strict) runs on the scored list
//! and requires exact equality for clauses marked `required`.
//!
//! When fewer than `min_results` passages survive, clauses are dropped one at
//! a time in the configured order and both phases run again. Dropping a clause
//! only weakens the predicates, so the surviving count never decreases.

use std::collections::HashSet;

use metrics::counter;

use ops_assist_config::FilterConfig;
use ops_assist_core::{DocType, FilterClause, FilterKind, Passage, ScoredPassage, SearchFilters};

use crate::reranker::Candidate;

/// One evaluation of the filter phases
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterStep {
    /// Filters active during this evaluation
    pub active: Vec<FilterKind>,
    /// Passages surviving both phases
    pub count: usize,
}

/// Filtered, scored results plus the relaxation trace
#[derive(Debug, Clone)]
pub struct FilterOutcome {
    pub results: Vec<ScoredPassage>,
    pub steps: Vec<FilterStep>,
    /// Filters left when the minimum was met
    pub applied: SearchFilters,
    /// Every filter had to be dropped
    pub degraded: bool,
}

/// Inclusive-then-strict metadata filter
pub struct TwoPhaseFilter {
    config: FilterConfig,
}

impl TwoPhaseFilter {
    pub fn new(config: FilterConfig) -> Self {
        Self { config }
    }

    /// Phase 1: every clause must match inclusively
    pub fn soft_matches(&self, passage: &Passage, filters: &SearchFilters) -> bool {
        filters
            .clauses
            .iter()
            .all(|clause| self.clause_soft_matches(passage, clause))
    }

    /// Phase 2: every required clause must match exactly
    pub fn hard_matches(&self, passage: &Passage, filters: &SearchFilters) -> bool {
        filters
            .clauses
            .iter()
            .filter(|clause| clause.required)
            .all(|clause| clause_hard_matches(passage, clause))
    }

    /// Order in which the clauses of `filters` get dropped
    ///
    /// Configured order first; kinds the configuration does not list follow
    /// in clause order.
    pub fn relaxation_order(&self, filters: &SearchFilters) -> Vec<FilterKind> {
        let present = filters.kinds();
        let mut order: Vec<FilterKind> = self
            .config
            .relaxation_order
            .iter()
            .filter_map(|name| FilterKind::parse(name))
            .filter(|kind| present.contains(kind))
            .collect();
        for kind in present {
            if !order.contains(&kind) {
                order.push(kind);
            }
        }
        order
    }

    /// Run both phases, relaxing filters until `min_results` is met
    ///
    /// `rerank` scores the candidates that pass phase 1; it must be a pure
    /// function of its input so repeated evaluations agree.
    pub fn run<F>(
        &self,
        candidates: &[Candidate],
        filters: &SearchFilters,
        mut rerank: F,
    ) -> FilterOutcome
    where
        F: FnMut(Vec<Candidate>) -> Vec<ScoredPassage>,
    {
        let mut active = filters.clone();
        let mut order = self.relaxation_order(filters).into_iter();
        let mut steps = Vec::new();

        loop {
            let admitted: Vec<Candidate> = candidates
                .iter()
                .filter(|c| self.soft_matches(&c.passage, &active))
                .cloned()
                .collect();
            let results: Vec<ScoredPassage> = rerank(admitted)
                .into_iter()
                .filter(|s| self.hard_matches(&s.passage, &active))
                .collect();

            steps.push(FilterStep {
                active: active.kinds(),
                count: results.len(),
            });

            if results.len() >= self.config.min_results || active.is_empty() {
                let degraded = !filters.is_empty() && active.is_empty();
                if degraded {
                    tracing::warn!(
                        count = results.len(),
                        min_results = self.config.min_results,
                        "All filters dropped, returning unfiltered ranking"
                    );
                }
                return FilterOutcome {
                    results,
                    steps,
                    applied: active,
                    degraded,
                };
            }

            let kind = match order.next() {
                Some(kind) => kind,
                None => {
                    active = SearchFilters::new();
                    continue;
                },
            };

            let excluded = match active.get(kind) {
                Some(clause) => candidates
                    .iter()
                    .filter(|c| {
                        !self.clause_soft_matches(&c.passage, clause)
                            || (clause.required && !clause_hard_matches(&c.passage, clause))
                    })
                    .count(),
                None => 0,
            };

            tracing::info!(
                filter = kind.as_str(),
                excluded,
                count = results.len(),
                min_results = self.config.min_results,
                "Dropping filter to preserve recall"
            );
            counter!("ops_assist_filter_dropped_total", "filter" => kind.as_str()).increment(1);
            counter!("ops_assist_filter_excluded_total", "filter" => kind.as_str())
                .increment(excluded as u64);

            active = active.without(kind);
        }
    }

    fn clause_soft_matches(&self, passage: &Passage, clause: &FilterClause) -> bool {
        let tag = match passage_tag(passage, clause.kind) {
            Some(tag) => tag,
            None => return self.config.keep_untagged,
        };
        if tag == self.config.universal_tag.to_lowercase() {
            return true;
        }
        self.accepted_values(clause).contains(&tag)
    }

    /// The clause value plus its inclusive aliases, normalised
    fn accepted_values(&self, clause: &FilterClause) -> HashSet<String> {
        let value = normalize(clause.kind, &clause.value);
        let aliases = match clause.kind {
            FilterKind::Platform => self.config.platform_aliases.get(&value),
            FilterKind::Environment => self.config.environment_aliases.get(&value),
            FilterKind::DocType => None,
        };

        let mut accepted: HashSet<String> = aliases
            .into_iter()
            .flatten()
            .map(|alias| normalize(clause.kind, alias))
            .collect();
        accepted.insert(value);
        accepted
    }
}

fn clause_hard_matches(passage: &Passage, clause: &FilterClause) -> bool {
    passage_tag(passage, clause.kind)
        .map(|tag| tag == normalize(clause.kind, &clause.value))
        .unwrap_or(false)
}

/// Normalised metadata tag for a filter dimension
fn passage_tag(passage: &Passage, kind: FilterKind) -> Option<String> {
    let meta = &passage.metadata;
    match kind {
        FilterKind::Platform => meta.platform.as_deref().map(|v| normalize(kind, v)),
        FilterKind::Environment => meta.environment.as_deref().map(|v| normalize(kind, v)),
        FilterKind::DocType => meta.doc_type.map(|d| d.as_str().to_string()),
    }
}

fn normalize(kind: FilterKind, value: &str) -> String {
    match kind {
        FilterKind::DocType => DocType::parse(value)
            .map(|d| d.as_str().to_string())
            .unwrap_or_else(|| value.trim().to_lowercase()),
        _ => value.trim().to_lowercase(),
    }
}
