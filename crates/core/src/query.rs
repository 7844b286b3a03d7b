//! Query types: detected query type and caller-supplied metadata filters

use serde::{Deserialize, Serialize};
use std::fmt;

/// Detected query type, selecting the lexical/vector weight pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryType {
    /// Literal identifiers dominate
    ExactMatch,
    /// Natural language only
    Semantic,
    /// Literals plus a natural-language clause
    Mixed,
    /// No usable signal
    Default,
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QueryType::ExactMatch => "EXACT_MATCH",
            QueryType::Semantic => "SEMANTIC",
            QueryType::Mixed => "MIXED",
            QueryType::Default => "DEFAULT",
        };
        f.write_str(name)
    }
}

/// Metadata dimension a filter constrains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    Platform,
    Environment,
    DocType,
}

impl FilterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterKind::Platform => "platform",
            FilterKind::Environment => "environment",
            FilterKind::DocType => "doc_type",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "platform" => Some(Self::Platform),
            "environment" | "env" => Some(Self::Environment),
            "doc_type" | "doctype" => Some(Self::DocType),
            _ => None,
        }
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One filter constraint
///
/// Every clause participates in the inclusive phase; `required` clauses are
/// additionally enforced by strict matching after scoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterClause {
    pub kind: FilterKind,
    pub value: String,
    #[serde(default)]
    pub required: bool,
}

/// Optional soft/hard filters accompanying a query
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchFilters {
    #[serde(default)]
    pub clauses: Vec<FilterClause>,
}

impl SearchFilters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn platform(self, value: impl Into<String>) -> Self {
        self.with(FilterKind::Platform, value, false)
    }

    pub fn environment(self, value: impl Into<String>) -> Self {
        self.with(FilterKind::Environment, value, false)
    }

    pub fn doc_type(self, value: impl Into<String>) -> Self {
        self.with(FilterKind::DocType, value, false)
    }

    /// Add a clause that must also match strictly
    pub fn require(self, kind: FilterKind, value: impl Into<String>) -> Self {
        self.with(kind, value, true)
    }

    /// Add or replace the clause for `kind`
    pub fn with(mut self, kind: FilterKind, value: impl Into<String>, required: bool) -> Self {
        self.clauses.retain(|c| c.kind != kind);
        self.clauses.push(FilterClause {
            kind,
            value: value.into(),
            required,
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn get(&self, kind: FilterKind) -> Option<&FilterClause> {
        self.clauses.iter().find(|c| c.kind == kind)
    }

    /// Copy of these filters without the clause for `kind`
    pub fn without(&self, kind: FilterKind) -> Self {
        Self {
            clauses: self
                .clauses
                .iter()
                .filter(|c| c.kind != kind)
                .cloned()
                .collect(),
        }
    }

    pub fn kinds(&self) -> Vec<FilterKind> {
        self.clauses.iter().map(|c| c.kind).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filters_builder_replaces_kind() {
        let filters = SearchFilters::new()
            .platform("ios")
            .environment("prod")
            .require(FilterKind::Platform, "android");

        assert_eq!(filters.clauses.len(), 2);
        let platform = filters.get(FilterKind::Platform).unwrap();
        assert_eq!(platform.value, "android");
        assert!(platform.required);

        let relaxed = filters.without(FilterKind::Platform);
        assert_eq!(relaxed.kinds(), vec![FilterKind::Environment]);
    }

    #[test]
    fn test_query_type_display() {
        assert_eq!(QueryType::ExactMatch.to_string(), "EXACT_MATCH");
        assert_eq!(FilterKind::parse("env"), Some(FilterKind::Environment));
    }
}
