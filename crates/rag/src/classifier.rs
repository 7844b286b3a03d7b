//! Query classification
//!
//! Detects literal identifiers (job and workstation codes, return-code
//! expressions, abend codes, message ids, `field=value` pairs) and maps the
//! resulting [`QueryType`] to a lexical/vector weight pair from configuration.

use once_cell::sync::Lazy;
use regex::Regex;

use ops_assist_config::{ClassifierConfig, WeightPair};
use ops_assist_core::QueryType;

/// Built-in literal patterns
static BUILTIN_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        // return-code expressions: RC=8, rc: 12
        r"(?i)\brc\s*[=:]\s*\d+\b",
        // abend codes: S0C4, S806, U4038
        r"\bS(?:[0-9][0-9A-F]{2}|[0-9A-F][0-9][0-9A-F]|[0-9A-F]{2}[0-9])\b|\bU\d{4}\b",
        // message identifiers: AWSBIA123E, IEF450I, EQQM931W
        r"\b[A-Z]{2,8}\d{3,5}[A-Z]?\b",
        // joined job/workstation codes: PAYROLL_01, CPU-WS-3
        r"\b[A-Z][A-Z0-9]*(?:[_-][A-Z0-9]+)+\b",
        // letter+digit codes: CPU01, WS3A
        r"\b[A-Z]{2,}\d+[A-Z0-9]*\b",
        // explicit field=value
        r"\b[A-Za-z_]+=[^\s=]+",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

/// Result of classifying one query
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedQuery {
    pub query_type: QueryType,
    /// Literal identifiers in order of appearance, deduplicated
    pub literals: Vec<String>,
    /// Natural-language words outside any literal
    pub word_count: usize,
    pub weights: WeightPair,
}

/// Pattern-based query classifier
pub struct QueryClassifier {
    extra_patterns: Vec<Regex>,
    config: ClassifierConfig,
}

impl QueryClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        let extra_patterns = config
            .extra_patterns
            .iter()
            .filter_map(|p| match Regex::new(p) {
                Ok(re) => Some(re),
                Err(e) => {
                    tracing::warn!(pattern = %p, error = %e, "Skipping invalid literal pattern");
                    None
                },
            })
            .collect();

        Self {
            extra_patterns,
            config,
        }
    }

    /// Weight pair configured for a query type
    pub fn weights_for(&self, query_type: QueryType) -> WeightPair {
        match query_type {
            QueryType::ExactMatch => self.config.exact_match,
            QueryType::Semantic => self.config.semantic,
            QueryType::Mixed => self.config.mixed,
            QueryType::Default => self.config.default,
        }
    }

    /// Classify a raw query; never fails, worst case is `DEFAULT`
    pub fn classify(&self, query: &str) -> ClassifiedQuery {
        let mut spans: Vec<(usize, usize)> = Vec::new();
        for pattern in BUILTIN_PATTERNS.iter().chain(self.extra_patterns.iter()) {
            spans.extend(pattern.find_iter(query).map(|m| (m.start(), m.end())));
        }
        let spans = merge_spans(spans);

        let mut literals: Vec<String> = Vec::new();
        for &(start, end) in &spans {
            let literal = query[start..end].to_string();
            if !literals.contains(&literal) {
                literals.push(literal);
            }
        }

        let word_count = natural_words(query, &spans);

        let query_type = if !literals.is_empty() {
            if word_count >= self.config.mixed_min_words {
                QueryType::Mixed
            } else {
                QueryType::ExactMatch
            }
        } else if word_count >= self.config.semantic_min_words {
            QueryType::Semantic
        } else {
            QueryType::Default
        };

        let weights = self.weights_for(query_type);
        tracing::debug!(
            %query_type,
            literals = ?literals,
            word_count,
            lexical = weights.lexical,
            vector = weights.vector,
            "Classified query"
        );

        ClassifiedQuery {
            query_type,
            literals,
            word_count,
            weights,
        }
    }
}

impl Default for QueryClassifier {
    fn default() -> Self {
        Self::new(ClassifierConfig::default())
    }
}

/// Sort and merge overlapping byte spans
fn merge_spans(mut spans: Vec<(usize, usize)>) -> Vec<(usize, usize)> {
    spans.sort_unstable();
    let mut merged: Vec<(usize, usize)> = Vec::with_capacity(spans.len());
    for (start, end) in spans {
        match merged.last_mut() {
            Some(last) if start <= last.1 => last.1 = last.1.max(end),
            _ => merged.push((start, end)),
        }
    }
    merged
}

/// Count alphabetic words that do not overlap a literal span
fn natural_words(query: &str, spans: &[(usize, usize)]) -> usize {
    let mut count = 0;
    let mut offset = 0;
    for piece in query.split_whitespace() {
        let start = match query[offset..].find(piece) {
            Some(pos) => offset + pos,
            None => continue,
        };
        let end = start + piece.len();
        offset = end;

        let overlaps = spans.iter().any(|&(s, e)| start < e && s < end);
        if !overlaps && piece.chars().any(char::is_alphabetic) {
            count += 1;
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(query: &str) -> ClassifiedQuery {
        QueryClassifier::default().classify(query)
    }

    #[test]
    fn test_rc_with_words_is_mixed() {
        let result = classify("RC=8 no batch");
        assert_eq!(result.query_type, QueryType::Mixed);
        assert_eq!(result.literals, vec!["RC=8".to_string()]);
        assert!(result.weights.lexical >= 0.6);
    }

    #[test]
    fn test_bare_identifiers_are_exact_match() {
        let result = classify("PAYROLL_01 S0C4");
        assert_eq!(result.query_type, QueryType::ExactMatch);
        assert_eq!(result.literals, vec!["PAYROLL_01", "S0C4"]);
        assert_eq!(result.weights, WeightPair::new(0.2, 0.8));
    }

    #[test]
    fn test_natural_language_is_semantic() {
        let result = classify("how do I restart a failed job stream");
        assert_eq!(result.query_type, QueryType::Semantic);
        assert!(result.literals.is_empty());
        assert_eq!(result.weights.vector, 0.8);
    }

    #[test]
    fn test_short_or_empty_is_default() {
        assert_eq!(classify("").query_type, QueryType::Default);
        assert_eq!(classify("restart job").query_type, QueryType::Default);
    }

    #[test]
    fn test_message_ids_and_field_values() {
        let result = classify("AWSBIA123E status=abend");
        assert_eq!(result.query_type, QueryType::ExactMatch);
        assert_eq!(result.literals, vec!["AWSBIA123E", "status=abend"]);
    }

    #[test]
    fn test_plain_capitalised_words_are_not_literals() {
        let result = classify("Why did SEED fail on Monday");
        assert!(result.literals.is_empty());
        assert_eq!(result.query_type, QueryType::Semantic);
    }

    #[test]
    fn test_extra_patterns_extend_and_invalid_are_skipped() {
        let config = ClassifierConfig {
            extra_patterns: vec![r"\bjs\d+\b".to_string(), "(unclosed".to_string()],
            ..Default::default()
        };
        let classifier = QueryClassifier::new(config);
        let result = classifier.classify("js42");
        assert_eq!(result.query_type, QueryType::ExactMatch);
    }

    #[test]
    fn test_weights_follow_configuration() {
        let config = ClassifierConfig {
            mixed: WeightPair::new(0.3, 0.7),
            ..Default::default()
        };
        let classifier = QueryClassifier::new(config);
        assert_eq!(classifier.classify("RC=8 no batch").weights.lexical, 0.7);
    }
}
