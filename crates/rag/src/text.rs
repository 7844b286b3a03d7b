//! Text normalisation shared by indexing, scoring and judging
//!
//! Compound identifiers such as `PAYROLL_01`, `CPU-WS-3` or `RC=8` are kept as
//! one token and also split into their parts, so a lookup for the exact
//! identifier and a lookup for `payroll` both hit.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use unicode_segmentation::UnicodeSegmentation;

/// Characters that glue compound identifiers together
const JOINERS: [char; 3] = ['-', '_', '='];

/// Common English stopwords, ignored by keyword scoring and support checks
const STOPWORDS: &[&str] = &[
    "the", "a", "an", "is", "are", "was", "were", "be", "been", "being", "have", "has", "had",
    "do", "does", "did", "will", "would", "could", "should", "may", "might", "must", "shall",
    "can", "to", "of", "in", "for", "on", "with", "at", "by", "from", "as", "into", "through",
    "during", "before", "after", "then", "once", "here", "there", "when", "where", "why", "how",
    "what", "which", "who", "all", "each", "some", "such", "no", "nor", "not", "only", "so",
    "than", "too", "very", "just", "and", "or", "but", "if", "it", "its", "this", "that",
    "these", "those", "i", "you", "we", "they", "he", "she", "my", "your", "our", "their", "me",
    "us", "them", "about", "any", "also",
];

static STOPWORD_SET: Lazy<HashSet<&'static str>> = Lazy::new(|| STOPWORDS.iter().copied().collect());

fn is_joiner(c: char) -> bool {
    JOINERS.contains(&c)
}

/// Raw lowercase tokens, compounds intact
pub fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || is_joiner(c)))
        .map(|raw| raw.trim_matches(is_joiner))
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

/// Index/query tokens: every compound followed by its parts
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for word in words(text) {
        if word.contains(is_joiner) {
            let parts: Vec<String> = word
                .split(is_joiner)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect();
            tokens.push(word);
            tokens.extend(parts);
        } else {
            tokens.push(word);
        }
    }
    tokens
}

/// Tokens joined by single spaces, ready for a whitespace analyzer
pub fn index_text(text: &str) -> String {
    tokenize(text).join(" ")
}

pub fn is_stopword(token: &str) -> bool {
    STOPWORD_SET.contains(token)
}

/// Tokens that carry meaning: stopwords and single characters removed
pub fn content_tokens(text: &str) -> Vec<String> {
    tokenize(text)
        .into_iter()
        .filter(|t| t.chars().count() > 1 && !is_stopword(t))
        .collect()
}

/// Approximate LLM token count (~4 grapheme clusters per token)
pub fn estimate_tokens(text: &str) -> usize {
    text.graphemes(true).count().div_ceil(4)
}

/// Content fingerprint that ignores case and whitespace layout
pub fn content_hash(text: &str) -> blake3::Hash {
    let normalized = text
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ");
    blake3::hash(normalized.as_bytes())
}
