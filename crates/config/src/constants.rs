//! Centralized defaults for the retrieval and grounding pipeline
//!
//! Every tunable number used downstream starts here. Settings structs take
//! their `Default` values from these modules so nothing else hardcodes them.

/// Query classification weight pairs, as (vector, lexical)
pub mod classifier {
    pub const EXACT_MATCH: (f32, f32) = (0.2, 0.8);
    pub const SEMANTIC: (f32, f32) = (0.8, 0.2);
    pub const MIXED: (f32, f32) = (0.4, 0.6);
    pub const DEFAULT: (f32, f32) = (0.5, 0.5);

    /// Natural-language words needed next to a literal for MIXED
    pub const MIXED_MIN_WORDS: usize = 2;

    /// Natural-language words needed without literals for SEMANTIC
    pub const SEMANTIC_MIN_WORDS: usize = 3;
}

/// Per-field lexical boosts
pub mod lexical {
    pub const TITLE_BOOST: f32 = 1.5;
    pub const JOB_NAME_BOOST: f32 = 3.0;
    pub const WORKSTATION_BOOST: f32 = 2.5;
    pub const ERROR_CODE_BOOST: f32 = 4.0;
    pub const MESSAGE_ID_BOOST: f32 = 3.5;
    pub const BODY_BOOST: f32 = 1.0;

    /// Index writer heap (tantivy requires at least 15MB)
    pub const WRITER_HEAP_BYTES: usize = 50_000_000;
}

/// Hybrid retrieval and fusion
pub mod retrieval {
    pub const LEXICAL_TOP_K: usize = 50;
    pub const VECTOR_TOP_K: usize = 50;
    pub const FINAL_TOP_K: usize = 10;

    /// Reciprocal rank fusion offset
    pub const RRF_K: f32 = 60.0;

    pub const LEXICAL_TIMEOUT_MS: u64 = 500;
    pub const VECTOR_TIMEOUT_MS: u64 = 500;

    pub const EMBEDDING_DIM: usize = 256;
}

/// Two-phase filtering
pub mod filter {
    /// Minimum surviving results before filters are relaxed
    pub const MIN_RESULTS: usize = 3;

    /// Tag that matches every filter value in the inclusive phase
    pub const UNIVERSAL_TAG: &str = "all";

    /// Relaxation order, least specific first
    pub const RELAXATION_ORDER: [&str; 3] = ["doc_type", "environment", "platform"];
}

/// Multi-signal reranking
pub mod ranking {
    pub const RELEVANCE_WEIGHT: f32 = 0.5;
    pub const FRESHNESS_WEIGHT: f32 = 0.2;
    pub const AUTHORITY_WEIGHT: f32 = 0.2;
    pub const SPAM_WEIGHT: f32 = 0.1;

    /// Freshness weight for queries containing recency language
    pub const FRESHNESS_BOOSTED_WEIGHT: f32 = 0.35;

    pub const HALF_LIFE_DAYS: f64 = 180.0;
    pub const RECENT_WINDOW_DAYS: i64 = 30;
    pub const RECENT_BONUS: f32 = 1.2;
    pub const DEPRECATED_PENALTY: f32 = 0.3;

    /// Value used for any signal that cannot be computed
    pub const NEUTRAL_SIGNAL: f32 = 0.5;

    /// Share of the relevance signal taken from local keyword scoring
    pub const REFINE_BLEND: f32 = 0.3;

    pub const RECENCY_TERMS: [&str; 8] = [
        "latest", "current", "currently", "today", "recent", "newest", "now", "new",
    ];
}

/// Spam detection thresholds
pub mod spam {
    /// Share of tokens taken by the most frequent term
    pub const STUFFING_RATIO: f32 = 0.25;

    /// Minimum distinct-token share before content counts as repetitive
    pub const MIN_UNIQUE_RATIO: f32 = 0.3;

    /// Length z-score beyond which content is anomalous
    pub const LENGTH_Z_THRESHOLD: f32 = 3.0;

    /// Passages shorter than this are never checked for stuffing
    pub const MIN_TOKENS: usize = 8;

    pub const STUFFING_PENALTY: f32 = 0.5;
    pub const REPETITION_PENALTY: f32 = 0.4;
    pub const MISSING_METADATA_PENALTY: f32 = 0.2;
    pub const LENGTH_PENALTY: f32 = 0.3;
}

/// Context assembly
pub mod context {
    pub const TOKEN_BUDGET: usize = 2048;
}

/// Grading and regeneration
pub mod grading {
    pub const MAX_RETRIES: usize = 2;
    pub const GENERATION_TIMEOUT_MS: u64 = 30_000;
    pub const GRADING_TIMEOUT_MS: u64 = 10_000;

    /// Share of an answer sentence's content tokens that must appear in context
    pub const GROUNDEDNESS_THRESHOLD: f32 = 0.6;

    /// Share of the query's content tokens an answer must cover
    pub const USEFULNESS_THRESHOLD: f32 = 0.2;

    pub const FALLBACK_ANSWER: &str =
        "I could not produce an answer for this request. Please try again shortly.";
}

/// Service endpoints
pub mod endpoints {
    pub const OLLAMA_DEFAULT: &str = "http://localhost:11434";
    pub const QDRANT_DEFAULT: &str = "http://localhost:6334";
    pub const QDRANT_COLLECTION: &str = "ops_passages";
    pub const OLLAMA_MODEL: &str = "qwen2.5:7b-instruct";
}
