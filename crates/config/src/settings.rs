//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::constants::{
    classifier, context, endpoints, filter, grading, lexical, ranking, retrieval, spam,
};
use crate::ConfigError;

/// Tolerance when checking that a weight pair sums to 1.0
const WEIGHT_SUM_TOLERANCE: f32 = 0.01;

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub classifier: ClassifierConfig,

    #[serde(default)]
    pub lexical: LexicalConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub filter: FilterConfig,

    #[serde(default)]
    pub ranking: RankingConfig,

    #[serde(default)]
    pub context: ContextConfig,

    #[serde(default)]
    pub grading: GradingConfig,

    #[serde(default)]
    pub vector_store: VectorStoreSettings,

    #[serde(default)]
    pub llm: LlmSettings,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Settings {
    /// Create default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_classifier()?;
        self.validate_retrieval()?;
        self.validate_filter()?;
        self.validate_ranking()?;
        self.validate_context()?;
        self.validate_grading()?;
        Ok(())
    }

    fn validate_classifier(&self) -> Result<(), ConfigError> {
        let pairs = [
            ("classifier.exact_match", &self.classifier.exact_match),
            ("classifier.semantic", &self.classifier.semantic),
            ("classifier.mixed", &self.classifier.mixed),
            ("classifier.default", &self.classifier.default),
        ];
        for (field, pair) in pairs {
            pair.validate(field)?;
        }
        Ok(())
    }

    fn validate_retrieval(&self) -> Result<(), ConfigError> {
        let r = &self.retrieval;

        if !(r.rrf_k > 0.0) {
            return Err(invalid("retrieval.rrf_k", format!("Must be positive, got {}", r.rrf_k)));
        }
        if r.lexical_timeout_ms == 0 || r.vector_timeout_ms == 0 {
            return Err(invalid("retrieval.*_timeout_ms", "Timeouts must be positive"));
        }
        if r.top_k == 0 {
            return Err(invalid("retrieval.top_k", "Must be at least 1"));
        }
        if r.embedding_dim == 0 {
            return Err(invalid("retrieval.embedding_dim", "Must be at least 1"));
        }
        Ok(())
    }

    fn validate_filter(&self) -> Result<(), ConfigError> {
        if self.filter.min_results == 0 {
            return Err(invalid("filter.min_results", "Must be at least 1"));
        }
        for name in &self.filter.relaxation_order {
            if !matches!(name.as_str(), "platform" | "environment" | "doc_type") {
                return Err(invalid(
                    "filter.relaxation_order",
                    format!("Unknown filter '{}'", name),
                ));
            }
        }
        Ok(())
    }

    fn validate_ranking(&self) -> Result<(), ConfigError> {
        let r = &self.ranking;
        let weights = [
            ("ranking.relevance_weight", r.relevance_weight),
            ("ranking.freshness_weight", r.freshness_weight),
            ("ranking.authority_weight", r.authority_weight),
            ("ranking.spam_weight", r.spam_weight),
            ("ranking.freshness_boosted_weight", r.freshness_boosted_weight),
            ("ranking.refine_blend", r.refine_blend),
        ];
        for (field, value) in weights {
            check_unit(field, value)?;
        }

        if !(r.half_life_days > 0.0) {
            return Err(invalid(
                "ranking.half_life_days",
                format!("Must be positive, got {}", r.half_life_days),
            ));
        }
        if r.recent_bonus < 1.0 {
            return Err(invalid("ranking.recent_bonus", "Must be at least 1.0"));
        }
        check_unit("ranking.deprecated_penalty", r.deprecated_penalty)?;

        let s = &r.spam;
        for (field, value) in [
            ("ranking.spam.stuffing_ratio", s.stuffing_ratio),
            ("ranking.spam.min_unique_ratio", s.min_unique_ratio),
            ("ranking.spam.stuffing_penalty", s.stuffing_penalty),
            ("ranking.spam.repetition_penalty", s.repetition_penalty),
            ("ranking.spam.missing_metadata_penalty", s.missing_metadata_penalty),
            ("ranking.spam.length_penalty", s.length_penalty),
        ] {
            check_unit(field, value)?;
        }
        Ok(())
    }

    fn validate_context(&self) -> Result<(), ConfigError> {
        if self.context.token_budget == 0 {
            return Err(invalid("context.token_budget", "Must be at least 1"));
        }
        if self.context.max_passages == Some(0) {
            return Err(invalid("context.max_passages", "Must be at least 1 when set"));
        }
        Ok(())
    }

    fn validate_grading(&self) -> Result<(), ConfigError> {
        let g = &self.grading;
        if g.generation_timeout_ms == 0 || g.grading_timeout_ms == 0 {
            return Err(invalid("grading.*_timeout_ms", "Timeouts must be positive"));
        }
        check_unit("grading.groundedness_threshold", g.groundedness_threshold)?;
        check_unit("grading.usefulness_threshold", g.usefulness_threshold)?;
        Ok(())
    }
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        message: message.into(),
    }
}

fn check_unit(field: &str, value: f32) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(invalid(
            field,
            format!("Must be between 0.0 and 1.0, got {}", value),
        ));
    }
    Ok(())
}

fn default_true() -> bool {
    true
}

/// Vector/lexical weight pair for one query type
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightPair {
    pub vector: f32,
    pub lexical: f32,
}

impl WeightPair {
    pub const fn new(vector: f32, lexical: f32) -> Self {
        Self { vector, lexical }
    }

    const fn from_tuple(pair: (f32, f32)) -> Self {
        Self::new(pair.0, pair.1)
    }

    fn validate(&self, field: &str) -> Result<(), ConfigError> {
        check_unit(&format!("{}.vector", field), self.vector)?;
        check_unit(&format!("{}.lexical", field), self.lexical)?;
        let sum = self.vector + self.lexical;
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(invalid(field, format!("Weights must sum to 1.0, got {}", sum)));
        }
        Ok(())
    }
}

/// Query classifier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default = "default_exact_match")]
    pub exact_match: WeightPair,

    #[serde(default = "default_semantic")]
    pub semantic: WeightPair,

    #[serde(default = "default_mixed")]
    pub mixed: WeightPair,

    #[serde(default = "default_default_pair")]
    pub default: WeightPair,

    /// Natural-language words that turn a literal query into MIXED
    #[serde(default = "default_mixed_min_words")]
    pub mixed_min_words: usize,

    /// Natural-language words needed for SEMANTIC
    #[serde(default = "default_semantic_min_words")]
    pub semantic_min_words: usize,

    /// Additional literal-identifier regexes; invalid ones are skipped
    #[serde(default)]
    pub extra_patterns: Vec<String>,
}

fn default_exact_match() -> WeightPair {
    WeightPair::from_tuple(classifier::EXACT_MATCH)
}
fn default_semantic() -> WeightPair {
    WeightPair::from_tuple(classifier::SEMANTIC)
}
fn default_mixed() -> WeightPair {
    WeightPair::from_tuple(classifier::MIXED)
}
fn default_default_pair() -> WeightPair {
    WeightPair::from_tuple(classifier::DEFAULT)
}
fn default_mixed_min_words() -> usize {
    classifier::MIXED_MIN_WORDS
}
fn default_semantic_min_words() -> usize {
    classifier::SEMANTIC_MIN_WORDS
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            exact_match: default_exact_match(),
            semantic: default_semantic(),
            mixed: default_mixed(),
            default: default_default_pair(),
            mixed_min_words: default_mixed_min_words(),
            semantic_min_words: default_semantic_min_words(),
            extra_patterns: Vec::new(),
        }
    }
}

/// Per-field boost multipliers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldBoosts {
    #[serde(default = "default_title_boost")]
    pub title: f32,
    #[serde(default = "default_job_name_boost")]
    pub job_name: f32,
    #[serde(default = "default_workstation_boost")]
    pub workstation: f32,
    #[serde(default = "default_error_code_boost")]
    pub error_code: f32,
    #[serde(default = "default_message_id_boost")]
    pub message_id: f32,
    #[serde(default = "default_body_boost")]
    pub body: f32,
}

fn default_title_boost() -> f32 {
    lexical::TITLE_BOOST
}
fn default_job_name_boost() -> f32 {
    lexical::JOB_NAME_BOOST
}
fn default_workstation_boost() -> f32 {
    lexical::WORKSTATION_BOOST
}
fn default_error_code_boost() -> f32 {
    lexical::ERROR_CODE_BOOST
}
fn default_message_id_boost() -> f32 {
    lexical::MESSAGE_ID_BOOST
}
fn default_body_boost() -> f32 {
    lexical::BODY_BOOST
}

impl Default for FieldBoosts {
    fn default() -> Self {
        Self {
            title: default_title_boost(),
            job_name: default_job_name_boost(),
            workstation: default_workstation_boost(),
            error_code: default_error_code_boost(),
            message_id: default_message_id_boost(),
            body: default_body_boost(),
        }
    }
}

impl FieldBoosts {
    /// Boost by field name, 1.0 for unknown fields
    pub fn get(&self, field: &str) -> f32 {
        match field {
            "title" => self.title,
            "job_name" => self.job_name,
            "workstation" => self.workstation,
            "error_code" => self.error_code,
            "message_id" => self.message_id,
            "body" => self.body,
            _ => 1.0,
        }
    }
}

/// Lexical index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LexicalConfig {
    #[serde(default)]
    pub field_boosts: FieldBoosts,

    #[serde(default = "default_writer_heap")]
    pub writer_heap_bytes: usize,
}

fn default_writer_heap() -> usize {
    lexical::WRITER_HEAP_BYTES
}

impl Default for LexicalConfig {
    fn default() -> Self {
        Self {
            field_boosts: FieldBoosts::default(),
            writer_heap_bytes: default_writer_heap(),
        }
    }
}

/// Hybrid retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_lexical_top_k")]
    pub lexical_top_k: usize,

    #[serde(default = "default_vector_top_k")]
    pub vector_top_k: usize,

    /// Results returned to the caller
    #[serde(default = "default_final_top_k")]
    pub top_k: usize,

    /// RRF rank offset
    #[serde(default = "default_rrf_k")]
    pub rrf_k: f32,

    #[serde(default = "default_lexical_timeout_ms")]
    pub lexical_timeout_ms: u64,

    #[serde(default = "default_vector_timeout_ms")]
    pub vector_timeout_ms: u64,

    #[serde(default = "default_embedding_dim")]
    pub embedding_dim: usize,
}

fn default_lexical_top_k() -> usize {
    retrieval::LEXICAL_TOP_K
}
fn default_vector_top_k() -> usize {
    retrieval::VECTOR_TOP_K
}
fn default_final_top_k() -> usize {
    retrieval::FINAL_TOP_K
}
fn default_rrf_k() -> f32 {
    retrieval::RRF_K
}
fn default_lexical_timeout_ms() -> u64 {
    retrieval::LEXICAL_TIMEOUT_MS
}
fn default_vector_timeout_ms() -> u64 {
    retrieval::VECTOR_TIMEOUT_MS
}
fn default_embedding_dim() -> usize {
    retrieval::EMBEDDING_DIM
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            lexical_top_k: default_lexical_top_k(),
            vector_top_k: default_vector_top_k(),
            top_k: default_final_top_k(),
            rrf_k: default_rrf_k(),
            lexical_timeout_ms: default_lexical_timeout_ms(),
            vector_timeout_ms: default_vector_timeout_ms(),
            embedding_dim: default_embedding_dim(),
        }
    }
}

/// Two-phase filter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    #[serde(default = "default_min_results")]
    pub min_results: usize,

    /// Order in which filters are dropped, least specific first
    #[serde(default = "default_relaxation_order")]
    pub relaxation_order: Vec<String>,

    /// Tag matching every value in the inclusive phase
    #[serde(default = "default_universal_tag")]
    pub universal_tag: String,

    /// Keep passages without a tag during the inclusive phase
    #[serde(default = "default_true")]
    pub keep_untagged: bool,

    /// Inclusive expansions for platform values
    #[serde(default = "default_platform_aliases")]
    pub platform_aliases: HashMap<String, Vec<String>>,

    /// Inclusive expansions for environment values
    #[serde(default = "default_environment_aliases")]
    pub environment_aliases: HashMap<String, Vec<String>>,
}

fn default_min_results() -> usize {
    filter::MIN_RESULTS
}
fn default_relaxation_order() -> Vec<String> {
    filter::RELAXATION_ORDER.iter().map(|s| s.to_string()).collect()
}
fn default_universal_tag() -> String {
    filter::UNIVERSAL_TAG.to_string()
}

fn alias_map(entries: &[(&str, &[&str])]) -> HashMap<String, Vec<String>> {
    entries
        .iter()
        .map(|(key, values)| {
            (
                key.to_string(),
                values.iter().map(|v| v.to_string()).collect(),
            )
        })
        .collect()
}

fn default_platform_aliases() -> HashMap<String, Vec<String>> {
    alias_map(&[
        ("ios", &["mobile"]),
        ("android", &["mobile"]),
        ("windows", &["desktop", "distributed"]),
        ("linux", &["unix", "distributed"]),
        ("aix", &["unix", "distributed"]),
        ("zos", &["mainframe"]),
    ])
}

fn default_environment_aliases() -> HashMap<String, Vec<String>> {
    alias_map(&[
        ("prod", &["production"]),
        ("production", &["prod"]),
        ("staging", &["stage", "preprod"]),
        ("dev", &["development"]),
        ("development", &["dev"]),
        ("test", &["qa", "uat"]),
    ])
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_results: default_min_results(),
            relaxation_order: default_relaxation_order(),
            universal_tag: default_universal_tag(),
            keep_untagged: true,
            platform_aliases: default_platform_aliases(),
            environment_aliases: default_environment_aliases(),
        }
    }
}

/// Spam detector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpamConfig {
    #[serde(default = "default_stuffing_ratio")]
    pub stuffing_ratio: f32,
    #[serde(default = "default_min_unique_ratio")]
    pub min_unique_ratio: f32,
    #[serde(default = "default_length_z_threshold")]
    pub length_z_threshold: f32,
    #[serde(default = "default_spam_min_tokens")]
    pub min_tokens: usize,
    #[serde(default = "default_stuffing_penalty")]
    pub stuffing_penalty: f32,
    #[serde(default = "default_repetition_penalty")]
    pub repetition_penalty: f32,
    #[serde(default = "default_missing_metadata_penalty")]
    pub missing_metadata_penalty: f32,
    #[serde(default = "default_length_penalty")]
    pub length_penalty: f32,
    /// Metadata fields whose absence is penalised
    #[serde(default = "default_required_metadata")]
    pub required_metadata: Vec<String>,
}

fn default_stuffing_ratio() -> f32 {
    spam::STUFFING_RATIO
}
fn default_min_unique_ratio() -> f32 {
    spam::MIN_UNIQUE_RATIO
}
fn default_length_z_threshold() -> f32 {
    spam::LENGTH_Z_THRESHOLD
}
fn default_spam_min_tokens() -> usize {
    spam::MIN_TOKENS
}
fn default_stuffing_penalty() -> f32 {
    spam::STUFFING_PENALTY
}
fn default_repetition_penalty() -> f32 {
    spam::REPETITION_PENALTY
}
fn default_missing_metadata_penalty() -> f32 {
    spam::MISSING_METADATA_PENALTY
}
fn default_length_penalty() -> f32 {
    spam::LENGTH_PENALTY
}
fn default_required_metadata() -> Vec<String> {
    vec!["doc_type".to_string(), "last_updated".to_string()]
}

impl Default for SpamConfig {
    fn default() -> Self {
        Self {
            stuffing_ratio: default_stuffing_ratio(),
            min_unique_ratio: default_min_unique_ratio(),
            length_z_threshold: default_length_z_threshold(),
            min_tokens: default_spam_min_tokens(),
            stuffing_penalty: default_stuffing_penalty(),
            repetition_penalty: default_repetition_penalty(),
            missing_metadata_penalty: default_missing_metadata_penalty(),
            length_penalty: default_length_penalty(),
            required_metadata: default_required_metadata(),
        }
    }
}

/// Multi-signal reranking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingConfig {
    #[serde(default = "default_relevance_weight")]
    pub relevance_weight: f32,
    #[serde(default = "default_freshness_weight")]
    pub freshness_weight: f32,
    #[serde(default = "default_authority_weight")]
    pub authority_weight: f32,
    #[serde(default = "default_spam_weight")]
    pub spam_weight: f32,

    /// Freshness weight used when the query asks for recent information
    #[serde(default = "default_freshness_boosted_weight")]
    pub freshness_boosted_weight: f32,

    #[serde(default = "default_half_life_days")]
    pub half_life_days: f64,
    #[serde(default = "default_recent_window_days")]
    pub recent_window_days: i64,
    #[serde(default = "default_recent_bonus")]
    pub recent_bonus: f32,
    #[serde(default = "default_deprecated_penalty")]
    pub deprecated_penalty: f32,

    #[serde(default = "default_recency_terms")]
    pub recency_terms: Vec<String>,

    /// Blend local keyword scoring into relevance
    #[serde(default = "default_true")]
    pub refine_relevance: bool,
    #[serde(default = "default_refine_blend")]
    pub refine_blend: f32,

    #[serde(default)]
    pub spam: SpamConfig,
}

fn default_relevance_weight() -> f32 {
    ranking::RELEVANCE_WEIGHT
}
fn default_freshness_weight() -> f32 {
    ranking::FRESHNESS_WEIGHT
}
fn default_authority_weight() -> f32 {
    ranking::AUTHORITY_WEIGHT
}
fn default_spam_weight() -> f32 {
    ranking::SPAM_WEIGHT
}
fn default_freshness_boosted_weight() -> f32 {
    ranking::FRESHNESS_BOOSTED_WEIGHT
}
fn default_half_life_days() -> f64 {
    ranking::HALF_LIFE_DAYS
}
fn default_recent_window_days() -> i64 {
    ranking::RECENT_WINDOW_DAYS
}
fn default_recent_bonus() -> f32 {
    ranking::RECENT_BONUS
}
fn default_deprecated_penalty() -> f32 {
    ranking::DEPRECATED_PENALTY
}
fn default_recency_terms() -> Vec<String> {
    ranking::RECENCY_TERMS.iter().map(|s| s.to_string()).collect()
}
fn default_refine_blend() -> f32 {
    ranking::REFINE_BLEND
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            relevance_weight: default_relevance_weight(),
            freshness_weight: default_freshness_weight(),
            authority_weight: default_authority_weight(),
            spam_weight: default_spam_weight(),
            freshness_boosted_weight: default_freshness_boosted_weight(),
            half_life_days: default_half_life_days(),
            recent_window_days: default_recent_window_days(),
            recent_bonus: default_recent_bonus(),
            deprecated_penalty: default_deprecated_penalty(),
            recency_terms: default_recency_terms(),
            refine_relevance: true,
            refine_blend: default_refine_blend(),
            spam: SpamConfig::default(),
        }
    }
}

/// Context assembly configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    #[serde(default = "default_token_budget")]
    pub token_budget: usize,

    /// Optional cap on passage count, on top of the token budget
    #[serde(default)]
    pub max_passages: Option<usize>,
}

fn default_token_budget() -> usize {
    context::TOKEN_BUDGET
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            token_budget: default_token_budget(),
            max_passages: None,
        }
    }
}

/// Grading and regeneration configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradingConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    #[serde(default = "default_generation_timeout_ms")]
    pub generation_timeout_ms: u64,

    #[serde(default = "default_grading_timeout_ms")]
    pub grading_timeout_ms: u64,

    /// Pass the grader's rationale to the next attempt
    #[serde(default = "default_true")]
    pub retry_feedback: bool,

    /// Returned when generation fails before any answer exists
    #[serde(default = "default_fallback_answer")]
    pub fallback_answer: String,

    /// Heuristic judge: per-sentence support needed for groundedness
    #[serde(default = "default_groundedness_threshold")]
    pub groundedness_threshold: f32,

    /// Heuristic judge: query coverage needed for usefulness
    #[serde(default = "default_usefulness_threshold")]
    pub usefulness_threshold: f32,
}

fn default_max_retries() -> usize {
    grading::MAX_RETRIES
}
fn default_generation_timeout_ms() -> u64 {
    grading::GENERATION_TIMEOUT_MS
}
fn default_grading_timeout_ms() -> u64 {
    grading::GRADING_TIMEOUT_MS
}
fn default_fallback_answer() -> String {
    grading::FALLBACK_ANSWER.to_string()
}
fn default_groundedness_threshold() -> f32 {
    grading::GROUNDEDNESS_THRESHOLD
}
fn default_usefulness_threshold() -> f32 {
    grading::USEFULNESS_THRESHOLD
}

impl Default for GradingConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            generation_timeout_ms: default_generation_timeout_ms(),
            grading_timeout_ms: default_grading_timeout_ms(),
            retry_feedback: true,
            fallback_answer: default_fallback_answer(),
            groundedness_threshold: default_groundedness_threshold(),
            usefulness_threshold: default_usefulness_threshold(),
        }
    }
}

/// Which vector collaborator backs retrieval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum VectorBackend {
    /// Exact scan inside the index snapshot
    #[default]
    Memory,
    /// Remote Qdrant collection
    Qdrant,
}

/// Vector store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreSettings {
    #[serde(default)]
    pub backend: VectorBackend,

    #[serde(default = "default_qdrant_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_qdrant_collection")]
    pub collection: String,

    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_qdrant_endpoint() -> String {
    endpoints::QDRANT_DEFAULT.to_string()
}
fn default_qdrant_collection() -> String {
    endpoints::QDRANT_COLLECTION.to_string()
}

impl Default for VectorStoreSettings {
    fn default() -> Self {
        Self {
            backend: VectorBackend::default(),
            endpoint: default_qdrant_endpoint(),
            collection: default_qdrant_collection(),
            api_key: None,
        }
    }
}

/// LLM backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Model used for judging; falls back to `model`
    #[serde(default)]
    pub judge_model: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,

    /// Transport-level retries for transient errors
    #[serde(default = "default_llm_max_retries")]
    pub max_retries: u32,
}

fn default_llm_endpoint() -> String {
    endpoints::OLLAMA_DEFAULT.to_string()
}
fn default_llm_model() -> String {
    endpoints::OLLAMA_MODEL.to_string()
}
fn default_temperature() -> f32 {
    0.1
}
fn default_max_tokens() -> usize {
    512
}
fn default_llm_timeout_secs() -> u64 {
    30
}
fn default_llm_max_retries() -> u32 {
    3
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            endpoint: default_llm_endpoint(),
            model: default_llm_model(),
            judge_model: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_llm_timeout_secs(),
            max_retries: default_llm_max_retries(),
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub log_json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
        }
    }
}

/// Load settings from files and environment
///
/// Sources, later ones overriding earlier ones:
/// 1. `config/default.{yaml,toml,json}`
/// 2. `config/{env}.{yaml,toml,json}`
/// 3. `OPS_ASSIST__SECTION__KEY` environment variables
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    load_settings_from("config", env)
}

/// Same as [`load_settings`] with an explicit config directory
pub fn load_settings_from(dir: &str, env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    // Load default config
    builder = builder.add_source(File::with_name(&format!("{}/default", dir)).required(false));

    // Load environment-specific config
    if let Some(env_name) = env {
        builder =
            builder.add_source(File::with_name(&format!("{}/{}", dir, env_name)).required(false));
    }

    // Load from environment variables
    builder = builder.add_source(
        Environment::with_prefix("OPS_ASSIST")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    settings.validate()?;

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.classifier.exact_match, WeightPair::new(0.2, 0.8));
        assert_eq!(settings.classifier.mixed.lexical, 0.6);
        assert_eq!(settings.retrieval.rrf_k, 60.0);
        assert_eq!(settings.grading.max_retries, 2);
        assert_eq!(settings.filter.relaxation_order[0], "doc_type");
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_weight_pair_must_sum_to_one() {
        let mut settings = Settings::default();
        settings.classifier.semantic = WeightPair::new(0.7, 0.7);
        assert!(settings.validate().is_err());

        settings.classifier.semantic = WeightPair::new(0.705, 0.3);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_ranking_validation() {
        let mut settings = Settings::default();
        settings.ranking.freshness_weight = 1.5;
        assert!(settings.validate_ranking().is_err());

        settings.ranking.freshness_weight = 0.2;
        settings.ranking.half_life_days = 0.0;
        assert!(settings.validate_ranking().is_err());
    }

    #[test]
    fn test_filter_validation() {
        let mut settings = Settings::default();
        settings.filter.relaxation_order = vec!["region".to_string()];
        assert!(settings.validate_filter().is_err());

        settings.filter.relaxation_order = vec!["platform".to_string()];
        settings.filter.min_results = 0;
        assert!(settings.validate_filter().is_err());
    }

    #[test]
    fn test_zero_budget_rejected() {
        let mut settings = Settings::default();
        settings.context.token_budget = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_field_boosts_lookup() {
        let boosts = FieldBoosts::default();
        assert_eq!(boosts.get("error_code"), 4.0);
        assert_eq!(boosts.get("body"), 1.0);
        assert_eq!(boosts.get("unknown"), 1.0);
    }

    #[test]
    fn test_load_settings_from_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("default.yaml"),
            "retrieval:\n  top_k: 4\ngrading:\n  max_retries: 1\nfilter:\n  min_results: 2\n",
        )
        .unwrap();

        let settings = load_settings_from(dir.path().to_str().unwrap(), None).unwrap();
        assert_eq!(settings.retrieval.top_k, 4);
        assert_eq!(settings.grading.max_retries, 1);
        assert_eq!(settings.filter.min_results, 2);
        // untouched sections keep their defaults
        assert_eq!(settings.ranking.relevance_weight, 0.5);
    }

    #[test]
    fn test_invalid_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("default.yaml"),
            "classifier:\n  mixed:\n    vector: 0.9\n    lexical: 0.9\n",
        )
        .unwrap();

        let err = load_settings_from(dir.path().to_str().unwrap(), None).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_settings_yaml_roundtrip_keeps_aliases() {
        let yaml = serde_yaml::to_string(&Settings::default()).unwrap();
        let parsed: Settings = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(
            parsed.filter.platform_aliases.get("ios"),
            Some(&vec!["mobile".to_string()])
        );
    }
}
