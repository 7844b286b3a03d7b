//! Configuration management for the ops assistant
//!
//! Supports loading configuration from:
//! - YAML/TOML/JSON files under `config/`
//! - Environment variables (OPS_ASSIST__ prefix, `__` separated)
//!
//! Every numeric default lives in [`constants`]; the settings structs only
//! wire them into serde defaults and validate overrides.

pub mod constants;
pub mod settings;
mod telemetry;

pub use settings::{
    load_settings, load_settings_from, ClassifierConfig, ContextConfig, FieldBoosts,
    FilterConfig, GradingConfig, LexicalConfig, LlmSettings, ObservabilityConfig, RankingConfig,
    RetrievalConfig, Settings, SpamConfig, VectorBackend, VectorStoreSettings, WeightPair,
};
pub use telemetry::init_tracing;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}
