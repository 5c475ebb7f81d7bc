//! Configuration management for the mnemo services
//!
//! Supports loading configuration from:
//! - YAML/TOML files (`config/default.yaml`, then `config/{env}.yaml`)
//! - Environment variables (`MNEMO__` prefix, `__` as section separator)
//!
//! All three binaries (gateway, worker, preprocessor) share one `Settings`
//! tree; each reads the sections it needs.

pub mod settings;

pub use settings::{
    load_settings, ArchivalConfig, BackendRoute, DatabaseConfig, EmbeddingConfig, MemoryConfig,
    ObservabilityConfig, PreprocessorConfig, QueueConfig, RedisConfig, ServerConfig, Settings,
    SummarizerConfig, WorkerConfig,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}
