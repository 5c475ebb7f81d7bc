//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::ConfigError;

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// PostgreSQL configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Redis short-term buffer configuration
    #[serde(default)]
    pub redis: RedisConfig,

    /// NATS JetStream configuration
    #[serde(default)]
    pub queue: QueueConfig,

    /// Embedding service configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Knowledge-graph store configuration
    #[serde(default)]
    pub archival: ArchivalConfig,

    /// Summarizer model configuration
    #[serde(default)]
    pub summarizer: SummarizerConfig,

    /// Code preprocessor configuration
    #[serde(default)]
    pub preprocessor: PreprocessorConfig,

    /// Backend LLM routes (alias -> backend)
    #[serde(default = "default_backends")]
    pub backends: Vec<BackendRoute>,

    /// Memory promotion thresholds
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Ingest worker tuning
    #[serde(default)]
    pub worker: WorkerConfig,

    /// Logging configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            redis: RedisConfig::default(),
            queue: QueueConfig::default(),
            embedding: EmbeddingConfig::default(),
            archival: ArchivalConfig::default(),
            summarizer: SummarizerConfig::default(),
            preprocessor: PreprocessorConfig::default(),
            backends: default_backends(),
            memory: MemoryConfig::default(),
            worker: WorkerConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Gateway bind port
    #[serde(default = "default_gateway_port")]
    pub port: u16,
}

fn default_gateway_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_pg_host")]
    pub host: String,
    #[serde(default = "default_pg_port")]
    pub port: u16,
    #[serde(default = "default_pg_user")]
    pub user: String,
    #[serde(default = "default_pg_password")]
    pub password: String,
    #[serde(default = "default_pg_database")]
    pub database: String,
    /// Pool bounds for the gateway; the worker applies its own cap
    #[serde(default = "default_pool_min")]
    pub min_connections: u32,
    #[serde(default = "default_pool_max")]
    pub max_connections: u32,
}

fn default_pg_host() -> String {
    "postgresql".to_string()
}

fn default_pg_port() -> u16 {
    5432
}

fn default_pg_user() -> String {
    "lightrag".to_string()
}

fn default_pg_password() -> String {
    "graphrag-local-2024".to_string()
}

fn default_pg_database() -> String {
    "lightrag".to_string()
}

fn default_pool_min() -> u32 {
    2
}

fn default_pool_max() -> u32 {
    10
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: default_pg_host(),
            port: default_pg_port(),
            user: default_pg_user(),
            password: default_pg_password(),
            database: default_pg_database(),
            min_connections: default_pool_min(),
            max_connections: default_pool_max(),
        }
    }
}

impl DatabaseConfig {
    pub fn connect_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.database
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    #[serde(default = "default_redis_url")]
    pub url: String,
    /// TTL applied to each session's short-term log
    #[serde(default = "default_session_ttl")]
    pub session_ttl_seconds: u64,
}

fn default_redis_url() -> String {
    "redis://redis:6379/0".to_string()
}

fn default_session_ttl() -> u64 {
    7200
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            session_ttl_seconds: default_session_ttl(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "default_nats_url")]
    pub url: String,
}

fn default_nats_url() -> String {
    "nats://nats:4222".to_string()
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            url: default_nats_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embed_url")]
    pub url: String,
    #[serde(default = "default_embed_model")]
    pub model: String,
    #[serde(default = "default_embed_dim")]
    pub dim: usize,
}

fn default_embed_url() -> String {
    "http://ollama-embed:11434".to_string()
}

fn default_embed_model() -> String {
    "qwen3-embedding:0.6b".to_string()
}

fn default_embed_dim() -> usize {
    1024
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            url: default_embed_url(),
            model: default_embed_model(),
            dim: default_embed_dim(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchivalConfig {
    #[serde(default = "default_archival_url")]
    pub url: String,
}

fn default_archival_url() -> String {
    "http://lightrag:9621".to_string()
}

impl Default for ArchivalConfig {
    fn default() -> Self {
        Self {
            url: default_archival_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizerConfig {
    #[serde(default = "default_summarizer_url")]
    pub url: String,
    #[serde(default = "default_summarizer_model")]
    pub model: String,
}

fn default_summarizer_url() -> String {
    "http://ollama-extract:11434".to_string()
}

fn default_summarizer_model() -> String {
    "qwen3:8b".to_string()
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            url: default_summarizer_url(),
            model: default_summarizer_model(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessorConfig {
    /// Where the worker reaches the preprocessor
    #[serde(default = "default_preprocessor_url")]
    pub url: String,
    /// Bind port of the preprocessor binary itself
    #[serde(default = "default_preprocessor_port")]
    pub port: u16,
}

fn default_preprocessor_url() -> String {
    "http://code-preprocessor:8090".to_string()
}

fn default_preprocessor_port() -> u16 {
    8090
}

impl Default for PreprocessorConfig {
    fn default() -> Self {
        Self {
            url: default_preprocessor_url(),
            port: default_preprocessor_port(),
        }
    }
}

/// One external model alias mapped to a backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendRoute {
    pub alias: String,
    pub url: String,
    pub model: String,
}

fn default_backends() -> Vec<BackendRoute> {
    let qwen_url = "http://qwen3-coder-next-predictor.llm-serving.svc.cluster.local:80";
    let deepseek_url = "http://deepseek-r1-distill-32b-predictor.llm-serving.svc.cluster.local:80";
    vec![
        BackendRoute {
            alias: "qwen3-coder".to_string(),
            url: qwen_url.to_string(),
            model: "qwen3-coder-next:q4_K_M".to_string(),
        },
        BackendRoute {
            alias: "qwen3-coder-next".to_string(),
            url: qwen_url.to_string(),
            model: "qwen3-coder-next:q4_K_M".to_string(),
        },
        BackendRoute {
            alias: "deepseek-r1".to_string(),
            url: deepseek_url.to_string(),
            model: "deepseek-r1:32b".to_string(),
        },
        BackendRoute {
            alias: "deepseek".to_string(),
            url: deepseek_url.to_string(),
            model: "deepseek-r1:32b".to_string(),
        },
    ]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Summarize every N persisted turns
    #[serde(default = "default_promote_after")]
    pub promote_after_turns: i64,
    /// Push to archival every N persisted turns
    #[serde(default = "default_archival_after")]
    pub archival_after_turns: i64,
    #[serde(default = "default_recall_top_k")]
    pub recall_top_k: i64,
    #[serde(default = "default_archival_top_k")]
    pub archival_top_k: i64,
}

fn default_promote_after() -> i64 {
    10
}

fn default_archival_after() -> i64 {
    20
}

fn default_recall_top_k() -> i64 {
    3
}

fn default_archival_top_k() -> i64 {
    3
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            promote_after_turns: default_promote_after(),
            archival_after_turns: default_archival_after(),
            recall_top_k: default_recall_top_k(),
            archival_top_k: default_archival_top_k(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    #[serde(default = "default_max_redeliveries")]
    pub max_redeliveries: i64,
    #[serde(default = "default_ack_wait")]
    pub ack_wait_seconds: u64,
    /// Files per preprocessor call during codebase ingestion
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// The worker keeps a smaller pool than the gateway
    #[serde(default = "default_worker_pool_max")]
    pub max_db_connections: u32,
}

fn default_max_redeliveries() -> i64 {
    3
}

fn default_ack_wait() -> u64 {
    600
}

fn default_batch_size() -> usize {
    20
}

fn default_worker_pool_max() -> u32 {
    5
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_redeliveries: default_max_redeliveries(),
            ack_wait_seconds: default_ack_wait(),
            batch_size: default_batch_size(),
            max_db_connections: default_worker_pool_max(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
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

/// Load settings from config files and environment.
///
/// Priority: env vars > `config/{env}.yaml` > `config/default.yaml` > defaults.
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    let default_path = Path::new("config/default.yaml");
    if default_path.exists() {
        builder = builder.add_source(File::from(default_path));
    }

    if let Some(env_name) = env {
        let env_path = format!("config/{env_name}.yaml");
        if Path::new(&env_path).exists() {
            builder = builder.add_source(File::with_name(&env_path));
        }
    }

    builder = builder.add_source(Environment::with_prefix("MNEMO").separator("__"));

    let settings = builder.build()?.try_deserialize()?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_deployment_values() {
        let settings = Settings::default();
        assert_eq!(settings.redis.session_ttl_seconds, 7200);
        assert_eq!(settings.memory.promote_after_turns, 10);
        assert_eq!(settings.memory.archival_after_turns, 20);
        assert_eq!(settings.worker.max_redeliveries, 3);
        assert_eq!(settings.worker.ack_wait_seconds, 600);
        assert_eq!(settings.worker.batch_size, 20);
        assert_eq!(settings.embedding.dim, 1024);
    }

    #[test]
    fn test_default_backends_cover_both_clusters() {
        let routes = default_backends();
        assert_eq!(routes.len(), 4);
        let urls: std::collections::HashSet<_> = routes.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls.len(), 2);
    }

    #[test]
    fn test_connect_url() {
        let db = DatabaseConfig::default();
        assert!(db.connect_url().starts_with("postgres://lightrag:"));
        assert!(db.connect_url().ends_with("/lightrag"));
    }
}
