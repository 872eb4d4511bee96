//! Configuration management for ChatDock services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default, config/<env>, config/local)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,

    /// Relational store configuration
    pub database: DatabaseConfig,

    /// Document store (DynamoDB) configuration
    pub document_store: DocumentStoreConfig,

    /// Cache configuration (declared for parity with the deployment
    /// environment; nothing reads it yet)
    #[serde(default)]
    pub cache: CacheConfig,

    /// Embedding service configuration
    pub embedding: EmbeddingConfig,

    /// Chat model configuration
    pub chat: ChatConfig,

    /// Vector index configuration
    pub vector: VectorConfig,

    /// WhatsApp Business transport configuration
    pub whatsapp: WhatsAppConfig,

    /// Authentication configuration
    pub auth: AuthConfig,

    /// Observability configuration
    pub observability: ObservabilityConfig,

    /// Rate limiting configuration
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Shutdown timeout in seconds
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Database URL
    pub url: String,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Idle timeout in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DocumentStoreConfig {
    /// AWS region
    #[serde(default = "default_region")]
    pub region: String,

    /// Custom endpoint (LocalStack in development)
    pub endpoint_url: Option<String>,

    /// Create tables at startup when missing
    #[serde(default = "default_true")]
    pub create_tables: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CacheConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    /// Embedding provider: openai, mock
    #[serde(default = "default_provider")]
    pub provider: String,

    /// API key for the embedding service
    pub api_key: Option<String>,

    /// API base URL (for custom endpoints)
    pub api_base: Option<String>,

    /// Model to use
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Embedding dimension
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Request timeout in seconds
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,

    /// Maximum retries
    #[serde(default = "default_embedding_retries")]
    pub max_retries: u32,

    /// Batch size for embedding requests
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatConfig {
    /// Chat provider: openai, mock
    #[serde(default = "default_provider")]
    pub provider: String,

    /// API key for the chat-completion service
    pub api_key: Option<String>,

    /// API base URL (for custom endpoints)
    pub api_base: Option<String>,

    /// Model to use
    #[serde(default = "default_chat_model")]
    pub model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VectorConfig {
    /// Vector index provider: pinecone, memory
    #[serde(default = "default_vector_provider")]
    pub provider: String,

    /// API key for the vector index
    pub api_key: Option<String>,

    /// Index base URL (host of the provisioned index)
    pub index_url: Option<String>,

    /// Provider environment identifier
    pub environment: Option<String>,

    /// Results returned per similarity query
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WhatsAppConfig {
    /// Graph API access token
    pub api_token: String,

    /// Webhook verification token
    pub verify_token: String,

    /// Business phone number id used on the send path
    pub phone_id: String,

    /// Graph API base URL
    #[serde(default = "default_graph_api_base")]
    pub api_base: String,

    /// Outbound send timeout in seconds
    #[serde(default = "default_send_timeout")]
    pub send_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    /// Signing secret for internally issued tokens
    pub secret_key: String,

    /// Access token expiry in minutes
    #[serde(default = "default_token_expire_minutes")]
    pub access_token_expire_minutes: u64,

    /// API key header name
    #[serde(default = "default_api_key_header")]
    pub api_key_header: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_true")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Service name
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Requests per minute (per tenant)
    #[serde(default = "default_rate_limit")]
    pub requests_per_minute: u32,

    /// Burst capacity
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Enable rate limiting (scaffolding only; never attached to routes)
    #[serde(default)]
    pub enabled: bool,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_shutdown_timeout() -> u64 { 30 }
fn default_max_connections() -> u32 { 50 }
fn default_min_connections() -> u32 { 5 }
fn default_connect_timeout() -> u64 { 10 }
fn default_idle_timeout() -> u64 { 300 }
fn default_region() -> String { "us-east-1".to_string() }
fn default_provider() -> String { "openai".to_string() }
fn default_vector_provider() -> String { "pinecone".to_string() }
fn default_embedding_model() -> String { "text-embedding-ada-002".to_string() }
fn default_embedding_dimension() -> usize { 1536 }
fn default_embedding_timeout() -> u64 { 30 }
fn default_embedding_retries() -> u32 { 3 }
fn default_batch_size() -> usize { 100 }
fn default_chat_model() -> String { "gpt-4".to_string() }
fn default_temperature() -> f32 { 0.1 }
fn default_top_k() -> usize { 4 }
fn default_graph_api_base() -> String { "https://graph.facebook.com/v17.0".to_string() }
fn default_send_timeout() -> u64 { 30 }
fn default_token_expire_minutes() -> u64 { 30 }
fn default_api_key_header() -> String { "X-API-Key".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_metrics_port() -> u16 { 9090 }
fn default_service_name() -> String { "chatdock".to_string() }
fn default_rate_limit() -> u32 { 60 }
fn default_burst() -> u32 { 120 }
fn default_true() -> bool { true }

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            // Load base config file
            .add_source(File::with_name("config/default").required(false))
            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            // Load local overrides
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables with APP__ prefix
            // e.g., APP__SERVER__PORT=8081
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }

    /// Get WhatsApp send timeout as Duration
    pub fn whatsapp_send_timeout(&self) -> Duration {
        Duration::from_secs(self.whatsapp.send_timeout_secs)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: default_host(),
                port: default_port(),
                shutdown_timeout_secs: default_shutdown_timeout(),
            },
            database: DatabaseConfig {
                url: "postgres://localhost/chatdock".to_string(),
                max_connections: default_max_connections(),
                min_connections: default_min_connections(),
                connect_timeout_secs: default_connect_timeout(),
                idle_timeout_secs: default_idle_timeout(),
            },
            document_store: DocumentStoreConfig {
                region: default_region(),
                endpoint_url: None,
                create_tables: true,
            },
            cache: CacheConfig::default(),
            embedding: EmbeddingConfig {
                provider: default_provider(),
                api_key: None,
                api_base: None,
                model: default_embedding_model(),
                dimension: default_embedding_dimension(),
                timeout_secs: default_embedding_timeout(),
                max_retries: default_embedding_retries(),
                batch_size: default_batch_size(),
            },
            chat: ChatConfig {
                provider: default_provider(),
                api_key: None,
                api_base: None,
                model: default_chat_model(),
                temperature: default_temperature(),
            },
            vector: VectorConfig {
                provider: default_vector_provider(),
                api_key: None,
                index_url: None,
                environment: None,
                top_k: default_top_k(),
            },
            whatsapp: WhatsAppConfig {
                api_token: String::new(),
                verify_token: String::new(),
                phone_id: String::new(),
                api_base: default_graph_api_base(),
                send_timeout_secs: default_send_timeout(),
            },
            auth: AuthConfig {
                secret_key: String::new(),
                access_token_expire_minutes: default_token_expire_minutes(),
                api_key_header: default_api_key_header(),
            },
            observability: ObservabilityConfig {
                log_level: default_log_level(),
                json_logging: true,
                metrics_port: default_metrics_port(),
                service_name: default_service_name(),
            },
            rate_limit: RateLimitConfig {
                requests_per_minute: default_rate_limit(),
                burst: default_burst(),
                enabled: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.embedding.model, "text-embedding-ada-002");
        assert_eq!(config.embedding.batch_size, 100);
        assert_eq!(config.vector.top_k, 4);
    }

    #[test]
    fn test_chat_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.chat.model, "gpt-4");
        assert!((config.chat.temperature - 0.1).abs() < f32::EPSILON);
    }

    #[test]
    fn test_whatsapp_timeout() {
        let config = AppConfig::default();
        assert_eq!(config.whatsapp_send_timeout(), Duration::from_secs(30));
    }
}
