use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::ConfigError;

pub const DEFAULT_PROMPT_TEMPLATE: &str = "Answer the following question based only on the provided context:

<context>
{context}
</context>

Question: {input}
";

pub const DEFAULT_FALLBACK_ANSWER: &str =
    "I don't have enough information to answer that question.";

/// Top-level configuration, deserialized from `config.yml` and then
/// overridden from the environment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub ollama: OllamaConfig,
    pub database: DatabaseConfig,
    pub rag: RagConfig,
    pub confluence: Option<ConfluenceConfig>,
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn database_url(&self) -> Result<&str, ConfigError> {
        self.database
            .url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or(ConfigError::MissingDatabaseUrl)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// `*` allows any origin.
    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_allowed_origins: vec!["*".to_string()],
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    pub host: String,
    pub port: u16,
    pub chat_model: String,
    pub embedding_model: String,
    pub request_timeout_secs: u64,
    pub temperature: Option<f64>,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 11434,
            chat_model: "llama3.2:1b".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            request_timeout_secs: 120,
            temperature: None,
        }
    }
}

impl OllamaConfig {
    pub fn base_url(&self) -> String {
        if self.host.starts_with("http://") || self.host.starts_with("https://") {
            format!("{}:{}", self.host.trim_end_matches('/'), self.port)
        } else {
            format!("http://{}:{}", self.host, self.port)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
    pub embed_batch_size: usize,
    pub default_collection: String,
    pub prompt_template: String,
    pub fallback_answer: String,
    pub seed: Option<SeedConfig>,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
            top_k: 4,
            embed_batch_size: 32,
            default_collection: "default".to_string(),
            prompt_template: DEFAULT_PROMPT_TEMPLATE.to_string(),
            fallback_answer: DEFAULT_FALLBACK_ANSWER.to_string(),
            seed: None,
        }
    }
}

/// A text file ingested into `collection` during startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedConfig {
    pub collection: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfluenceConfig {
    pub url: String,
    pub username: String,
    pub api_token: String,
    pub space_keys: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub dir: PathBuf,
    /// Filter used when `RUST_LOG` is unset.
    pub level: String,
    /// Set to false to log to stdout only.
    pub file: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("logs"),
            level: "info".to_string(),
            file: true,
        }
    }
}
