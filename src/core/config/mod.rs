pub mod service;
pub mod settings;
pub mod validation;

use std::path::PathBuf;

use thiserror::Error;

pub use service::{load_config, load_config_with};
pub use settings::{
    AppConfig, ConfluenceConfig, DatabaseConfig, LoggingConfig, OllamaConfig, RagConfig,
    SeedConfig, ServerConfig,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("database url is not configured; set PG_VECTOR_DATABASE_URL")]
    MissingDatabaseUrl,

    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
