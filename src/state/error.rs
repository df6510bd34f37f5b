use thiserror::Error;

use crate::core::config::ConfigError;
use crate::core::errors::ApiError;
use crate::loaders::ConfluenceError;

#[derive(Debug, Error)]
pub enum InitializationError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to connect to vector store: {0}")]
    Store(#[source] ApiError),

    #[error("Model server is not available: {0}")]
    ModelServer(String),

    #[error("Failed to initialize Confluence client: {0}")]
    Confluence(#[from] ConfluenceError),

    #[error("Failed to ingest seed data from {path}: {reason}")]
    Seed { path: String, reason: String },
}
