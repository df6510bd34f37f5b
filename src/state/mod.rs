use std::sync::Arc;
use std::time::Duration;

use crate::core::config::AppConfig;
use crate::core::errors::ApiError;
use crate::llm::{LlmProvider, OllamaProvider};
use crate::loaders::ConfluenceClient;
use crate::rag::{self, ModelSettings, RagService, VectorStore};

pub mod error;
pub mod readiness;
pub mod startup;

use error::InitializationError;
pub use readiness::Readiness;

/// Shared state of the HTTP server.
///
/// Built once at startup. Everything inside is cheap to clone and safe to
/// share across concurrent requests.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub readiness: Readiness,
    pub rag: RagService,
    pub confluence: Option<ConfluenceClient>,
}

impl AppState {
    /// Connects the vector store and the model server client.
    ///
    /// The returned state is not ready yet; see [`startup::warm_up`].
    pub async fn initialize(config: AppConfig) -> Result<Arc<Self>, InitializationError> {
        let database_url = config.database_url()?.to_string();
        let store = rag::connect(&database_url, config.database.max_connections)
            .await
            .map_err(InitializationError::Store)?;

        let base_url = config.ollama.base_url();
        let provider = OllamaProvider::new(
            base_url.clone(),
            Duration::from_secs(config.ollama.request_timeout_secs),
        )
        .map_err(|e| InitializationError::ModelServer(e.to_string()))?;
        tracing::info!("Using Ollama at {}", base_url);

        let confluence = match config.confluence.as_ref().filter(|c| !c.url.is_empty()) {
            Some(settings) => Some(ConfluenceClient::new(
                settings,
                Duration::from_secs(config.ollama.request_timeout_secs),
            )?),
            None => None,
        };

        Ok(Arc::new(Self::new(
            config,
            store,
            Arc::new(provider),
            confluence,
        )))
    }

    pub fn new(
        config: AppConfig,
        store: Arc<dyn VectorStore>,
        provider: Arc<dyn LlmProvider>,
        confluence: Option<ConfluenceClient>,
    ) -> Self {
        let models = ModelSettings {
            chat_model: config.ollama.chat_model.clone(),
            embedding_model: config.ollama.embedding_model.clone(),
            temperature: config.ollama.temperature,
        };
        let rag = RagService::new(store, provider, models, &config.rag);

        Self {
            config: Arc::new(config),
            readiness: Readiness::new(),
            rag,
            confluence,
        }
    }
}

/// Rejects requests until startup has completed.
pub fn require_ready(state: &AppState) -> Result<(), ApiError> {
    if state.readiness.is_ready() {
        Ok(())
    } else {
        Err(ApiError::ServiceUnavailable)
    }
}
