use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use ragserve::core::config::AppConfig;
use ragserve::core::errors::ApiError;
use ragserve::llm::{ChatRequest, LlmProvider, ProviderModel};
use ragserve::rag::SqliteVectorStore;
use ragserve::state::AppState;

/// Deterministic provider: embeddings are letter frequencies, chat replies
/// with the prompt it was given.
pub struct EchoProvider;

#[async_trait]
impl LlmProvider for EchoProvider {
    fn name(&self) -> &str {
        "echo"
    }

    async fn health_check(&self) -> Result<bool, ApiError> {
        Ok(true)
    }

    async fn list_models(&self) -> Result<Vec<ProviderModel>, ApiError> {
        Ok(vec![ProviderModel {
            id: "llama3.2:1b".to_string(),
            name: "llama3.2:1b".to_string(),
        }])
    }

    async fn chat(&self, request: ChatRequest, _model_id: &str) -> Result<String, ApiError> {
        Ok(request
            .messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default())
    }

    async fn embed(&self, inputs: &[String], _model_id: &str) -> Result<Vec<Vec<f32>>, ApiError> {
        Ok(inputs
            .iter()
            .map(|text| {
                let mut counts = vec![0.0; 26];
                for c in text.to_ascii_lowercase().chars() {
                    if c.is_ascii_lowercase() {
                        counts[(c as u8 - b'a') as usize] += 1.0;
                    }
                }
                counts
            })
            .collect())
    }
}

pub struct TestApp {
    pub state: Arc<AppState>,
    pub router: Router,
    _dir: tempfile::TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(AppConfig::default()).await
    }

    pub async fn with_config(config: AppConfig) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteVectorStore::with_path(&dir.path().join("rag.db"))
            .await
            .unwrap();
        let state = Arc::new(AppState::new(
            config,
            Arc::new(store),
            Arc::new(EchoProvider),
            None,
        ));
        let router = ragserve::server::router(state.clone());
        Self {
            state,
            router,
            _dir: dir,
        }
    }

    pub async fn ready() -> Self {
        let app = Self::new().await;
        app.state.readiness.mark_ready();
        app
    }

    pub async fn request(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }

    /// Sends `body` verbatim as a JSON request.
    pub async fn request_raw(&self, method: &str, uri: &str, body: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }
}
