use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use super::provider::LlmProvider;
use super::types::{ChatRequest, ProviderModel};
use crate::core::errors::ApiError;

#[derive(Clone)]
pub struct OllamaProvider {
    base_url: String,
    client: Client,
}

impl OllamaProvider {
    pub fn new(base_url: String, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ApiError::internal)?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagInfo>,
}

#[derive(Deserialize)]
struct TagInfo {
    name: String,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Deserialize)]
struct EmbedResponse {
    #[serde(default)]
    embeddings: Vec<Vec<f32>>,
}

fn chat_body(request: &ChatRequest, model_id: &str) -> Value {
    let mut body = json!({
        "model": model_id,
        "messages": request.messages,
        "stream": false,
    });
    if let (Some(t), Some(obj)) = (request.temperature, body.as_object_mut()) {
        obj.insert("options".to_string(), json!({ "temperature": t }));
    }
    body
}

fn parse_chat_response(payload: &Value) -> Result<String, ApiError> {
    payload["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| ApiError::Internal("Ollama chat response has no message content".to_string()))
}

fn parse_embed_response(payload: EmbedResponse, expected: usize) -> Result<Vec<Vec<f32>>, ApiError> {
    if payload.embeddings.len() != expected {
        return Err(ApiError::Internal(format!(
            "Ollama returned {} embeddings for {} inputs",
            payload.embeddings.len(),
            expected
        )));
    }
    Ok(payload.embeddings)
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn health_check(&self) -> Result<bool, ApiError> {
        let url = format!("{}/api/tags", self.base_url);
        match self.client.get(&url).send().await {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    async fn list_models(&self) -> Result<Vec<ProviderModel>, ApiError> {
        let url = format!("{}/api/tags", self.base_url);
        let res = self.client.get(&url).send().await.map_err(ApiError::internal)?;

        if !res.status().is_success() {
            return Err(ApiError::Internal(format!(
                "Failed to list Ollama models: {}",
                res.status()
            )));
        }

        let response: TagsResponse = res.json().await.map_err(ApiError::internal)?;
        Ok(response
            .models
            .into_iter()
            .map(|m| ProviderModel {
                id: m.model.unwrap_or_else(|| m.name.clone()),
                name: m.name,
            })
            .collect())
    }

    async fn chat(&self, request: ChatRequest, model_id: &str) -> Result<String, ApiError> {
        let url = format!("{}/api/chat", self.base_url);
        let body = chat_body(&request, model_id);

        let res = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(ApiError::internal)?;

        if !res.status().is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Internal(format!("Ollama chat error: {}", text)));
        }

        let payload: Value = res.json().await.map_err(ApiError::internal)?;
        parse_chat_response(&payload)
    }

    async fn embed(&self, inputs: &[String], model_id: &str) -> Result<Vec<Vec<f32>>, ApiError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/api/embed", self.base_url);
        let body = json!({
            "model": model_id,
            "input": inputs,
        });

        let res = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(ApiError::internal)?;

        if !res.status().is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Internal(format!("Ollama embed error: {}", text)));
        }

        let payload: EmbedResponse = res.json().await.map_err(ApiError::internal)?;
        parse_embed_response(payload, inputs.len())
    }
}
