use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::ApiJson;
use crate::core::errors::ApiError;
use crate::rag::IngestOutcome;
use crate::state::{require_ready, AppState};

const CONFLUENCE_COLLECTION: &str = "confluence_docs";

#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    pub collection_name: String,
    pub content: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ConfluenceIngestRequest {
    #[serde(default)]
    pub collection_name: Option<String>,
    #[serde(default)]
    pub space_keys: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub message: String,
    pub collection_name: String,
    pub documents_added: usize,
}

impl From<IngestOutcome> for IngestResponse {
    fn from(outcome: IngestOutcome) -> Self {
        Self {
            message: "Data ingested successfully.".to_string(),
            collection_name: outcome.collection_name,
            documents_added: outcome.documents_added,
        }
    }
}

pub async fn ingest(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<IngestRequest>,
) -> Result<Json<IngestResponse>, ApiError> {
    require_ready(&state)?;
    tracing::info!(
        "Received request to ingest data into collection: {}",
        payload.collection_name
    );

    let outcome = state
        .rag
        .ingest(&payload.collection_name, &payload.content, "request")
        .await?;
    Ok(Json(outcome.into()))
}

pub async fn ingest_confluence(
    State(state): State<Arc<AppState>>,
    payload: Option<ApiJson<ConfluenceIngestRequest>>,
) -> Result<Json<IngestResponse>, ApiError> {
    require_ready(&state)?;

    let Some(client) = state.confluence.as_ref() else {
        return Err(ApiError::BadRequest(
            "Confluence is not configured.".to_string(),
        ));
    };

    let payload = payload.map(|ApiJson(p)| p).unwrap_or_default();
    let collection = payload
        .collection_name
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| CONFLUENCE_COLLECTION.to_string());
    let space_keys = payload
        .space_keys
        .filter(|keys| !keys.is_empty())
        .unwrap_or_else(|| client.space_keys().to_vec());

    tracing::info!("Loading data from Confluence spaces: {:?}", space_keys);
    let documents = client.load_spaces(&space_keys).await;
    if documents.is_empty() {
        return Err(ApiError::BadRequest(
            "No documents loaded from Confluence.".to_string(),
        ));
    }

    let outcome = state.rag.ingest_documents(&collection, documents).await?;
    Ok(Json(outcome.into()))
}
