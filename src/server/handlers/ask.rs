use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::ApiJson;
use crate::core::errors::ApiError;
use crate::state::{require_ready, AppState};

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: String,
    #[serde(default)]
    pub collection_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AskResponse {
    pub answer: String,
}

pub async fn ask(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<AskRequest>,
) -> Result<Json<AskResponse>, ApiError> {
    require_ready(&state)?;

    let collection = payload
        .collection_name
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| state.rag.default_collection().to_string());
    tracing::info!(
        "Received question for collection '{}': {}",
        collection,
        payload.question
    );

    let answer = state.rag.ask(&collection, &payload.question).await?;
    tracing::debug!("Generated answer: {}", answer.answer);

    Ok(Json(AskResponse {
        answer: answer.answer,
    }))
}
