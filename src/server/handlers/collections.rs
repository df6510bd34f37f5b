use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use crate::core::errors::ApiError;
use crate::state::{require_ready, AppState};

pub async fn list_collections(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<String>>, ApiError> {
    require_ready(&state)?;

    match state.rag.list_collections().await {
        Ok(collections) => {
            tracing::info!("Found collections: {:?}", collections);
            Ok(Json(collections))
        }
        Err(err) => {
            tracing::error!("Error listing collections: {}", err);
            Err(ApiError::Internal(
                "Failed to retrieve collections from the database.".to_string(),
            ))
        }
    }
}

pub async fn delete_collection(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    require_ready(&state)?;
    tracing::info!("Received request to delete collection: {}", name);

    match state.rag.delete_collection(&name).await {
        Ok(true) => {
            tracing::info!("Deleted collection '{}'", name);
            Ok(StatusCode::NO_CONTENT)
        }
        Ok(false) => Err(ApiError::NotFound(format!(
            "Collection '{}' not found.",
            name
        ))),
        Err(err) => {
            tracing::error!("Database error while deleting '{}': {}", name, err);
            Err(ApiError::Internal(
                "Failed to delete collection due to a database error.".to_string(),
            ))
        }
    }
}
