pub mod ask;
pub mod collections;
pub mod health;
pub mod ingest;

use axum::extract::FromRequest;

use crate::core::errors::ApiError;
use crate::rag::RagError;

/// `Json` extractor whose rejections use the `{"error": ...}` body.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

impl From<RagError> for ApiError {
    fn from(err: RagError) -> Self {
        match err {
            RagError::InvalidCollectionName => {
                ApiError::BadRequest("collection_name must not be empty.".to_string())
            }
            RagError::EmptyQuestion => {
                ApiError::BadRequest("question must not be empty.".to_string())
            }
            RagError::EmptyContent => {
                ApiError::BadRequest("Content could not be split into documents.".to_string())
            }
            RagError::CollectionNotFound(name) => ApiError::NotFound(format!(
                "Collection '{}' not found or could not be accessed.",
                name
            )),
            other => {
                tracing::error!("Request failed: {}", other);
                ApiError::Internal("An internal error occurred.".to_string())
            }
        }
    }
}
