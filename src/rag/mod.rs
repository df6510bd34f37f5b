//! Retrieval-augmented generation over named document collections.
//!
//! - `chunker`: sliding-window text splitter
//! - `store`: `VectorStore` trait with pgvector and SQLite backends
//! - `pipeline`: retriever + answer chain for one collection
//! - `cache`: per-collection pipeline cache
//! - `service`: `RagService`, the ingest/ask/list/delete entry points

mod cache;
mod chunker;
mod pipeline;
mod postgres;
mod service;
mod sqlite;
mod store;

use std::sync::Arc;

pub use cache::PipelineCache;
pub use chunker::{Chunker, ChunkerConfig, TextChunk};
pub use pipeline::{Answer, AnswerChain, PromptTemplate, RetrievalPipeline, Retriever};
pub use postgres::{vector_literal, PgVectorStore};
pub use service::{IngestOutcome, ModelSettings, RagError, RagService, SourceDocument};
pub use sqlite::SqliteVectorStore;
pub use store::{
    ChunkMatch, CollectionRecord, NewChunk, VectorStore, COLLECTION_TABLE, EMBEDDING_TABLE,
};

use crate::core::errors::ApiError;

/// Opens the vector store named by `url`: `postgres://` / `postgresql://`
/// for pgvector, `sqlite:` for the in-process store.
pub async fn connect(url: &str, max_connections: u32) -> Result<Arc<dyn VectorStore>, ApiError> {
    let store: Arc<dyn VectorStore> =
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            Arc::new(PgVectorStore::connect(url, max_connections).await?)
        } else if url.starts_with("sqlite:") {
            Arc::new(SqliteVectorStore::connect(url, max_connections).await?)
        } else {
            return Err(ApiError::BadRequest(format!(
                "unsupported database url scheme: {}",
                url.split(':').next().unwrap_or_default()
            )));
        };

    tracing::info!("Connected to {} vector store", store.backend());
    Ok(store)
}
