//! VectorStore trait: abstract interface over the collection-partitioned
//! vector database.
//!
//! Implementations keep two tables: a collection metadata table and a chunk
//! table whose rows belong to exactly one collection. The schema is created
//! on the first write; read paths treat a missing schema as "no collections".

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::errors::ApiError;

pub const COLLECTION_TABLE: &str = "langchain_pg_collection";
pub const EMBEDDING_TABLE: &str = "langchain_pg_embedding";

/// A row of the collection metadata table.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionRecord {
    pub uuid: Uuid,
    pub name: String,
}

/// A chunk ready to be written: its text, vector and metadata.
#[derive(Debug, Clone)]
pub struct NewChunk {
    pub document: String,
    pub embedding: Vec<f32>,
    pub metadata: serde_json::Value,
}

/// Result of a similarity search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkMatch {
    pub document: String,
    pub metadata: serde_json::Value,
    /// Similarity score (higher = better).
    pub score: f32,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Backend name for logs ("postgres", "sqlite").
    fn backend(&self) -> &'static str;

    /// Names of all collections; empty if the metadata table does not exist.
    async fn list_collections(&self) -> Result<Vec<String>, ApiError>;

    /// Look up a collection by name.
    async fn find_collection(&self, name: &str) -> Result<Option<CollectionRecord>, ApiError>;

    /// Drop any existing collection with this name and write `chunks` into a
    /// fresh one, atomically.
    async fn replace_collection(
        &self,
        name: &str,
        chunks: Vec<NewChunk>,
    ) -> Result<CollectionRecord, ApiError>;

    /// The `limit` chunks of a collection closest to `query_embedding`.
    async fn search(
        &self,
        collection_id: Uuid,
        query_embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<ChunkMatch>, ApiError>;

    /// Delete a collection's vectors and its metadata row in one
    /// transaction. Returns `false` if no such collection exists.
    async fn delete_collection(&self, name: &str) -> Result<bool, ApiError>;
}
