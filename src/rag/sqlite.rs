//! SQLite-backed vector store.
//!
//! In-process store using SQLite for collection metadata and chunk rows,
//! with brute-force cosine similarity for search.

use std::path::Path;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::store::{
    ChunkMatch, CollectionRecord, NewChunk, VectorStore, COLLECTION_TABLE, EMBEDDING_TABLE,
};
use crate::core::errors::ApiError;

pub struct SqliteVectorStore {
    pool: SqlitePool,
    schema_ready: AtomicBool,
}

impl SqliteVectorStore {
    /// Opens a store from a `sqlite:` url; `sqlite::memory:` keeps
    /// everything in a single pooled connection.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, ApiError> {
        let in_memory = url.contains(":memory:");
        let mut options = SqliteConnectOptions::from_str(url)
            .map_err(ApiError::internal)?
            .create_if_missing(true)
            .foreign_keys(true);
        if !in_memory {
            options = options
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal);
        }

        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .min_connections(1)
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new()
                .min_connections(1)
                .max_connections(max_connections.max(1))
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(ApiError::internal)?;

        Ok(Self {
            pool,
            schema_ready: AtomicBool::new(false),
        })
    }

    pub async fn with_path(db_path: &Path) -> Result<Self, ApiError> {
        let url = format!("sqlite://{}", db_path.display());
        Self::connect(&url, 4).await
    }

    async fn ensure_schema(&self) -> Result<(), ApiError> {
        if self.schema_ready.load(Ordering::Acquire) {
            return Ok(());
        }

        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {COLLECTION_TABLE} (
                uuid TEXT PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                cmetadata TEXT NOT NULL DEFAULT '{{}}'
            )"
        ))
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {EMBEDDING_TABLE} (
                id TEXT PRIMARY KEY,
                collection_id TEXT NOT NULL REFERENCES {COLLECTION_TABLE}(uuid) ON DELETE CASCADE,
                embedding BLOB NOT NULL,
                document TEXT NOT NULL,
                cmetadata TEXT NOT NULL DEFAULT '{{}}'
            )"
        ))
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS idx_embedding_collection ON {EMBEDDING_TABLE}(collection_id)"
        ))
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        self.schema_ready.store(true, Ordering::Release);
        Ok(())
    }

    async fn has_collection_table(&self) -> Result<bool, ApiError> {
        if self.schema_ready.load(Ordering::Acquire) {
            return Ok(true);
        }

        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1")
                .bind(COLLECTION_TABLE)
                .fetch_one(&self.pool)
                .await
                .map_err(ApiError::internal)?;
        Ok(count > 0)
    }

    fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    fn deserialize_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }

    fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        if a.len() != b.len() || a.is_empty() {
            return 0.0;
        }

        let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        let denom = norm_a * norm_b;

        if denom <= f32::EPSILON {
            0.0
        } else {
            dot / denom
        }
    }

    fn parse_uuid(raw: &str) -> Result<Uuid, ApiError> {
        Uuid::parse_str(raw).map_err(ApiError::internal)
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    async fn list_collections(&self) -> Result<Vec<String>, ApiError> {
        if !self.has_collection_table().await? {
            return Ok(Vec::new());
        }

        sqlx::query_scalar(&format!("SELECT name FROM {COLLECTION_TABLE} ORDER BY name"))
            .fetch_all(&self.pool)
            .await
            .map_err(ApiError::internal)
    }

    async fn find_collection(&self, name: &str) -> Result<Option<CollectionRecord>, ApiError> {
        if !self.has_collection_table().await? {
            return Ok(None);
        }

        let row = sqlx::query(&format!(
            "SELECT uuid, name FROM {COLLECTION_TABLE} WHERE name = ?1"
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        row.map(|row| {
            let uuid: String = row.get("uuid");
            Ok(CollectionRecord {
                uuid: Self::parse_uuid(&uuid)?,
                name: row.get("name"),
            })
        })
        .transpose()
    }

    async fn replace_collection(
        &self,
        name: &str,
        chunks: Vec<NewChunk>,
    ) -> Result<CollectionRecord, ApiError> {
        self.ensure_schema().await?;

        let mut tx = self.pool.begin().await.map_err(ApiError::internal)?;

        let existing: Option<String> = sqlx::query_scalar(&format!(
            "SELECT uuid FROM {COLLECTION_TABLE} WHERE name = ?1"
        ))
        .bind(name)
        .fetch_optional(&mut *tx)
        .await
        .map_err(ApiError::internal)?;

        if let Some(old_id) = existing {
            sqlx::query(&format!("DELETE FROM {EMBEDDING_TABLE} WHERE collection_id = ?1"))
                .bind(&old_id)
                .execute(&mut *tx)
                .await
                .map_err(ApiError::internal)?;
            sqlx::query(&format!("DELETE FROM {COLLECTION_TABLE} WHERE uuid = ?1"))
                .bind(&old_id)
                .execute(&mut *tx)
                .await
                .map_err(ApiError::internal)?;
        }

        let record = CollectionRecord {
            uuid: Uuid::new_v4(),
            name: name.to_string(),
        };
        let collection_id = record.uuid.to_string();

        sqlx::query(&format!(
            "INSERT INTO {COLLECTION_TABLE} (uuid, name, cmetadata) VALUES (?1, ?2, '{{}}')"
        ))
        .bind(&collection_id)
        .bind(name)
        .execute(&mut *tx)
        .await
        .map_err(ApiError::internal)?;

        for chunk in &chunks {
            let blob = Self::serialize_embedding(&chunk.embedding);
            let metadata_str = serde_json::to_string(&chunk.metadata).unwrap_or_else(|_| "{}".to_string());

            sqlx::query(&format!(
                "INSERT INTO {EMBEDDING_TABLE} (id, collection_id, embedding, document, cmetadata)
                 VALUES (?1, ?2, ?3, ?4, ?5)"
            ))
            .bind(Uuid::new_v4().to_string())
            .bind(&collection_id)
            .bind(&blob)
            .bind(&chunk.document)
            .bind(&metadata_str)
            .execute(&mut *tx)
            .await
            .map_err(ApiError::internal)?;
        }

        tx.commit().await.map_err(ApiError::internal)?;
        Ok(record)
    }

    async fn search(
        &self,
        collection_id: Uuid,
        query_embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<ChunkMatch>, ApiError> {
        if !self.has_collection_table().await? {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(&format!(
            "SELECT document, cmetadata, embedding FROM {EMBEDDING_TABLE} WHERE collection_id = ?1"
        ))
        .bind(collection_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        let mut scored: Vec<ChunkMatch> = rows
            .iter()
            .filter_map(|row| {
                let embedding_bytes: Vec<u8> = row.get("embedding");
                if embedding_bytes.is_empty() {
                    return None;
                }
                let stored = Self::deserialize_embedding(&embedding_bytes);
                let metadata_str: String = row.get("cmetadata");

                Some(ChunkMatch {
                    document: row.get("document"),
                    metadata: serde_json::from_str::<Value>(&metadata_str).unwrap_or(Value::Null),
                    score: Self::cosine_similarity(query_embedding, &stored),
                })
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(limit.max(1));

        Ok(scored)
    }

    async fn delete_collection(&self, name: &str) -> Result<bool, ApiError> {
        if !self.has_collection_table().await? {
            return Ok(false);
        }

        let mut tx = self.pool.begin().await.map_err(ApiError::internal)?;

        let existing: Option<String> = sqlx::query_scalar(&format!(
            "SELECT uuid FROM {COLLECTION_TABLE} WHERE name = ?1"
        ))
        .bind(name)
        .fetch_optional(&mut *tx)
        .await
        .map_err(ApiError::internal)?;

        let Some(collection_id) = existing else {
            return Ok(false);
        };

        sqlx::query(&format!("DELETE FROM {EMBEDDING_TABLE} WHERE collection_id = ?1"))
            .bind(&collection_id)
            .execute(&mut *tx)
            .await
            .map_err(ApiError::internal)?;

        sqlx::query(&format!("DELETE FROM {COLLECTION_TABLE} WHERE uuid = ?1"))
            .bind(&collection_id)
            .execute(&mut *tx)
            .await
            .map_err(ApiError::internal)?;

        tx.commit().await.map_err(ApiError::internal)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> (tempfile::TempDir, SqliteVectorStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteVectorStore::with_path(&dir.path().join("rag.db"))
            .await
            .unwrap();
        (dir, store)
    }

    fn chunk(text: &str, embedding: Vec<f32>) -> NewChunk {
        NewChunk {
            document: text.to_string(),
            embedding,
            metadata: serde_json::json!({ "source": "test" }),
        }
    }

    async fn embedding_rows(store: &SqliteVectorStore) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {EMBEDDING_TABLE}"))
            .fetch_one(&store.pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn fresh_database_has_no_collections() {
        let (_dir, store) = test_store().await;
        assert!(store.list_collections().await.unwrap().is_empty());
        assert!(store.find_collection("missing").await.unwrap().is_none());
        assert!(!store.delete_collection("missing").await.unwrap());
    }

    #[tokio::test]
    async fn replace_and_search() {
        let (_dir, store) = test_store().await;

        let record = store
            .replace_collection(
                "apollo",
                vec![
                    chunk("moon landing", vec![1.0, 0.0, 0.0]),
                    chunk("gemini program", vec![0.0, 1.0, 0.0]),
                ],
            )
            .await
            .unwrap();

        assert_eq!(store.list_collections().await.unwrap(), vec!["apollo"]);
        assert_eq!(store.find_collection("apollo").await.unwrap(), Some(record.clone()));

        let results = store.search(record.uuid, &[0.9, 0.1, 0.0], 1).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document, "moon landing");
        assert!(results[0].score > 0.9);
        assert_eq!(results[0].metadata["source"], "test");
    }

    #[tokio::test]
    async fn replace_drops_previous_contents() {
        let (_dir, store) = test_store().await;

        let first = store
            .replace_collection("docs", vec![chunk("old", vec![1.0]), chunk("older", vec![1.0])])
            .await
            .unwrap();
        let second = store
            .replace_collection("docs", vec![chunk("new", vec![1.0])])
            .await
            .unwrap();

        assert_ne!(first.uuid, second.uuid);
        assert_eq!(embedding_rows(&store).await, 1);
        assert!(store.search(first.uuid, &[1.0], 4).await.unwrap().is_empty());

        let results = store.search(second.uuid, &[1.0], 4).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document, "new");
    }

    #[tokio::test]
    async fn delete_removes_vectors_and_metadata() {
        let (_dir, store) = test_store().await;

        store
            .replace_collection("keep", vec![chunk("a", vec![1.0])])
            .await
            .unwrap();
        store
            .replace_collection("drop", vec![chunk("b", vec![1.0]), chunk("c", vec![1.0])])
            .await
            .unwrap();

        assert!(store.delete_collection("drop").await.unwrap());
        assert_eq!(store.list_collections().await.unwrap(), vec!["keep"]);
        assert_eq!(embedding_rows(&store).await, 1);
        assert!(!store.delete_collection("drop").await.unwrap());
    }

    #[tokio::test]
    async fn in_memory_store_works() {
        let store = SqliteVectorStore::connect("sqlite::memory:", 4).await.unwrap();
        let record = store
            .replace_collection("mem", vec![chunk("kept in memory", vec![0.5, 0.5])])
            .await
            .unwrap();
        assert_eq!(store.search(record.uuid, &[0.5, 0.5], 4).await.unwrap().len(), 1);
    }

    #[test]
    fn embedding_blob_round_trips() {
        let original = vec![0.25_f32, -1.5, 3.0];
        let bytes = SqliteVectorStore::serialize_embedding(&original);
        assert_eq!(SqliteVectorStore::deserialize_embedding(&bytes), original);
    }
}
