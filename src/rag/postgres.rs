//! PostgreSQL + pgvector store over the `langchain_pg_*` table layout.
//!
//! Vectors are bound as pgvector text literals and cast with `::vector`, so
//! no client-side vector type is needed. Ranking is done by the database
//! with the cosine-distance operator `<=>`.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::store::{
    ChunkMatch, CollectionRecord, NewChunk, VectorStore, COLLECTION_TABLE, EMBEDDING_TABLE,
};
use crate::core::errors::ApiError;

pub struct PgVectorStore {
    pool: PgPool,
    schema_ready: AtomicBool,
}

impl PgVectorStore {
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, ApiError> {
        let options: PgConnectOptions = url.parse().map_err(ApiError::internal)?;
        Self::connect_with(options, max_connections).await
    }

    pub async fn connect_with(
        options: PgConnectOptions,
        max_connections: u32,
    ) -> Result<Self, ApiError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await
            .map_err(ApiError::internal)?;

        Ok(Self {
            pool,
            schema_ready: AtomicBool::new(false),
        })
    }

    async fn ensure_schema(&self) -> Result<(), ApiError> {
        if self.schema_ready.load(Ordering::Acquire) {
            return Ok(());
        }

        let statements = [
            "CREATE EXTENSION IF NOT EXISTS vector".to_string(),
            format!(
                "CREATE TABLE IF NOT EXISTS {COLLECTION_TABLE} (
                    uuid UUID PRIMARY KEY,
                    name VARCHAR NOT NULL UNIQUE,
                    cmetadata JSON
                )"
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS {EMBEDDING_TABLE} (
                    id VARCHAR PRIMARY KEY,
                    collection_id UUID REFERENCES {COLLECTION_TABLE}(uuid) ON DELETE CASCADE,
                    embedding VECTOR,
                    document VARCHAR,
                    cmetadata JSONB
                )"
            ),
            format!(
                "CREATE INDEX IF NOT EXISTS ix_{EMBEDDING_TABLE}_collection_id
                 ON {EMBEDDING_TABLE} (collection_id)"
            ),
        ];

        for statement in &statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(ApiError::internal)?;
        }

        self.schema_ready.store(true, Ordering::Release);
        Ok(())
    }

    async fn has_collection_table(&self) -> Result<bool, ApiError> {
        if self.schema_ready.load(Ordering::Acquire) {
            return Ok(true);
        }

        sqlx::query_scalar("SELECT to_regclass($1::text) IS NOT NULL")
            .bind(COLLECTION_TABLE)
            .fetch_one(&self.pool)
            .await
            .map_err(ApiError::internal)
    }
}

/// Serializes writers of one collection name until the transaction ends.
async fn lock_collection_name(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    name: &str,
) -> Result<(), ApiError> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
        .bind(name)
        .execute(&mut **tx)
        .await
        .map_err(ApiError::internal)?;
    Ok(())
}

/// Formats a vector as a pgvector literal, e.g. `[0.1,0.2,0.3]`.
pub fn vector_literal(embedding: &[f32]) -> String {
    let parts: Vec<String> = embedding.iter().map(|v| v.to_string()).collect();
    format!("[{}]", parts.join(","))
}

#[async_trait]
impl VectorStore for PgVectorStore {
    fn backend(&self) -> &'static str {
        "postgres"
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
            "SELECT uuid, name FROM {COLLECTION_TABLE} WHERE name = $1"
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        Ok(row.map(|row| CollectionRecord {
            uuid: row.get("uuid"),
            name: row.get("name"),
        }))
    }

    async fn replace_collection(
        &self,
        name: &str,
        chunks: Vec<NewChunk>,
    ) -> Result<CollectionRecord, ApiError> {
        self.ensure_schema().await?;

        let mut tx = self.pool.begin().await.map_err(ApiError::internal)?;
        lock_collection_name(&mut tx, name).await?;

        let existing: Option<Uuid> = sqlx::query_scalar(&format!(
            "SELECT uuid FROM {COLLECTION_TABLE} WHERE name = $1"
        ))
        .bind(name)
        .fetch_optional(&mut *tx)
        .await
        .map_err(ApiError::internal)?;

        if let Some(old_id) = existing {
            sqlx::query(&format!("DELETE FROM {EMBEDDING_TABLE} WHERE collection_id = $1"))
                .bind(old_id)
                .execute(&mut *tx)
                .await
                .map_err(ApiError::internal)?;
            sqlx::query(&format!("DELETE FROM {COLLECTION_TABLE} WHERE uuid = $1"))
                .bind(old_id)
                .execute(&mut *tx)
                .await
                .map_err(ApiError::internal)?;
        }

        let record = CollectionRecord {
            uuid: Uuid::new_v4(),
            name: name.to_string(),
        };

        sqlx::query(&format!(
            "INSERT INTO {COLLECTION_TABLE} (uuid, name, cmetadata) VALUES ($1, $2, '{{}}'::json)"
        ))
        .bind(record.uuid)
        .bind(name)
        .execute(&mut *tx)
        .await
        .map_err(ApiError::internal)?;

        for chunk in &chunks {
            sqlx::query(&format!(
                "INSERT INTO {EMBEDDING_TABLE} (id, collection_id, embedding, document, cmetadata)
                 VALUES ($1, $2, $3::vector, $4, $5)"
            ))
            .bind(Uuid::new_v4().to_string())
            .bind(record.uuid)
            .bind(vector_literal(&chunk.embedding))
            .bind(&chunk.document)
            .bind(&chunk.metadata)
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
            "SELECT document, cmetadata, 1 - (embedding <=> $2::vector) AS score
             FROM {EMBEDDING_TABLE}
             WHERE collection_id = $1
             ORDER BY embedding <=> $2::vector
             LIMIT $3"
        ))
        .bind(collection_id)
        .bind(vector_literal(query_embedding))
        .bind(limit.max(1) as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        Ok(rows
            .iter()
            .map(|row| {
                let document: Option<String> = row.get("document");
                let metadata: Option<Value> = row.get("cmetadata");
                let score: Option<f64> = row.get("score");
                ChunkMatch {
                    document: document.unwrap_or_default(),
                    metadata: metadata.unwrap_or(Value::Null),
                    score: score.unwrap_or(0.0) as f32,
                }
            })
            .collect())
    }

    async fn delete_collection(&self, name: &str) -> Result<bool, ApiError> {
        if !self.has_collection_table().await? {
            return Ok(false);
        }

        let mut tx = self.pool.begin().await.map_err(ApiError::internal)?;
        lock_collection_name(&mut tx, name).await?;

        // 1. collection id, 2. its vectors, 3. its metadata row
        let existing: Option<Uuid> = sqlx::query_scalar(&format!(
            "SELECT uuid FROM {COLLECTION_TABLE} WHERE name = $1"
        ))
        .bind(name)
        .fetch_optional(&mut *tx)
        .await
        .map_err(ApiError::internal)?;

        let Some(collection_id) = existing else {
            return Ok(false);
        };

        sqlx::query(&format!("DELETE FROM {EMBEDDING_TABLE} WHERE collection_id = $1"))
            .bind(collection_id)
            .execute(&mut *tx)
            .await
            .map_err(ApiError::internal)?;

        sqlx::query(&format!("DELETE FROM {COLLECTION_TABLE} WHERE uuid = $1"))
            .bind(collection_id)
            .execute(&mut *tx)
            .await
            .map_err(ApiError::internal)?;

        tx.commit().await.map_err(ApiError::internal)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;

    #[test]
    fn formats_vector_literal() {
        assert_eq!(vector_literal(&[0.5, -1.0, 2.25]), "[0.5,-1,2.25]");
        assert_eq!(vector_literal(&[]), "[]");
    }

    fn chunk(document: &str, embedding: Vec<f32>) -> NewChunk {
        NewChunk {
            document: document.to_string(),
            embedding,
            metadata: json!({ "source": "test" }),
        }
    }

    /// Store confined to a throwaway schema so the tables start missing.
    async fn scratch_store(url: &str) -> (PgPool, String, PgVectorStore) {
        let admin = PgPool::connect(url).await.unwrap();
        let schema = format!("ragserve_test_{}", Uuid::new_v4().simple());
        sqlx::query(&format!("CREATE SCHEMA {schema}"))
            .execute(&admin)
            .await
            .unwrap();

        let options: PgConnectOptions = url.parse().unwrap();
        let search_path = format!("{schema},public");
        let options = options.options([("search_path", search_path.as_str())]);
        let store = PgVectorStore::connect_with(options, 4).await.unwrap();
        (admin, schema, store)
    }

    async fn drop_schema(admin: &PgPool, schema: &str) {
        sqlx::query(&format!("DROP SCHEMA {schema} CASCADE"))
            .execute(admin)
            .await
            .unwrap();
    }

    #[tokio::test]
    #[ignore]
    async fn live_pgvector_round_trip() {
        let Ok(url) = std::env::var("PG_VECTOR_DATABASE_URL") else {
            return;
        };
        let (admin, schema, store) = scratch_store(&url).await;

        assert!(store.list_collections().await.unwrap().is_empty());
        assert!(store.find_collection("docs").await.unwrap().is_none());
        assert!(!store.delete_collection("docs").await.unwrap());

        let first = store
            .replace_collection(
                "docs",
                vec![
                    chunk("east", vec![1.0, 0.0, 0.0]),
                    chunk("north", vec![0.0, 1.0, 0.0]),
                    chunk("north-east", vec![0.7, 0.7, 0.0]),
                ],
            )
            .await
            .unwrap();
        assert_eq!(store.list_collections().await.unwrap(), vec!["docs"]);
        assert_eq!(store.find_collection("docs").await.unwrap(), Some(first.clone()));

        let hits = store.search(first.uuid, &[0.9, 0.1, 0.0], 2).await.unwrap();
        let documents: Vec<&str> = hits.iter().map(|h| h.document.as_str()).collect();
        assert_eq!(documents, vec!["east", "north-east"]);
        assert!(hits[0].score >= hits[1].score);
        assert_eq!(hits[0].metadata["source"], "test");

        let second = store
            .replace_collection("docs", vec![chunk("west", vec![-1.0, 0.0, 0.0])])
            .await
            .unwrap();
        assert_ne!(first.uuid, second.uuid);
        assert!(store.search(first.uuid, &[1.0, 0.0, 0.0], 4).await.unwrap().is_empty());
        let hits = store.search(second.uuid, &[1.0, 0.0, 0.0], 4).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].document, "west");

        assert!(store.delete_collection("docs").await.unwrap());
        assert!(store.list_collections().await.unwrap().is_empty());
        assert!(store.search(second.uuid, &[1.0, 0.0, 0.0], 4).await.unwrap().is_empty());

        drop_schema(&admin, &schema).await;
    }

    #[tokio::test]
    #[ignore]
    async fn live_concurrent_replaces_keep_one_collection() {
        let Ok(url) = std::env::var("PG_VECTOR_DATABASE_URL") else {
            return;
        };
        let (admin, schema, store) = scratch_store(&url).await;
        let store = Arc::new(store);
        store
            .replace_collection("docs", vec![chunk("seed", vec![1.0, 0.0])])
            .await
            .unwrap();

        let writers: Vec<_> = (0..4)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .replace_collection("docs", vec![chunk(&format!("v{i}"), vec![1.0, 0.0])])
                        .await
                })
            })
            .collect();
        for writer in writers {
            writer.await.unwrap().unwrap();
        }

        assert_eq!(store.list_collections().await.unwrap(), vec!["docs"]);
        let record = store.find_collection("docs").await.unwrap().unwrap();
        let hits = store.search(record.uuid, &[1.0, 0.0], 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].document.starts_with('v'));

        drop_schema(&admin, &schema).await;
    }
}
