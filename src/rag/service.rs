use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use super::cache::PipelineCache;
use super::chunker::{Chunker, ChunkerConfig, TextChunk};
use super::pipeline::{Answer, AnswerChain, PromptTemplate, RetrievalPipeline};
use super::store::{NewChunk, VectorStore};
use crate::core::config::RagConfig;
use crate::core::errors::ApiError;
use crate::llm::{Embedder, LlmProvider};

#[derive(Debug, Error)]
pub enum RagError {
    #[error("collection name must not be empty")]
    InvalidCollectionName,

    #[error("question must not be empty")]
    EmptyQuestion,

    #[error("content could not be split into documents")]
    EmptyContent,

    #[error("collection '{0}' not found")]
    CollectionNotFound(String),

    #[error("embedding failed: {0}")]
    Embedding(#[source] ApiError),

    #[error("vector store error: {0}")]
    Store(#[source] ApiError),

    #[error("inference failed: {0}")]
    Inference(#[source] ApiError),
}

/// A piece of source text to ingest, e.g. one wiki page.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub source: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestOutcome {
    pub collection_name: String,
    pub documents_added: usize,
}

/// Model and prompt settings for [`RagService::new`].
#[derive(Debug, Clone)]
pub struct ModelSettings {
    pub chat_model: String,
    pub embedding_model: String,
    pub temperature: Option<f64>,
}

/// Sequences chunker, embedder, vector store and answer chain, and owns the
/// per-collection pipeline cache.
#[derive(Clone)]
pub struct RagService {
    store: Arc<dyn VectorStore>,
    provider: Arc<dyn LlmProvider>,
    chunker: Chunker,
    embedder: Embedder,
    chain: Arc<AnswerChain>,
    cache: PipelineCache,
    top_k: usize,
    default_collection: String,
}

impl RagService {
    pub fn new(
        store: Arc<dyn VectorStore>,
        provider: Arc<dyn LlmProvider>,
        models: ModelSettings,
        rag: &RagConfig,
    ) -> Self {
        let chunker = Chunker::new(ChunkerConfig {
            chunk_size: rag.chunk_size,
            chunk_overlap: rag.chunk_overlap,
        });
        let embedder = Embedder::new(
            provider.clone(),
            models.embedding_model,
            rag.embed_batch_size,
        );
        let chain = Arc::new(AnswerChain::new(
            provider.clone(),
            models.chat_model,
            PromptTemplate::new(rag.prompt_template.clone()),
            models.temperature,
            rag.fallback_answer.clone(),
        ));

        Self {
            store,
            provider,
            chunker,
            embedder,
            chain,
            cache: PipelineCache::new(),
            top_k: rag.top_k,
            default_collection: rag.default_collection.clone(),
        }
    }

    pub fn provider(&self) -> &Arc<dyn LlmProvider> {
        &self.provider
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    pub fn cache(&self) -> &PipelineCache {
        &self.cache
    }

    pub fn default_collection(&self) -> &str {
        &self.default_collection
    }

    pub async fn ingest(
        &self,
        collection: &str,
        content: &str,
        source: &str,
    ) -> Result<IngestOutcome, RagError> {
        self.ingest_documents(
            collection,
            vec![SourceDocument {
                source: source.to_string(),
                text: content.to_string(),
            }],
        )
        .await
    }

    /// Chunks every document, embeds all chunks and replaces the collection
    /// with them. The cached pipeline for the collection is evicted.
    pub async fn ingest_documents(
        &self,
        collection: &str,
        documents: Vec<SourceDocument>,
    ) -> Result<IngestOutcome, RagError> {
        let collection = validate_collection_name(collection)?;

        let chunks: Vec<TextChunk> = documents
            .iter()
            .flat_map(|doc| self.chunker.split(&doc.text, &doc.source))
            .collect();
        if chunks.is_empty() {
            return Err(RagError::EmptyContent);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self
            .embedder
            .embed_documents(&texts)
            .await
            .map_err(RagError::Embedding)?;

        let documents_added = chunks.len();
        let rows: Vec<NewChunk> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, embedding)| NewChunk {
                metadata: json!({
                    "source": chunk.source,
                    "chunk_index": chunk.chunk_index,
                    "start_offset": chunk.start_offset,
                }),
                document: chunk.text,
                embedding,
            })
            .collect();

        self.store
            .replace_collection(collection, rows)
            .await
            .map_err(RagError::Store)?;

        if self.cache.invalidate(collection).await {
            tracing::info!("Cleared cached pipeline for updated collection: {}", collection);
        }

        tracing::info!(
            "Ingested {} chunks into collection '{}'",
            documents_added,
            collection
        );

        Ok(IngestOutcome {
            collection_name: collection.to_string(),
            documents_added,
        })
    }

    pub async fn ask(&self, collection: &str, question: &str) -> Result<Answer, RagError> {
        let collection = validate_collection_name(collection)?;
        let question = question.trim();
        if question.is_empty() {
            return Err(RagError::EmptyQuestion);
        }

        let pipeline = self.pipeline(collection).await?;
        pipeline.invoke(question).await.map_err(RagError::Inference)
    }

    /// Cached pipeline for `collection`, created on a miss.
    pub async fn pipeline(&self, collection: &str) -> Result<Arc<RetrievalPipeline>, RagError> {
        if let Some(pipeline) = self.cache.get(collection).await {
            tracing::debug!("Found cached pipeline for collection: {}", collection);
            return Ok(pipeline);
        }

        tracing::info!("Creating pipeline for collection: {}", collection);
        let epoch = self.cache.epoch().await;

        let record = match self.store.find_collection(collection).await {
            Ok(Some(record)) => record,
            Ok(None) => return Err(RagError::CollectionNotFound(collection.to_string())),
            Err(err) => {
                tracing::warn!("Failed to open collection '{}': {}", collection, err);
                return Err(RagError::CollectionNotFound(collection.to_string()));
            }
        };

        let pipeline = RetrievalPipeline::new(
            record,
            self.store.clone(),
            self.embedder.clone(),
            self.top_k,
            self.chain.clone(),
        );
        Ok(self.cache.insert(pipeline, epoch).await)
    }

    pub async fn list_collections(&self) -> Result<Vec<String>, RagError> {
        self.store.list_collections().await.map_err(RagError::Store)
    }

    /// Deletes the collection and evicts its pipeline. Returns `false` if
    /// the collection does not exist.
    pub async fn delete_collection(&self, collection: &str) -> Result<bool, RagError> {
        let deleted = self
            .store
            .delete_collection(collection)
            .await
            .map_err(RagError::Store)?;

        if deleted && self.cache.invalidate(collection).await {
            tracing::info!("Cleared cached pipeline for deleted collection: {}", collection);
        }

        Ok(deleted)
    }
}

fn validate_collection_name(name: &str) -> Result<&str, RagError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(RagError::InvalidCollectionName);
    }
    Ok(name)
}
