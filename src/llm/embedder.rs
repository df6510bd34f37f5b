use std::sync::Arc;

use super::provider::LlmProvider;
use crate::core::errors::ApiError;

/// Embedding model bound to a provider, sending inputs in fixed-size batches.
#[derive(Clone)]
pub struct Embedder {
    provider: Arc<dyn LlmProvider>,
    model: String,
    batch_size: usize,
}

impl Embedder {
    pub fn new(provider: Arc<dyn LlmProvider>, model: String, batch_size: usize) -> Self {
        Self {
            provider,
            model,
            batch_size: batch_size.max(1),
        }
    }

    pub async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let embedded = self.provider.embed(batch, &self.model).await?;
            if embedded.len() != batch.len() {
                return Err(ApiError::Internal(format!(
                    "{} returned {} embeddings for a batch of {}",
                    self.provider.name(),
                    embedded.len(),
                    batch.len()
                )));
            }
            vectors.extend(embedded);
        }
        Ok(vectors)
    }

    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>, ApiError> {
        let mut vectors = self
            .provider
            .embed(&[text.to_string()], &self.model)
            .await?;
        vectors
            .pop()
            .ok_or_else(|| ApiError::Internal("empty embedding response".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::llm::types::{ChatRequest, ProviderModel};

    #[derive(Default)]
    struct CountingProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LlmProvider for CountingProvider {
        fn name(&self) -> &str {
            "counting"
        }

        async fn health_check(&self) -> Result<bool, ApiError> {
            Ok(true)
        }

        async fn list_models(&self) -> Result<Vec<ProviderModel>, ApiError> {
            Ok(Vec::new())
        }

        async fn chat(&self, _request: ChatRequest, _model_id: &str) -> Result<String, ApiError> {
            Ok(String::new())
        }

        async fn embed(&self, inputs: &[String], _model_id: &str) -> Result<Vec<Vec<f32>>, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(inputs.iter().map(|s| vec![s.len() as f32]).collect())
        }
    }

    #[tokio::test]
    async fn embeds_in_batches_preserving_order() {
        let provider = Arc::new(CountingProvider::default());
        let embedder = Embedder::new(provider.clone(), "m".to_string(), 2);

        let texts: Vec<String> = ["a", "bb", "ccc", "dddd", "eeeee"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let vectors = embedder.embed_documents(&texts).await.unwrap();

        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
        let lens: Vec<f32> = vectors.iter().map(|v| v[0]).collect();
        assert_eq!(lens, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[tokio::test]
    async fn query_embedding_is_single_vector() {
        let embedder = Embedder::new(Arc::new(CountingProvider::default()), "m".to_string(), 8);
        assert_eq!(embedder.embed_query("four").await.unwrap(), vec![4.0]);
    }
}
