//! Retrieval pipeline: retriever over one collection plus the shared
//! "stuff" answer chain (all retrieved chunks go into a single prompt).

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use super::store::{ChunkMatch, CollectionRecord, VectorStore};
use crate::core::errors::ApiError;
use crate::llm::{ChatMessage, ChatRequest, Embedder, LlmProvider};

#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    pub fn render(&self, context: &str, input: &str) -> String {
        // {input} last: a question containing "{context}" stays literal
        self.template
            .replace("{context}", context)
            .replace("{input}", input)
    }
}

/// Fills the prompt with retrieved context and asks the chat model.
pub struct AnswerChain {
    provider: Arc<dyn LlmProvider>,
    chat_model: String,
    template: PromptTemplate,
    temperature: Option<f64>,
    fallback_answer: String,
}

impl AnswerChain {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        chat_model: String,
        template: PromptTemplate,
        temperature: Option<f64>,
        fallback_answer: String,
    ) -> Self {
        Self {
            provider,
            chat_model,
            template,
            temperature,
            fallback_answer,
        }
    }

    pub fn stuff_documents(documents: &[ChunkMatch]) -> String {
        documents
            .iter()
            .map(|doc| doc.document.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    pub async fn answer(&self, question: &str, documents: &[ChunkMatch]) -> Result<String, ApiError> {
        if documents.is_empty() {
            return Ok(self.fallback_answer.clone());
        }

        let prompt = self.template.render(&Self::stuff_documents(documents), question);
        let request =
            ChatRequest::new(vec![ChatMessage::user(prompt)]).with_temperature(self.temperature);
        self.provider.chat(request, &self.chat_model).await
    }
}

/// Similarity retriever bound to one stored collection.
pub struct Retriever {
    store: Arc<dyn VectorStore>,
    embedder: Embedder,
    collection_id: Uuid,
    k: usize,
}

impl Retriever {
    pub async fn retrieve(&self, question: &str) -> Result<Vec<ChunkMatch>, ApiError> {
        let query = self.embedder.embed_query(question).await?;
        self.store.search(self.collection_id, &query, self.k).await
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub answer: String,
    pub context: Vec<ChunkMatch>,
}

pub struct RetrievalPipeline {
    collection: CollectionRecord,
    retriever: Retriever,
    chain: Arc<AnswerChain>,
}

impl RetrievalPipeline {
    pub fn new(
        collection: CollectionRecord,
        store: Arc<dyn VectorStore>,
        embedder: Embedder,
        k: usize,
        chain: Arc<AnswerChain>,
    ) -> Self {
        let retriever = Retriever {
            store,
            embedder,
            collection_id: collection.uuid,
            k,
        };
        Self {
            collection,
            retriever,
            chain,
        }
    }

    pub fn collection(&self) -> &CollectionRecord {
        &self.collection
    }

    pub async fn invoke(&self, question: &str) -> Result<Answer, ApiError> {
        let context = self.retriever.retrieve(question).await?;
        tracing::debug!(
            "Retrieved {} chunks from collection '{}'",
            context.len(),
            self.collection.name
        );
        let answer = self.chain.answer(question, &context).await?;
        Ok(Answer { answer, context })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::settings::DEFAULT_PROMPT_TEMPLATE;

    fn doc(text: &str) -> ChunkMatch {
        ChunkMatch {
            document: text.to_string(),
            metadata: serde_json::Value::Null,
            score: 1.0,
        }
    }

    #[test]
    fn renders_default_template() {
        let prompt = PromptTemplate::new(DEFAULT_PROMPT_TEMPLATE).render("CTX", "Who?");
        assert!(prompt.contains("<context>\nCTX\n</context>"));
        assert!(prompt.contains("Question: Who?"));
        assert!(prompt.starts_with("Answer the following question based only on the provided context:"));
    }

    #[test]
    fn question_placeholders_are_not_expanded() {
        let prompt = PromptTemplate::new("{context}|{input}").render("ctx", "what is {context}?");
        assert_eq!(prompt, "ctx|what is {context}?");
    }

    #[test]
    fn stuffs_documents_with_blank_lines() {
        let joined = AnswerChain::stuff_documents(&[doc("one"), doc("two")]);
        assert_eq!(joined, "one\n\ntwo");
    }
}
