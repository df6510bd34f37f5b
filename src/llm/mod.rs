pub mod embedder;
pub mod ollama;
pub mod provider;
pub mod types;

pub use embedder::Embedder;
pub use ollama::OllamaProvider;
pub use provider::LlmProvider;
pub use types::{ChatMessage, ChatRequest, ProviderModel};
