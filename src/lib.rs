pub mod core;
pub mod llm;
pub mod loaders;
pub mod rag;
pub mod server;
pub mod state;
