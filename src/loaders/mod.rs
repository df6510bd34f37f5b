//! Document loaders feeding `RagService::ingest_documents`.

pub mod confluence;
pub mod html;

pub use confluence::{ConfluenceClient, ConfluenceError};
pub use html::strip_html_tags;
