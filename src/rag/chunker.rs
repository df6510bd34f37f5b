//! Fixed-size sliding-window chunker.
//!
//! Windows are measured in characters and overlap by `chunk_overlap`
//! characters. There is no sentence or token awareness: the same text and
//! settings always produce the same chunks.

use serde::{Deserialize, Serialize};

/// Configuration for the chunker.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ChunkerConfig {
    /// Maximum chunk size in characters
    pub chunk_size: usize,
    /// Overlap between chunks
    pub chunk_overlap: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
        }
    }
}

/// A text chunk with source information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextChunk {
    /// The text content
    pub text: String,
    /// Source identifier (request, page url, seed file, ...)
    pub source: String,
    /// Character offset in original document
    pub start_offset: usize,
    /// Chunk index within the source
    pub chunk_index: usize,
}

#[derive(Debug, Clone)]
pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    pub fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }

    /// Split text into overlapping chunks. Blank input yields no chunks.
    pub fn split(&self, text: &str, source: &str) -> Vec<TextChunk> {
        let chunk_size = self.config.chunk_size.max(1);
        let step = chunk_size.saturating_sub(self.config.chunk_overlap).max(1);

        let chars: Vec<char> = text.chars().collect();
        let total_chars = chars.len();

        let mut chunks = Vec::new();
        let mut start = 0;

        while start < total_chars {
            let end = (start + chunk_size).min(total_chars);
            let chunk_text: String = chars[start..end].iter().collect();
            let trimmed = chunk_text.trim();

            if !trimmed.is_empty() {
                chunks.push(TextChunk {
                    text: trimmed.to_string(),
                    source: source.to_string(),
                    start_offset: start,
                    chunk_index: chunks.len(),
                });
            }

            if end == total_chars {
                break;
            }
            start += step;
        }

        chunks
    }
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(ChunkerConfig::default())
    }
}
