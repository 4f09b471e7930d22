//! Turning blob bytes into indexable text sections.

pub mod json;
pub mod pdf;
pub mod sections;

use anyhow::Error as TokenizerError;
use thiserror::Error;

pub use json::flatten_records;
pub use pdf::extract_pages;
pub use sections::{SectionSource, SectionSplitter, build_sections, determine_chunk_size};

/// Errors produced while decoding blobs or splitting their text.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// Section budget of zero tokens.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
    /// Tokenizer resources were unavailable for the configured model.
    #[error("failed to initialize tokenizer for model '{model}': {source}")]
    Tokenizer {
        /// Embedding model we attempted to load.
        model: String,
        /// Underlying error raised by the tokenizer library.
        #[source]
        source: TokenizerError,
    },
    /// Bytes could not be read as a PDF document.
    #[error("failed to read PDF: {0}")]
    Pdf(String),
    /// Bytes could not be parsed as JSON.
    #[error("failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),
}
