//! Blob payloads and the facade error taxonomy.

use crate::{
    embedding::EmbeddingClientError,
    extract::ExtractionError,
    qdrant::QdrantError,
};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Opaque blob bytes handed to a single embed call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlobContent(Vec<u8>);

impl BlobContent {
    /// Wrap bytes already in memory.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Drain an async byte stream into a blob.
    pub async fn read_from<R>(mut reader: R) -> std::io::Result<Self>
    where
        R: AsyncRead + Unpin,
    {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes).await?;
        Ok(Self(bytes))
    }

    /// Number of bytes in the blob.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the blob holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrow the raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Take ownership of the raw bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl From<Vec<u8>> for BlobContent {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for BlobContent {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

/// Signaled failures of the embed facade.
///
/// Ordinary rejections are not errors: embed operations report them as `Ok(false)`.
#[derive(Debug, Error)]
pub enum EmbedError {
    /// Caller supplied an empty name/URL or a malformed index name.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// The cancellation token fired before the operation finished.
    #[error("Operation cancelled")]
    Cancelled,
    /// Blob bytes could not be decoded as the declared format.
    #[error("Failed to extract blob content: {0}")]
    Extraction(#[from] ExtractionError),
    /// Embedding provider failed or could not be reached.
    #[error("Embedding request failed: {0}")]
    Embedding(#[from] EmbeddingClientError),
    /// Search index backend failed or could not be reached.
    #[error("Search index request failed: {0}")]
    Index(#[from] QdrantError),
    /// Provider returned vectors that do not fit the index.
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Vector size configured for the index.
        expected: usize,
        /// Vector size produced by the provider.
        actual: usize,
    },
    /// Background extraction task did not complete.
    #[error("Extraction task failed: {0}")]
    Task(String),
}

impl EmbedError {
    /// Whether a backend confirmed it will not accept the content.
    pub fn is_rejection(&self) -> bool {
        match self {
            Self::Embedding(error) => error.is_rejection(),
            Self::Index(QdrantError::Rejected { .. }) => true,
            _ => false,
        }
    }
}

pub(crate) fn require_non_empty(field: &str, value: &str) -> Result<(), EmbedError> {
    if value.trim().is_empty() {
        Err(EmbedError::InvalidInput(format!("{field} must not be empty")))
    } else {
        Ok(())
    }
}
