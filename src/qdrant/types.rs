//! Shared types used by the search index client and helpers.

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Named vector holding text section embeddings.
pub const TEXT_VECTOR: &str = "embedding";
/// Named vector holding image embeddings.
pub const IMAGE_VECTOR: &str = "image_embedding";
/// Upper bound on points sent in a single upsert request.
pub const MAX_UPSERT_BATCH: usize = 1000;

/// Errors returned while interacting with the search index backend.
#[derive(Debug, Error)]
pub enum QdrantError {
    /// Base URL failed to parse or normalize.
    #[error("Invalid Qdrant URL: {0}")]
    InvalidUrl(String),
    /// Index name is empty or contains unsupported characters.
    #[error("Invalid search index name: {0:?}")]
    InvalidIndexName(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Create was requested for an index that is already present.
    #[error("Search index already exists: {0}")]
    IndexAlreadyExists(String),
    /// The addressed index does not exist.
    #[error("Search index not found: {0}")]
    IndexNotFound(String),
    /// Qdrant refused the submitted points.
    #[error("Qdrant rejected the request ({status}): {body}")]
    Rejected {
        /// HTTP status returned from Qdrant.
        status: StatusCode,
        /// Body payload associated with the rejection.
        body: String,
    },
    /// Qdrant responded with an unexpected status code.
    #[error("Unexpected Qdrant response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned from Qdrant.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
}

/// Vector layout applied when an index is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexSchema {
    /// Size of the text section vectors.
    pub text_dimension: usize,
    /// Size of the image vectors.
    pub image_dimension: usize,
}

/// Prepared point ready for upsert.
#[derive(Debug, Clone)]
pub struct IndexPoint {
    /// Point identifier (UUID string).
    pub id: String,
    /// Named vector the embedding is stored under.
    pub vector_name: &'static str,
    /// Embedding values.
    pub vector: Vec<f32>,
    /// Payload stored alongside the vector.
    pub payload: Value,
}

/// Summary describing how Qdrant applied an upsert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertSummary {
    /// Number of points written.
    pub upserted: usize,
    /// Number of requests used.
    pub batches: usize,
}

#[derive(Deserialize)]
pub(crate) struct ListCollectionsResponse {
    pub(crate) result: ListCollectionsResult,
}

#[derive(Deserialize)]
pub(crate) struct ListCollectionsResult {
    pub(crate) collections: Vec<CollectionDescription>,
}

#[derive(Deserialize)]
pub(crate) struct CollectionDescription {
    pub(crate) name: String,
}
