//! Qdrant-backed search index integration.

pub mod client;
pub mod payload;
pub mod types;

pub use client::{QdrantService, validate_index_name};
pub use payload::{DocumentFields, compute_content_hash, point_id_for};
pub use types::{
    IMAGE_VECTOR, IndexPoint, IndexSchema, MAX_UPSERT_BATCH, QdrantError, TEXT_VECTOR,
    UpsertSummary,
};
