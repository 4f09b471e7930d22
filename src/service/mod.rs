//! Embed facade over extraction, embedding providers, and the search index.

pub mod cancel;
pub mod search;
pub mod types;

pub use cancel::run_cancellable;
pub use search::{SearchEmbedService, ServiceSettings};
pub use types::{BlobContent, EmbedError};

use crate::metrics::MetricsSnapshot;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Embed blobs into the search index and manage the indexes themselves.
///
/// Embed operations return `Ok(true)` when the blob was indexed and `Ok(false)` when a backend
/// rejected it or it held nothing embeddable. Everything else, including cancellation, is an
/// `Err`. Implementations are shared across tasks, so every call must be safe to run
/// concurrently.
#[async_trait]
pub trait EmbedService: Send + Sync {
    /// Extract the pages of a PDF and index its sections under `name`.
    async fn embed_pdf_blob(&self, content: BlobContent, name: &str) -> Result<bool, EmbedError>;

    /// Index one image vector for the image found at `source_url`.
    async fn embed_image_blob(
        &self,
        content: BlobContent,
        source_url: &str,
        name: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<bool, EmbedError>;

    /// Flatten JSON records and index them as text sections.
    async fn embed_json_blob(
        &self,
        content: BlobContent,
        source_url: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<bool, EmbedError>;

    /// Create a new search index; fails when one with the same name exists.
    async fn create_search_index(
        &self,
        name: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<(), EmbedError>;

    /// Make sure a search index exists, creating it only when missing.
    async fn ensure_search_index(
        &self,
        name: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<(), EmbedError>;

    /// Enumerate the indexes known to the backend.
    async fn list_search_indexes(&self) -> Result<Vec<String>, EmbedError>;

    /// Index that embed operations write to.
    fn default_index(&self) -> &str;

    /// Current embed counters.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}
