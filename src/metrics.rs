use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Kind of blob an embed call handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobKind {
    /// PDF document split into page sections.
    Pdf,
    /// Single image vector.
    Image,
    /// JSON records flattened to text.
    Json,
}

/// Thread-safe counters describing embed activity.
#[derive(Default)]
pub struct EmbedMetrics {
    pdf_blobs: AtomicU64,
    image_blobs: AtomicU64,
    json_blobs: AtomicU64,
    sections_indexed: AtomicU64,
    blobs_rejected: AtomicU64,
}

impl EmbedMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a blob that was fully indexed as `point_count` points.
    pub fn record_blob(&self, kind: BlobKind, point_count: u64) {
        let counter = match kind {
            BlobKind::Pdf => &self.pdf_blobs,
            BlobKind::Image => &self.image_blobs,
            BlobKind::Json => &self.json_blobs,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.sections_indexed
            .fetch_add(point_count, Ordering::Relaxed);
    }

    /// Record a blob that ended with `false`.
    pub fn record_rejection(&self) {
        self.blobs_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            pdf_blobs_embedded: self.pdf_blobs.load(Ordering::Relaxed),
            image_blobs_embedded: self.image_blobs.load(Ordering::Relaxed),
            json_blobs_embedded: self.json_blobs.load(Ordering::Relaxed),
            sections_indexed: self.sections_indexed.load(Ordering::Relaxed),
            blobs_rejected: self.blobs_rejected.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of embed counters used for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// PDF blobs indexed since startup.
    pub pdf_blobs_embedded: u64,
    /// Image blobs indexed since startup.
    pub image_blobs_embedded: u64,
    /// JSON blobs indexed since startup.
    pub json_blobs_embedded: u64,
    /// Points written across all indexed blobs.
    pub sections_indexed: u64,
    /// Blobs that were rejected or had nothing to embed.
    pub blobs_rejected: u64,
}
