//! Embed service backed by an embedding provider and a Qdrant search index.

use crate::{
    config::Config,
    embedding::{EmbeddingClient, EmbeddingClientError, build_embedding_client},
    extract::{
        SectionSource, SectionSplitter, build_sections, determine_chunk_size, extract_pages,
        flatten_records, sections::sanitize_key,
    },
    metrics::{BlobKind, EmbedMetrics, MetricsSnapshot},
    qdrant::{
        DocumentFields, IMAGE_VECTOR, IndexPoint, IndexSchema, QdrantError, QdrantService,
        TEXT_VECTOR, validate_index_name,
    },
    service::{
        EmbedService,
        cancel::run_cancellable,
        types::{BlobContent, EmbedError, require_non_empty},
    },
};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Texts sent to the embedding provider per request.
const EMBED_BATCH_SIZE: usize = 64;

/// Where embedded blobs land and what vectors the index expects.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    /// Index that embed operations write to.
    pub index_name: String,
    /// Vector sizes used when creating indexes and checking provider output.
    pub schema: IndexSchema,
}

impl ServiceSettings {
    /// Derive settings from the loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            index_name: config.search_index_name.clone(),
            schema: IndexSchema {
                text_dimension: config.embedding_dimension,
                image_dimension: config.image_embedding_dimension,
            },
        }
    }
}

/// Coordinates extraction, embedding, and index writes for every blob kind.
///
/// Construct it once near process start and share it through an `Arc`; all state is either
/// immutable or atomic.
pub struct SearchEmbedService {
    embedding_client: Box<dyn EmbeddingClient>,
    qdrant: QdrantService,
    splitter: SectionSplitter,
    settings: ServiceSettings,
    metrics: Arc<EmbedMetrics>,
}

impl SearchEmbedService {
    /// Build the service and its backend clients from configuration.
    pub fn new(config: &Config) -> Result<Self, EmbedError> {
        let embedding_client = build_embedding_client(config)?;
        let qdrant = QdrantService::new(&config.qdrant_url, config.qdrant_api_key.clone())?;
        let chunk_size = determine_chunk_size(
            config.text_splitter_chunk_size,
            config.embedding_provider,
            &config.embedding_model,
        );
        let splitter = SectionSplitter::new(
            chunk_size,
            config.text_splitter_chunk_overlap,
            config.embedding_provider,
            &config.embedding_model,
        )?;
        tracing::info!(
            index = %config.search_index_name,
            chunk_size,
            overlap = config.text_splitter_chunk_overlap,
            "Embed service configured"
        );

        Ok(Self::from_parts(
            embedding_client,
            qdrant,
            splitter,
            ServiceSettings::from_config(config),
        ))
    }

    /// Assemble the service from prebuilt components.
    pub fn from_parts(
        embedding_client: Box<dyn EmbeddingClient>,
        qdrant: QdrantService,
        splitter: SectionSplitter,
        settings: ServiceSettings,
    ) -> Self {
        Self {
            embedding_client,
            qdrant,
            splitter,
            settings,
            metrics: Arc::new(EmbedMetrics::new()),
        }
    }

    async fn index_text_parts(
        &self,
        source: SectionSource<'_>,
        parts: &[String],
        kind: BlobKind,
    ) -> Result<bool, EmbedError> {
        let (sections, skipped) = build_sections(source, parts, &self.splitter);
        if sections.is_empty() {
            tracing::info!(
                source = source.source_file,
                parts = parts.len(),
                "Blob has no embeddable text"
            );
            self.metrics.record_rejection();
            return Ok(false);
        }

        let count = sections.len();
        tracing::debug!(
            source = source.source_file,
            sections = count,
            skipped_duplicates = skipped,
            "Sections prepared"
        );
        let outcome = self.write_sections(source, sections).await;
        self.settle(outcome, kind, count, source.source_file)
    }

    /// Embed and upsert the sections of one blob, then drop its points from earlier runs.
    async fn write_sections(
        &self,
        source: SectionSource<'_>,
        sections: Vec<DocumentFields>,
    ) -> Result<(), EmbedError> {
        let mut points = Vec::with_capacity(sections.len());
        for batch in sections.chunks(EMBED_BATCH_SIZE) {
            let texts = batch.iter().map(|fields| fields.content.clone()).collect();
            let vectors = self.embedding_client.embed_texts(texts).await?;
            if vectors.len() != batch.len() {
                return Err(EmbeddingClientError::InvalidResponse(format!(
                    "expected {} vectors, received {}",
                    batch.len(),
                    vectors.len()
                ))
                .into());
            }
            for (fields, vector) in batch.iter().zip(vectors) {
                check_dimension(self.settings.schema.text_dimension, &vector)?;
                points.push(QdrantService::prepare_point(fields, TEXT_VECTOR, vector));
            }
        }
        let keep_ids: Vec<String> = points.iter().map(|point| point.id.clone()).collect();
        self.upsert(points).await?;
        self.qdrant
            .delete_stale_points(
                &self.settings.index_name,
                source.source_file,
                source.category,
                &keep_ids,
            )
            .await?;
        Ok(())
    }

    async fn write_image(&self, fields: &DocumentFields, image: &[u8]) -> Result<(), EmbedError> {
        let vector = self.embedding_client.embed_image(image).await?;
        check_dimension(self.settings.schema.image_dimension, &vector)?;
        self.upsert(vec![QdrantService::prepare_point(
            fields,
            IMAGE_VECTOR,
            vector,
        )])
        .await
    }

    async fn upsert(&self, points: Vec<IndexPoint>) -> Result<(), EmbedError> {
        let summary = self
            .qdrant
            .upsert_points(&self.settings.index_name, points)
            .await?;
        tracing::debug!(
            index = %self.settings.index_name,
            points = summary.upserted,
            batches = summary.batches,
            "Blob points written"
        );
        Ok(())
    }

    /// Fold backend rejections into `false`; pass every other failure through.
    fn settle(
        &self,
        outcome: Result<(), EmbedError>,
        kind: BlobKind,
        points: usize,
        source: &str,
    ) -> Result<bool, EmbedError> {
        match outcome {
            Ok(()) => {
                self.metrics.record_blob(kind, points as u64);
                tracing::info!(?kind, source, points, "Blob embedded");
                Ok(true)
            }
            Err(error) if error.is_rejection() => {
                self.metrics.record_rejection();
                tracing::warn!(?kind, source, error = %error, "Blob rejected by backend");
                Ok(false)
            }
            Err(error) => {
                tracing::error!(?kind, source, error = %error, "Blob embedding failed");
                Err(error)
            }
        }
    }

    fn empty_blob(&self, kind: BlobKind, source: &str) -> Result<bool, EmbedError> {
        tracing::info!(?kind, source, "Empty blob; nothing to embed");
        self.metrics.record_rejection();
        Ok(false)
    }
}

fn check_dimension(expected: usize, vector: &[f32]) -> Result<(), EmbedError> {
    if vector.len() == expected {
        Ok(())
    } else {
        Err(EmbedError::DimensionMismatch {
            expected,
            actual: vector.len(),
        })
    }
}

fn checked_index_name(name: &str) -> Result<(), EmbedError> {
    validate_index_name(name).map_err(|error| match error {
        QdrantError::InvalidIndexName(message) => EmbedError::InvalidInput(message),
        other => EmbedError::Index(other),
    })
}

#[async_trait]
impl EmbedService for SearchEmbedService {
    async fn embed_pdf_blob(&self, content: BlobContent, name: &str) -> Result<bool, EmbedError> {
        require_non_empty("name", name)?;
        if content.is_empty() {
            return self.empty_blob(BlobKind::Pdf, name);
        }

        let bytes = content.into_bytes();
        // pdf-extract may panic on hostile input; a panicked task surfaces as a JoinError.
        let pages = tokio::task::spawn_blocking(move || extract_pages(&bytes))
            .await
            .map_err(|error| EmbedError::Task(error.to_string()))??;

        let source = SectionSource {
            source_file: name,
            category: "pdf",
        };
        self.index_text_parts(source, &pages, BlobKind::Pdf).await
    }

    async fn embed_image_blob(
        &self,
        content: BlobContent,
        source_url: &str,
        name: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<bool, EmbedError> {
        require_non_empty("source_url", source_url)?;
        require_non_empty("name", name)?;

        run_cancellable(cancel, async {
            if content.is_empty() {
                return self.empty_blob(BlobKind::Image, source_url);
            }
            let source = SectionSource {
                source_file: source_url,
                category: "image",
            };
            let fields = DocumentFields {
                key: sanitize_key(&format!("image-{source_url}")),
                identity: source.section_identity(1, 0),
                content: name.to_string(),
                category: "image".to_string(),
                source_page: source_url.to_string(),
                source_file: source_url.to_string(),
            };
            let outcome = self.write_image(&fields, content.as_bytes()).await;
            self.settle(outcome, BlobKind::Image, 1, source_url)
        })
        .await
    }

    async fn embed_json_blob(
        &self,
        content: BlobContent,
        source_url: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<bool, EmbedError> {
        require_non_empty("source_url", source_url)?;

        run_cancellable(cancel, async {
            if content.is_empty() {
                return self.empty_blob(BlobKind::Json, source_url);
            }
            let records = flatten_records(content.as_bytes())?;
            let source = SectionSource {
                source_file: source_url,
                category: "json",
            };
            self.index_text_parts(source, &records, BlobKind::Json).await
        })
        .await
    }

    async fn create_search_index(
        &self,
        name: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<(), EmbedError> {
        checked_index_name(name)?;
        run_cancellable(cancel, async {
            self.qdrant.create_index(name, self.settings.schema).await?;
            Ok::<_, EmbedError>(())
        })
        .await
    }

    async fn ensure_search_index(
        &self,
        name: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<(), EmbedError> {
        checked_index_name(name)?;
        run_cancellable(cancel, async {
            let created = self.qdrant.ensure_index(name, self.settings.schema).await?;
            tracing::info!(index = name, created, "Search index ensured");
            Ok::<_, EmbedError>(())
        })
        .await
    }

    async fn list_search_indexes(&self) -> Result<Vec<String>, EmbedError> {
        Ok(self.qdrant.list_indexes().await?)
    }

    fn default_index(&self) -> &str {
        &self.settings.index_name
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}
