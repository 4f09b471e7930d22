//! Embedding client abstraction and provider adapters.
//!
//! Text vectors come from the configured provider (OpenAI-compatible API, Ollama, or the
//! deterministic hash client). Image vectors come from a separate vectorize endpoint when
//! `IMAGE_EMBEDDING_URL` is set; the hash provider embeds images on its own.

pub mod hash;
pub mod image;
pub mod ollama;
pub mod openai;

use crate::config::{Config, EmbeddingProvider};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use thiserror::Error;

pub use hash::HashEmbeddingClient;
pub use image::{ImageEndpointClient, VectorizeImageClient};
pub use ollama::OllamaEmbeddingClient;
pub use openai::OpenAiEmbeddingClient;

const USER_AGENT: &str = "blob-embed/0.1";

/// Errors raised by embedding providers.
#[derive(Debug, Error)]
pub enum EmbeddingClientError {
    /// Provider refused the input with a client-error status.
    #[error("Embedding provider rejected the request ({status}): {body}")]
    Rejected {
        /// HTTP status returned by the provider.
        status: StatusCode,
        /// Body payload associated with the rejection.
        body: String,
    },
    /// Provider could not be reached.
    #[error("Embedding provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider failed while producing embeddings.
    #[error("Failed to generate embeddings: {0}")]
    GenerationFailed(String),
    /// Provider response could not be decoded.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
    /// No backend is able to embed images.
    #[error("No image embedding endpoint configured")]
    ImageUnsupported,
}

impl EmbeddingClientError {
    /// Whether the provider itself declined the input.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }
}

/// Interface implemented by embedding backends.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Produce an embedding vector for each supplied text, in input order.
    async fn embed_texts(&self, texts: Vec<String>)
    -> Result<Vec<Vec<f32>>, EmbeddingClientError>;

    /// Produce a single embedding vector for raw image bytes.
    async fn embed_image(&self, _image: &[u8]) -> Result<Vec<f32>, EmbeddingClientError> {
        Err(EmbeddingClientError::ImageUnsupported)
    }
}

/// Build the embedding client described by the configuration.
pub fn build_embedding_client(
    config: &Config,
) -> Result<Box<dyn EmbeddingClient>, EmbeddingClientError> {
    let text_client: Box<dyn EmbeddingClient> = match config.embedding_provider {
        EmbeddingProvider::OpenAI => Box::new(OpenAiEmbeddingClient::new(
            http_client()?,
            &config.openai_base_url,
            config.embedding_model.clone(),
            config.openai_api_key.clone(),
        )),
        EmbeddingProvider::Ollama => Box::new(OllamaEmbeddingClient::new(
            http_client()?,
            &config.ollama_url,
            config.embedding_model.clone(),
        )),
        EmbeddingProvider::Hash => Box::new(HashEmbeddingClient::new(
            config.embedding_dimension,
            config.image_embedding_dimension,
        )),
    };

    tracing::info!(
        provider = ?config.embedding_provider,
        model = %config.embedding_model,
        image_endpoint = config.image_embedding_url.is_some(),
        "Embedding client initialized"
    );

    match config.image_embedding_url.as_deref() {
        Some(url) => {
            let image_client = VectorizeImageClient::new(
                http_client()?,
                url,
                config.image_embedding_api_key.clone(),
            );
            Ok(Box::new(ImageEndpointClient::new(text_client, image_client)))
        }
        None => Ok(text_client),
    }
}

pub(crate) fn http_client() -> Result<Client, EmbeddingClientError> {
    Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .map_err(|error| EmbeddingClientError::ProviderUnavailable(error.to_string()))
}

/// Translate a non-success response into the matching error variant.
pub(crate) async fn error_from_response(
    provider: &str,
    response: reqwest::Response,
) -> EmbeddingClientError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if status.is_client_error() {
        tracing::warn!(provider, %status, "Embedding request rejected");
        EmbeddingClientError::Rejected { status, body }
    } else {
        tracing::error!(provider, %status, "Embedding request failed");
        EmbeddingClientError::GenerationFailed(format!("{provider} returned {status}: {body}"))
    }
}

pub(crate) fn provider_unreachable(
    provider: &str,
    base_url: &str,
    error: reqwest::Error,
) -> EmbeddingClientError {
    EmbeddingClientError::ProviderUnavailable(format!(
        "failed to reach {provider} at {base_url}: {error}"
    ))
}

pub(crate) fn join_endpoint(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
