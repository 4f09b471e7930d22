use serde::Deserialize;
use std::env;
use std::sync::OnceLock;
use thiserror::Error;

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";
const DEFAULT_IMAGE_EMBEDDING_DIMENSION: usize = 1024;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the blob embedding service.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Base URL of the Qdrant instance backing the search indexes.
    pub qdrant_url: String,
    /// Optional API key required to access Qdrant.
    pub qdrant_api_key: Option<String>,
    /// Search index targeted by the embed operations.
    pub search_index_name: String,
    /// Embedding provider used to generate text vectors.
    pub embedding_provider: EmbeddingProvider,
    /// Embedding model identifier passed to the provider.
    pub embedding_model: String,
    /// Dimensionality of the produced text vectors.
    pub embedding_dimension: usize,
    /// Base URL of the OpenAI-compatible embeddings API.
    pub openai_base_url: String,
    /// API key sent as a bearer token to the OpenAI-compatible API.
    pub openai_api_key: Option<String>,
    /// Base URL of the Ollama runtime.
    pub ollama_url: String,
    /// Endpoint that turns raw image bytes into a vector.
    pub image_embedding_url: Option<String>,
    /// Optional API key for the image endpoint.
    pub image_embedding_api_key: Option<String>,
    /// Dimensionality of the produced image vectors.
    pub image_embedding_dimension: usize,
    /// Optional override for the automatic section size selection.
    pub text_splitter_chunk_size: Option<usize>,
    /// Token overlap carried between adjacent sections.
    pub text_splitter_chunk_overlap: usize,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

/// Supported embedding backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Local Ollama runtime.
    Ollama,
    /// Hosted OpenAI-compatible embeddings API.
    OpenAI,
    /// Deterministic offline hashing, for development and tests.
    Hash,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| ConfigError::MissingVariable(key.to_string()))
        };
        let optional = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        Ok(Self {
            qdrant_url: required("QDRANT_URL")?,
            qdrant_api_key: optional("QDRANT_API_KEY"),
            search_index_name: required("SEARCH_INDEX_NAME")?,
            embedding_provider: required("EMBEDDING_PROVIDER")?
                .parse()
                .map_err(|()| ConfigError::InvalidValue("EMBEDDING_PROVIDER".to_string()))?,
            embedding_model: required("EMBEDDING_MODEL")?,
            embedding_dimension: parse_value(
                "EMBEDDING_DIMENSION",
                required("EMBEDDING_DIMENSION")?,
            )?,
            openai_base_url: optional("OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            openai_api_key: optional("OPENAI_API_KEY"),
            ollama_url: optional("OLLAMA_URL").unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            image_embedding_url: optional("IMAGE_EMBEDDING_URL"),
            image_embedding_api_key: optional("IMAGE_EMBEDDING_API_KEY"),
            image_embedding_dimension: optional("IMAGE_EMBEDDING_DIMENSION")
                .map(|value| parse_value("IMAGE_EMBEDDING_DIMENSION", value))
                .transpose()?
                .unwrap_or(DEFAULT_IMAGE_EMBEDDING_DIMENSION),
            text_splitter_chunk_size: optional("TEXT_SPLITTER_CHUNK_SIZE")
                .map(|value| parse_value("TEXT_SPLITTER_CHUNK_SIZE", value))
                .transpose()?,
            text_splitter_chunk_overlap: optional("TEXT_SPLITTER_CHUNK_OVERLAP")
                .map(|value| parse_value("TEXT_SPLITTER_CHUNK_OVERLAP", value))
                .transpose()?
                .unwrap_or(0),
            server_port: optional("SERVER_PORT")
                .map(|value| parse_value("SERVER_PORT", value))
                .transpose()?,
        })
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue(key.to_string()))
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAI),
            "hash" => Ok(Self::Hash),
            _ => Err(()),
        }
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() -> Result<&'static Config, ConfigError> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    tracing::debug!(
        qdrant_url = %config.qdrant_url,
        index = %config.search_index_name,
        provider = ?config.embedding_provider,
        model = %config.embedding_model,
        image_endpoint = config.image_embedding_url.is_some(),
        "Loaded configuration"
    );
    Ok(CONFIG.get_or_init(|| config))
}
