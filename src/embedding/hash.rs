//! Deterministic offline embeddings.

use super::{EmbeddingClient, EmbeddingClientError};
use async_trait::async_trait;

/// Embedding client that folds input bytes into a normalized vector.
///
/// Produces the same vector for the same input without any network access, which keeps local
/// development and pipeline tests independent of a running model.
pub struct HashEmbeddingClient {
    text_dimension: usize,
    image_dimension: usize,
}

impl HashEmbeddingClient {
    /// Construct a client producing vectors of the given sizes.
    pub const fn new(text_dimension: usize, image_dimension: usize) -> Self {
        Self {
            text_dimension,
            image_dimension,
        }
    }

    fn encode(bytes: &[u8], dimension: usize) -> Vec<f32> {
        let mut embedding = vec![0.0_f32; dimension];

        if bytes.is_empty() {
            return embedding;
        }

        for (idx, byte) in bytes.iter().enumerate() {
            let position = idx % dimension;
            embedding[position] += f32::from(*byte) / 255.0;
        }

        let norm = embedding
            .iter()
            .map(|value| value * value)
            .sum::<f32>()
            .sqrt();

        if norm > 0.0 {
            for value in &mut embedding {
                *value /= norm;
            }
        }

        embedding
    }
}

#[async_trait]
impl EmbeddingClient for HashEmbeddingClient {
    async fn embed_texts(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        if self.text_dimension == 0 {
            return Err(EmbeddingClientError::GenerationFailed(
                "embedding dimension must be greater than zero".to_string(),
            ));
        }

        Ok(texts
            .iter()
            .map(|text| Self::encode(text.as_bytes(), self.text_dimension))
            .collect())
    }

    async fn embed_image(&self, image: &[u8]) -> Result<Vec<f32>, EmbeddingClientError> {
        if self.image_dimension == 0 {
            return Err(EmbeddingClientError::GenerationFailed(
                "image embedding dimension must be greater than zero".to_string(),
            ));
        }
        Ok(Self::encode(image, self.image_dimension))
    }
}
