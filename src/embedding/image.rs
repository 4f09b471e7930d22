//! Image vectorization over HTTP.

use super::{EmbeddingClient, EmbeddingClientError, error_from_response, provider_unreachable};
use async_trait::async_trait;
use reqwest::{Client, header::CONTENT_TYPE};
use serde::Deserialize;

/// Client for an endpoint that accepts raw image bytes and answers `{"vector": [...]}`.
pub struct VectorizeImageClient {
    http: Client,
    endpoint: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VectorizeResponse {
    vector: Vec<f32>,
}

impl VectorizeImageClient {
    /// Create a client posting to `endpoint`.
    pub fn new(http: Client, endpoint: &str, api_key: Option<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.to_string(),
            api_key,
        }
    }

    /// Vectorize a single image.
    pub async fn vectorize(&self, image: &[u8]) -> Result<Vec<f32>, EmbeddingClientError> {
        let mut request = self
            .http
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(image.to_vec());
        if let Some(key) = self.api_key.as_deref().filter(|key| !key.is_empty()) {
            request = request.header("api-key", key);
        }

        let response = request
            .send()
            .await
            .map_err(|error| provider_unreachable("image endpoint", &self.endpoint, error))?;

        if !response.status().is_success() {
            return Err(error_from_response("image endpoint", response).await);
        }

        let body: VectorizeResponse = response.json().await.map_err(|error| {
            EmbeddingClientError::InvalidResponse(format!(
                "failed to decode vectorize response: {error}"
            ))
        })?;

        if body.vector.is_empty() {
            return Err(EmbeddingClientError::InvalidResponse(
                "vectorize response contained an empty vector".into(),
            ));
        }
        Ok(body.vector)
    }
}

/// Pairs a text embedding client with a dedicated image endpoint.
pub struct ImageEndpointClient {
    text: Box<dyn EmbeddingClient>,
    image: VectorizeImageClient,
}

impl ImageEndpointClient {
    /// Route text requests to `text` and image requests to `image`.
    pub fn new(text: Box<dyn EmbeddingClient>, image: VectorizeImageClient) -> Self {
        Self { text, image }
    }
}

#[async_trait]
impl EmbeddingClient for ImageEndpointClient {
    async fn embed_texts(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        self.text.embed_texts(texts).await
    }

    async fn embed_image(&self, image: &[u8]) -> Result<Vec<f32>, EmbeddingClientError> {
        self.image.vectorize(image).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashEmbeddingClient;
    use httpmock::{Method::POST, MockServer};
    use serde_json::json;

    #[tokio::test]
    async fn posts_raw_bytes_with_api_key() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/vectorize")
                    .header("content-type", "application/octet-stream")
                    .header("api-key", "secret")
                    .body("PNGDATA");
                then.status(200).json_body(json!({
                    "modelVersion": "2023-04-15",
                    "vector": [0.5, 0.25]
                }));
            })
            .await;

        let client = VectorizeImageClient::new(
            Client::new(),
            &server.url("/vectorize"),
            Some("secret".into()),
        );
        let vector = client.vectorize(b"PNGDATA").await.expect("vector");

        mock.assert();
        assert_eq!(vector, vec![0.5, 0.25]);
    }

    #[tokio::test]
    async fn unsupported_media_is_a_rejection() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/vectorize");
                then.status(415).body("InvalidImageFormat");
            })
            .await;

        let client = VectorizeImageClient::new(Client::new(), &server.url("/vectorize"), None);
        let error = client.vectorize(b"not an image").await.unwrap_err();
        assert!(error.is_rejection());
    }

    #[tokio::test]
    async fn routes_texts_and_images_separately() {
        let server = MockServer::start_async().await;
        let image_mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/vectorize");
                then.status(200).json_body(json!({ "vector": [1.0] }));
            })
            .await;

        let client = ImageEndpointClient::new(
            Box::new(HashEmbeddingClient::new(4, 4)),
            VectorizeImageClient::new(Client::new(), &server.url("/vectorize"), None),
        );

        let texts = client.embed_texts(vec!["a".into()]).await.expect("texts");
        assert_eq!(texts[0].len(), 4);
        assert_eq!(image_mock.hits(), 0);

        let image = client.embed_image(b"img").await.expect("image");
        assert_eq!(image, vec![1.0]);
        image_mock.assert();
    }
}
