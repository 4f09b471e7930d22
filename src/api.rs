//! HTTP surface for the blob embed service.
//!
//! This module exposes a compact Axum router over [`EmbedService`]:
//!
//! - `POST /embed/pdf?name=…` – Extract a PDF sent as the raw body and index its sections.
//! - `POST /embed/image?name=…&url=…` – Vectorize an image sent as the raw body.
//! - `POST /embed/json?url=…` – Flatten JSON records sent as the raw body and index them.
//! - `GET /indexes` – List search indexes known to the backend.
//! - `POST /indexes` – Create an index; `409` when the name is taken.
//! - `PUT /indexes/{name}` – Ensure an index exists (idempotent).
//! - `GET /metrics` – Observe embed counters.
//!
//! Embed routes answer `{"embedded": bool}`; `false` means the backend rejected the blob or it
//! held nothing embeddable. Each request owns a cancellation token that fires when the client
//! goes away.

use crate::metrics::MetricsSnapshot;
use crate::qdrant::QdrantError;
use crate::service::{BlobContent, EmbedError, EmbedService};
use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Largest blob accepted on the embed routes.
pub const MAX_BLOB_BYTES: usize = 64 * 1024 * 1024;

/// Build the HTTP router exposing the embed API surface.
pub fn create_router<S>(service: Arc<S>) -> Router
where
    S: EmbedService + ?Sized + 'static,
{
    Router::new()
        .route("/embed/pdf", post(embed_pdf::<S>))
        .route("/embed/image", post(embed_image::<S>))
        .route("/embed/json", post(embed_json::<S>))
        .route("/indexes", get(list_indexes::<S>).post(create_index::<S>))
        .route("/indexes/:name", put(ensure_index::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .layer(DefaultBodyLimit::max(MAX_BLOB_BYTES))
        .with_state(service)
}

/// Query parameters accepted by the embed routes.
#[derive(Deserialize)]
struct EmbedQuery {
    /// Blob name; used as the PDF source file and the image label.
    #[serde(default)]
    name: String,
    /// Source URL of an image or JSON blob.
    #[serde(default)]
    url: String,
}

#[derive(Serialize)]
struct EmbedResponse {
    embedded: bool,
}

async fn embed_pdf<S>(
    State(service): State<Arc<S>>,
    Query(query): Query<EmbedQuery>,
    body: Bytes,
) -> Result<Json<EmbedResponse>, AppError>
where
    S: EmbedService + ?Sized,
{
    let bytes = body.len();
    let embedded = service
        .embed_pdf_blob(BlobContent::from(body.to_vec()), &query.name)
        .await?;
    tracing::info!(name = %query.name, bytes, embedded, "PDF embed request completed");
    Ok(Json(EmbedResponse { embedded }))
}

async fn embed_image<S>(
    State(service): State<Arc<S>>,
    Query(query): Query<EmbedQuery>,
    body: Bytes,
) -> Result<Json<EmbedResponse>, AppError>
where
    S: EmbedService + ?Sized,
{
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();
    let embedded = service
        .embed_image_blob(
            BlobContent::from(body.to_vec()),
            &query.url,
            &query.name,
            Some(&cancel),
        )
        .await?;
    tracing::info!(url = %query.url, embedded, "Image embed request completed");
    Ok(Json(EmbedResponse { embedded }))
}

async fn embed_json<S>(
    State(service): State<Arc<S>>,
    Query(query): Query<EmbedQuery>,
    body: Bytes,
) -> Result<Json<EmbedResponse>, AppError>
where
    S: EmbedService + ?Sized,
{
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();
    let embedded = service
        .embed_json_blob(BlobContent::from(body.to_vec()), &query.url, Some(&cancel))
        .await?;
    tracing::info!(url = %query.url, embedded, "JSON embed request completed");
    Ok(Json(EmbedResponse { embedded }))
}

/// Response body for `GET /indexes`.
#[derive(Serialize)]
struct IndexesResponse {
    indexes: Vec<String>,
}

async fn list_indexes<S>(State(service): State<Arc<S>>) -> Result<Json<IndexesResponse>, AppError>
where
    S: EmbedService + ?Sized,
{
    let indexes = service.list_search_indexes().await?;
    Ok(Json(IndexesResponse { indexes }))
}

/// Request body for `POST /indexes`.
#[derive(Deserialize)]
struct CreateIndexRequest {
    name: String,
}

async fn create_index<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<CreateIndexRequest>,
) -> Result<StatusCode, AppError>
where
    S: EmbedService + ?Sized,
{
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();
    service
        .create_search_index(&request.name, Some(&cancel))
        .await?;
    Ok(StatusCode::CREATED)
}

async fn ensure_index<S>(
    State(service): State<Arc<S>>,
    Path(name): Path<String>,
) -> Result<StatusCode, AppError>
where
    S: EmbedService + ?Sized,
{
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();
    service.ensure_search_index(&name, Some(&cancel)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_metrics<S>(State(service): State<Arc<S>>) -> Json<MetricsSnapshot>
where
    S: EmbedService + ?Sized,
{
    Json(service.metrics_snapshot())
}

struct AppError(EmbedError);

impl AppError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            EmbedError::InvalidInput(_) | EmbedError::Extraction(_) => StatusCode::BAD_REQUEST,
            EmbedError::Cancelled => StatusCode::REQUEST_TIMEOUT,
            EmbedError::Index(QdrantError::IndexNotFound(_)) => StatusCode::NOT_FOUND,
            EmbedError::Index(QdrantError::IndexAlreadyExists(_)) => StatusCode::CONFLICT,
            EmbedError::Index(QdrantError::InvalidIndexName(_)) => StatusCode::BAD_REQUEST,
            _ => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        } else {
            tracing::debug!(error = %self.0, %status, "Request refused");
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

impl From<EmbedError> for AppError {
    fn from(inner: EmbedError) -> Self {
        Self(inner)
    }
}

#[cfg(test)]
mod tests {
    use super::create_router;
    use crate::metrics::MetricsSnapshot;
    use crate::qdrant::QdrantError;
    use crate::service::{BlobContent, EmbedError, EmbedService};
    use async_trait::async_trait;
    use axum::{
        body::{Body, to_bytes},
        http::{Method, Request, StatusCode},
        response::Response,
    };
    use serde_json::{Value, json};
    use std::sync::Arc;
    use tokio::sync::Mutex;
    use tokio_util::sync::CancellationToken;
    use tower::ServiceExt;

    #[derive(Debug, Clone, PartialEq)]
    struct EmbedCall {
        kind: &'static str,
        bytes: Vec<u8>,
        name: String,
        url: String,
        cancellable: bool,
    }

    #[derive(Default)]
    struct StubEmbedService {
        calls: Mutex<Vec<EmbedCall>>,
        indexes: Mutex<Vec<String>>,
        reject: bool,
    }

    impl StubEmbedService {
        async fn record(&self, call: EmbedCall) -> Result<bool, EmbedError> {
            self.calls.lock().await.push(call);
            Ok(!self.reject)
        }
    }

    #[async_trait]
    impl EmbedService for StubEmbedService {
        async fn embed_pdf_blob(
            &self,
            content: BlobContent,
            name: &str,
        ) -> Result<bool, EmbedError> {
            self.record(EmbedCall {
                kind: "pdf",
                bytes: content.into_bytes(),
                name: name.to_string(),
                url: String::new(),
                cancellable: false,
            })
            .await
        }

        async fn embed_image_blob(
            &self,
            content: BlobContent,
            source_url: &str,
            name: &str,
            cancel: Option<&CancellationToken>,
        ) -> Result<bool, EmbedError> {
            if source_url.is_empty() {
                return Err(EmbedError::InvalidInput("source_url must not be empty".into()));
            }
            self.record(EmbedCall {
                kind: "image",
                bytes: content.into_bytes(),
                name: name.to_string(),
                url: source_url.to_string(),
                cancellable: cancel.is_some_and(|token| !token.is_cancelled()),
            })
            .await
        }

        async fn embed_json_blob(
            &self,
            content: BlobContent,
            source_url: &str,
            cancel: Option<&CancellationToken>,
        ) -> Result<bool, EmbedError> {
            if source_url == "missing" {
                return Err(QdrantError::IndexNotFound("docs".into()).into());
            }
            self.record(EmbedCall {
                kind: "json",
                bytes: content.into_bytes(),
                name: String::new(),
                url: source_url.to_string(),
                cancellable: cancel.is_some(),
            })
            .await
        }

        async fn create_search_index(
            &self,
            name: &str,
            _cancel: Option<&CancellationToken>,
        ) -> Result<(), EmbedError> {
            let mut indexes = self.indexes.lock().await;
            if indexes.iter().any(|existing| existing == name) {
                return Err(QdrantError::IndexAlreadyExists(name.to_string()).into());
            }
            indexes.push(name.to_string());
            Ok(())
        }

        async fn ensure_search_index(
            &self,
            name: &str,
            cancel: Option<&CancellationToken>,
        ) -> Result<(), EmbedError> {
            if cancel.is_some_and(CancellationToken::is_cancelled) {
                return Err(EmbedError::Cancelled);
            }
            let mut indexes = self.indexes.lock().await;
            if !indexes.iter().any(|existing| existing == name) {
                indexes.push(name.to_string());
            }
            Ok(())
        }

        async fn list_search_indexes(&self) -> Result<Vec<String>, EmbedError> {
            Ok(self.indexes.lock().await.clone())
        }

        fn default_index(&self) -> &str {
            "docs"
        }

        fn metrics_snapshot(&self) -> MetricsSnapshot {
            MetricsSnapshot {
                pdf_blobs_embedded: 3,
                ..MetricsSnapshot::default()
            }
        }
    }

    async fn send(
        service: Arc<StubEmbedService>,
        method: Method,
        uri: &str,
        body: Body,
    ) -> Response {
        create_router(service)
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(body)
                    .expect("request"),
            )
            .await
            .expect("router response")
    }

    async fn json_body(response: Response) -> Value {
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        serde_json::from_slice(&body).expect("json body")
    }

    #[tokio::test]
    async fn pdf_route_forwards_raw_body_and_name() {
        let service = Arc::new(StubEmbedService::default());
        let response = send(
            service.clone(),
            Method::POST,
            "/embed/pdf?name=benefits.pdf",
            Body::from(&b"%PDF-1.7"[..]),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!({ "embedded": true }));
        let calls = service.calls.lock().await.clone();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].kind, "pdf");
        assert_eq!(calls[0].name, "benefits.pdf");
        assert_eq!(calls[0].bytes, b"%PDF-1.7");
    }

    #[tokio::test]
    async fn image_route_passes_live_cancellation_token() {
        let service = Arc::new(StubEmbedService::default());
        let response = send(
            service.clone(),
            Method::POST,
            "/embed/image?name=x.png&url=http%3A%2F%2Fexample.com%2Fx.png",
            Body::from(vec![1_u8, 2, 3]),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let calls = service.calls.lock().await.clone();
        assert_eq!(calls[0].url, "http://example.com/x.png");
        assert_eq!(calls[0].name, "x.png");
        assert!(calls[0].cancellable);
    }

    #[tokio::test]
    async fn rejected_blob_reports_false() {
        let service = Arc::new(StubEmbedService {
            reject: true,
            ..StubEmbedService::default()
        });
        let response = send(
            service,
            Method::POST,
            "/embed/json?url=https%3A%2F%2Fexample.com%2Fplans.json",
            Body::from(r#"{"plan": "Gold"}"#),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!({ "embedded": false }));
    }

    #[tokio::test]
    async fn errors_map_to_status_codes() {
        let service = Arc::new(StubEmbedService::default());

        let invalid = send(service.clone(), Method::POST, "/embed/image", Body::empty()).await;
        assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);
        assert!(
            json_body(invalid).await["error"]
                .as_str()
                .is_some_and(|message| message.contains("source_url"))
        );

        let missing = send(
            service.clone(),
            Method::POST,
            "/embed/json?url=missing",
            Body::from("{}"),
        )
        .await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn index_routes_create_ensure_and_list() {
        let service = Arc::new(StubEmbedService::default());
        let create = || {
            send(
                service.clone(),
                Method::POST,
                "/indexes",
                Body::from(json!({ "name": "docs-index" }).to_string()),
            )
        };

        assert_eq!(create().await.status(), StatusCode::CREATED);
        assert_eq!(create().await.status(), StatusCode::CONFLICT);

        let ensure = send(service.clone(), Method::PUT, "/indexes/other", Body::empty()).await;
        assert_eq!(ensure.status(), StatusCode::NO_CONTENT);
        let again = send(service.clone(), Method::PUT, "/indexes/other", Body::empty()).await;
        assert_eq!(again.status(), StatusCode::NO_CONTENT);

        let list = send(service.clone(), Method::GET, "/indexes", Body::empty()).await;
        assert_eq!(
            json_body(list).await,
            json!({ "indexes": ["docs-index", "other"] })
        );
    }

    #[tokio::test]
    async fn metrics_route_serializes_snapshot() {
        let service = Arc::new(StubEmbedService::default());
        let response = send(service, Method::GET, "/metrics", Body::empty()).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["pdf_blobs_embedded"], 3);
        assert_eq!(body["blobs_rejected"], 0);
    }
}
