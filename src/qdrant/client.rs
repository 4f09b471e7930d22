//! HTTP client wrapper for Qdrant-backed search indexes.

use crate::qdrant::{
    payload::build_payload,
    payload::{DocumentFields, current_timestamp_rfc3339},
    types::{
        IMAGE_VECTOR, IndexPoint, IndexSchema, ListCollectionsResponse, MAX_UPSERT_BATCH,
        QdrantError, TEXT_VECTOR, UpsertSummary,
    },
};
use reqwest::{Client, Method, StatusCode};
use serde_json::{Value, json};

const PAYLOAD_INDEX_FIELDS: [&str; 2] = ["category", "sourcefile"];

/// Lightweight HTTP client for search index operations.
pub struct QdrantService {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) api_key: Option<String>,
}

impl QdrantService {
    /// Construct a new client for the Qdrant instance at `url`.
    pub fn new(url: &str, api_key: Option<String>) -> Result<Self, QdrantError> {
        let client = Client::builder().user_agent("blob-embed/0.1").build()?;
        let base_url = normalize_base_url(url).map_err(QdrantError::InvalidUrl)?;
        tracing::debug!(
            url = %base_url,
            has_api_key = api_key.as_deref().map(|value| !value.is_empty()).unwrap_or(false),
            "Initialized Qdrant HTTP client"
        );

        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    /// Retrieve the names of all indexes present in Qdrant.
    pub async fn list_indexes(&self) -> Result<Vec<String>, QdrantError> {
        let response = self.request(Method::GET, "collections").send().await?;

        if response.status().is_success() {
            let payload: ListCollectionsResponse = response.json().await?;
            Ok(payload
                .result
                .collections
                .into_iter()
                .map(|collection| collection.name)
                .collect())
        } else {
            let error = unexpected_status(response).await;
            tracing::error!(error = %error, "Failed to list indexes");
            Err(error)
        }
    }

    /// Report whether an index with the given name exists.
    pub async fn index_exists(&self, name: &str) -> Result<bool, QdrantError> {
        validate_index_name(name)?;
        let response = self
            .request(Method::GET, &format!("collections/{name}"))
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => {
                let error = unexpected_status(response).await;
                tracing::error!(index = name, error = %error, "Index existence check failed");
                Err(error)
            }
        }
    }

    /// Create a new index; fails with [`QdrantError::IndexAlreadyExists`] when the name is taken.
    pub async fn create_index(&self, name: &str, schema: IndexSchema) -> Result<(), QdrantError> {
        if self.index_exists(name).await? {
            return Err(QdrantError::IndexAlreadyExists(name.to_string()));
        }

        let body = json!({
            "vectors": {
                TEXT_VECTOR: { "size": schema.text_dimension, "distance": "Cosine" },
                IMAGE_VECTOR: { "size": schema.image_dimension, "distance": "Cosine" },
            }
        });

        let response = self
            .request(Method::PUT, &format!("collections/{name}"))
            .json(&body)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::CONFLICT => return Err(QdrantError::IndexAlreadyExists(name.to_string())),
            _ => {
                let error = unexpected_status(response).await;
                tracing::error!(index = name, error = %error, "Index creation failed");
                return Err(error);
            }
        }

        self.ensure_payload_indexes(name).await;
        tracing::info!(
            index = name,
            text_dimension = schema.text_dimension,
            image_dimension = schema.image_dimension,
            "Search index created"
        );
        Ok(())
    }

    /// Create the index when it is missing. Returns `true` when this call created it.
    pub async fn ensure_index(&self, name: &str, schema: IndexSchema) -> Result<bool, QdrantError> {
        if self.index_exists(name).await? {
            tracing::debug!(index = name, "Search index already present");
            return Ok(false);
        }

        match self.create_index(name, schema).await {
            Ok(()) => Ok(true),
            // Lost a race with a concurrent creator.
            Err(QdrantError::IndexAlreadyExists(_)) => Ok(false),
            Err(error) => Err(error),
        }
    }

    /// Write points into an index, splitting them into bounded batches.
    pub async fn upsert_points(
        &self,
        name: &str,
        points: Vec<IndexPoint>,
    ) -> Result<UpsertSummary, QdrantError> {
        validate_index_name(name)?;
        let mut summary = UpsertSummary::default();

        for batch in points.chunks(MAX_UPSERT_BATCH) {
            let serialized: Vec<Value> = batch
                .iter()
                .map(|point| {
                    json!({
                        "id": point.id,
                        "vector": { point.vector_name: point.vector },
                        "payload": point.payload,
                    })
                })
                .collect();

            let response = self
                .request(Method::PUT, &format!("collections/{name}/points"))
                .query(&[("wait", true)])
                .json(&json!({ "points": serialized }))
                .send()
                .await?;

            if !response.status().is_success() {
                let error = write_failure(name, response).await;
                tracing::error!(index = name, error = %error, "Point upsert failed");
                return Err(error);
            }

            summary.upserted += batch.len();
            summary.batches += 1;
            tracing::debug!(index = name, points = batch.len(), "Points upserted");
        }

        Ok(summary)
    }

    /// Delete the points of one source and category whose ids are not in `keep_ids`.
    pub async fn delete_stale_points(
        &self,
        name: &str,
        source_file: &str,
        category: &str,
        keep_ids: &[String],
    ) -> Result<(), QdrantError> {
        validate_index_name(name)?;
        let mut filter = json!({
            "must": [
                { "key": "sourcefile", "match": { "value": source_file } },
                { "key": "category", "match": { "value": category } },
            ]
        });
        if !keep_ids.is_empty() {
            filter["must_not"] = json!([{ "has_id": keep_ids }]);
        }

        let response = self
            .request(Method::POST, &format!("collections/{name}/points/delete"))
            .query(&[("wait", true)])
            .json(&json!({ "filter": filter }))
            .send()
            .await?;

        if !response.status().is_success() {
            let error = write_failure(name, response).await;
            tracing::error!(index = name, source_file, error = %error, "Stale point delete failed");
            return Err(error);
        }
        tracing::debug!(index = name, source_file, kept = keep_ids.len(), "Stale points removed");
        Ok(())
    }

    /// Turn searchable fields and a vector into a point addressed by the section identity.
    pub fn prepare_point(
        fields: &DocumentFields,
        vector_name: &'static str,
        vector: Vec<f32>,
    ) -> IndexPoint {
        IndexPoint {
            id: crate::qdrant::payload::point_id_for(&fields.identity),
            vector_name,
            vector,
            payload: build_payload(fields, &current_timestamp_rfc3339()),
        }
    }

    async fn ensure_payload_indexes(&self, name: &str) {
        for field in PAYLOAD_INDEX_FIELDS {
            let body = json!({
                "field_name": field,
                "field_schema": "keyword",
            });

            let result = self
                .request(Method::PUT, &format!("collections/{name}/index"))
                .json(&body)
                .send()
                .await;

            match result {
                Ok(response) if response.status().is_success() => {
                    tracing::debug!(index = name, field, "Payload index ensured");
                }
                Ok(response) if response.status() == StatusCode::CONFLICT => {
                    tracing::debug!(index = name, field, "Payload index already exists");
                }
                Ok(response) => {
                    let error = unexpected_status(response).await;
                    tracing::warn!(
                        index = name,
                        field,
                        error = %error,
                        "Failed to ensure payload index"
                    );
                }
                Err(error) => {
                    tracing::warn!(
                        index = name,
                        field,
                        error = %error,
                        "Failed to ensure payload index"
                    );
                }
            }
        }
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format_endpoint(&self.base_url, path);
        let mut req = self.client.request(method, url);
        if let Some(api_key) = &self.api_key
            && !api_key.is_empty()
        {
            req = req.header("api-key", api_key);
        }
        req
    }
}

/// Check that an index name is non-empty and limited to ASCII letters, digits, `-`, and `_`.
pub fn validate_index_name(name: &str) -> Result<(), QdrantError> {
    let valid = !name.is_empty()
        && name.len() <= 255
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(QdrantError::InvalidIndexName(name.to_string()))
    }
}

/// Classify a failed point write: missing index, rejected input, or backend failure.
async fn write_failure(name: &str, response: reqwest::Response) -> QdrantError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    match status {
        StatusCode::NOT_FOUND => QdrantError::IndexNotFound(name.to_string()),
        status if status.is_client_error() => QdrantError::Rejected { status, body },
        status => QdrantError::UnexpectedStatus { status, body },
    }
}

async fn unexpected_status(response: reqwest::Response) -> QdrantError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    QdrantError::UnexpectedStatus { status, body }
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = reqwest::Url::parse(url).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}

fn format_endpoint(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{
        Method::{GET, POST, PUT},
        MockServer,
    };

    fn service_for(server: &MockServer) -> QdrantService {
        QdrantService {
            client: Client::builder()
                .user_agent("blob-embed-test")
                .build()
                .expect("client"),
            base_url: server.base_url(),
            api_key: Some("qdrant-key".into()),
        }
    }

    const SCHEMA: IndexSchema = IndexSchema {
        text_dimension: 4,
        image_dimension: 2,
    };

    #[test]
    fn index_names_are_validated() {
        assert!(validate_index_name("docs-index_2").is_ok());
        assert!(validate_index_name("").is_err());
        assert!(validate_index_name("docs/index").is_err());
        assert!(validate_index_name("docs index").is_err());
    }

    #[test]
    fn base_url_loses_trailing_slash() {
        let normalized = normalize_base_url("http://localhost:6333/").expect("url");
        assert_eq!(
            format_endpoint(&normalized, "/collections"),
            "http://localhost:6333/collections"
        );
        assert!(normalize_base_url("not a url").is_err());
    }

    #[tokio::test]
    async fn list_indexes_returns_names() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/collections")
                    .header("api-key", "qdrant-key");
                then.status(200).json_body(json!({
                    "status": "ok",
                    "time": 0.0,
                    "result": { "collections": [{ "name": "docs" }, { "name": "images" }] }
                }));
            })
            .await;

        let names = service_for(&server).list_indexes().await.expect("list");
        assert_eq!(names, vec!["docs".to_string(), "images".to_string()]);
    }

    #[tokio::test]
    async fn create_index_sends_named_vectors() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/collections/docs");
                then.status(404).json_body(json!({ "status": { "error": "Not found" } }));
            })
            .await;
        let create = server
            .mock_async(|when, then| {
                when.method(PUT).path("/collections/docs").json_body(json!({
                    "vectors": {
                        "embedding": { "size": 4, "distance": "Cosine" },
                        "image_embedding": { "size": 2, "distance": "Cosine" }
                    }
                }));
                then.status(200).json_body(json!({ "result": true, "status": "ok" }));
            })
            .await;
        let payload_index = server
            .mock_async(|when, then| {
                when.method(PUT).path("/collections/docs/index");
                then.status(200).json_body(json!({ "status": "ok" }));
            })
            .await;

        service_for(&server)
            .create_index("docs", SCHEMA)
            .await
            .expect("create");

        create.assert();
        assert_eq!(payload_index.hits(), PAYLOAD_INDEX_FIELDS.len());
    }

    #[tokio::test]
    async fn create_index_refuses_existing_name() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/collections/docs");
                then.status(200).json_body(json!({ "result": {}, "status": "ok" }));
            })
            .await;
        let create = server
            .mock_async(|when, then| {
                when.method(PUT).path("/collections/docs");
                then.status(200);
            })
            .await;

        let error = service_for(&server)
            .create_index("docs", SCHEMA)
            .await
            .unwrap_err();

        assert!(matches!(error, QdrantError::IndexAlreadyExists(name) if name == "docs"));
        assert_eq!(create.hits(), 0);
    }

    #[tokio::test]
    async fn conflict_on_create_maps_to_already_exists() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/collections/docs");
                then.status(404);
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(PUT).path("/collections/docs");
                then.status(409).body("Collection `docs` already exists!");
            })
            .await;

        let service = service_for(&server);
        let error = service.create_index("docs", SCHEMA).await.unwrap_err();
        assert!(matches!(error, QdrantError::IndexAlreadyExists(_)));

        let created = service.ensure_index("docs", SCHEMA).await.expect("ensure");
        assert!(!created);
    }

    #[tokio::test]
    async fn ensure_index_skips_existing() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/collections/docs");
                then.status(200).json_body(json!({ "result": {}, "status": "ok" }));
            })
            .await;
        let create = server
            .mock_async(|when, then| {
                when.method(PUT).path("/collections/docs");
                then.status(200);
            })
            .await;

        let created = service_for(&server)
            .ensure_index("docs", SCHEMA)
            .await
            .expect("ensure");

        assert!(!created);
        assert_eq!(create.hits(), 0);
    }

    #[tokio::test]
    async fn upsert_splits_batches_and_maps_errors() {
        let server = MockServer::start_async().await;
        let upsert = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/collections/docs/points")
                    .query_param("wait", "true");
                then.status(200).json_body(json!({
                    "result": { "operation_id": 1, "status": "completed" },
                    "status": "ok"
                }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(PUT).path("/collections/missing/points");
                then.status(404).body("Not found: Collection `missing` doesn't exist!");
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(PUT).path("/collections/narrow/points");
                then.status(400).body("Wrong input: Vector dimension error");
            })
            .await;

        let fields = DocumentFields {
            key: "k".into(),
            identity: "k".into(),
            content: "c".into(),
            category: "pdf".into(),
            source_page: "p".into(),
            source_file: "f".into(),
        };
        let points: Vec<IndexPoint> = (0..MAX_UPSERT_BATCH + 1)
            .map(|_| QdrantService::prepare_point(&fields, TEXT_VECTOR, vec![0.0; 4]))
            .collect();

        let service = service_for(&server);
        let summary = service
            .upsert_points("docs", points.clone())
            .await
            .expect("upsert");
        assert_eq!(
            summary,
            UpsertSummary {
                upserted: MAX_UPSERT_BATCH + 1,
                batches: 2
            }
        );
        assert_eq!(upsert.hits(), 2);

        let missing = service
            .upsert_points("missing", points[..1].to_vec())
            .await
            .unwrap_err();
        assert!(matches!(missing, QdrantError::IndexNotFound(_)));

        let rejected = service
            .upsert_points("narrow", points[..1].to_vec())
            .await
            .unwrap_err();
        assert!(matches!(rejected, QdrantError::Rejected { status, .. } if status == StatusCode::BAD_REQUEST));
    }

    #[tokio::test]
    async fn delete_stale_points_filters_by_source_and_keeps_new_ids() {
        let server = MockServer::start_async().await;
        let delete = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/collections/docs/points/delete")
                    .query_param("wait", "true")
                    .json_body(json!({
                        "filter": {
                            "must": [
                                { "key": "sourcefile", "match": { "value": "guide.pdf" } },
                                { "key": "category", "match": { "value": "pdf" } }
                            ],
                            "must_not": [{ "has_id": ["id-1", "id-2"] }]
                        }
                    }));
                then.status(200).json_body(json!({ "status": "ok" }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/collections/missing/points/delete");
                then.status(404);
            })
            .await;

        let service = service_for(&server);
        service
            .delete_stale_points("docs", "guide.pdf", "pdf", &["id-1".into(), "id-2".into()])
            .await
            .expect("delete");
        delete.assert_async().await;

        let missing = service
            .delete_stale_points("missing", "guide.pdf", "pdf", &[])
            .await
            .unwrap_err();
        assert!(matches!(missing, QdrantError::IndexNotFound(_)));
    }

    #[test]
    fn point_ids_follow_identity_not_key() {
        let fields = |identity: &str| DocumentFields {
            key: "a_b_pdf-1-0".into(),
            identity: identity.into(),
            content: "c".into(),
            category: "pdf".into(),
            source_page: "p".into(),
            source_file: "f".into(),
        };
        let spaced = fields("pdf\u{0}a b.pdf\u{0}1\u{0}0");
        let underscored = fields("pdf\u{0}a_b.pdf\u{0}1\u{0}0");
        let spaced = QdrantService::prepare_point(&spaced, TEXT_VECTOR, vec![]);
        let underscored = QdrantService::prepare_point(&underscored, TEXT_VECTOR, vec![]);
        assert_ne!(spaced.id, underscored.id);
        assert_eq!(spaced.payload["id"], underscored.payload["id"]);
    }
}
