//! Nearest-neighbour search over the precedent collection via Qdrant's REST API.
//!
//! Points are expected in the layout used by the indexing pipeline: the
//! passage text under `page_content` and a free-form `metadata` object.

use std::time::Duration;

use async_trait::async_trait;
use lexcase_core::Document;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{RagError, check_status};

pub const DEFAULT_COLLECTION: &str = "legal_precedents";

const CONTENT_KEY: &str = "page_content";
const METADATA_KEY: &str = "metadata";

/// A retrieved document with its similarity score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredDocument {
    pub document: Document,
    pub score: f32,
}

#[async_trait]
pub trait VectorSearch: Send + Sync {
    /// The `limit` nearest documents to `vector`, best first.
    async fn search(&self, vector: &[f32], limit: usize) -> Result<Vec<ScoredDocument>, RagError>;
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    vector: &'a [f32],
    limit: usize,
    with_payload: bool,
}

#[derive(Deserialize)]
struct SearchResponse {
    result: Vec<ScoredPoint>,
}

#[derive(Deserialize)]
struct ScoredPoint {
    score: f32,
    #[serde(default)]
    payload: Option<Map<String, Value>>,
}

impl From<ScoredPoint> for ScoredDocument {
    fn from(point: ScoredPoint) -> Self {
        let mut payload = point.payload.unwrap_or_default();
        let page_content = match payload.remove(CONTENT_KEY) {
            Some(Value::String(s)) => s,
            Some(other) => other.to_string(),
            None => String::new(),
        };
        let metadata = match payload.remove(METADATA_KEY) {
            Some(Value::Object(m)) => m,
            _ => Map::new(),
        };
        Self {
            document: Document {
                page_content,
                metadata,
            },
            score: point.score,
        }
    }
}

pub struct QdrantStore {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    collection: String,
}

impl QdrantStore {
    /// `base_url` should be like `https://xyz.cloud.qdrant.io:6333` (no trailing slash).
    pub fn new(
        base_url: String,
        api_key: Option<String>,
        collection: String,
    ) -> Result<Self, RagError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            collection,
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }
}

#[async_trait]
impl VectorSearch for QdrantStore {
    async fn search(&self, vector: &[f32], limit: usize) -> Result<Vec<ScoredDocument>, RagError> {
        let url = format!(
            "{}/collections/{}/points/search",
            self.base_url, self.collection
        );
        let body = SearchRequest {
            vector,
            limit,
            with_payload: true,
        };

        debug!(url = %url, limit, "searching precedents");
        let mut req = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            req = req.header("api-key", key);
        }
        let resp = check_status("qdrant", req.send().await?).await?;

        let parsed: SearchResponse = resp.json().await?;
        debug!(hits = parsed.result.len(), "search complete");
        Ok(parsed.result.into_iter().map(ScoredDocument::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Path;
    use axum::http::HeaderMap;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::json;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
        format!("http://{addr}")
    }

    #[test]
    fn point_payload_maps_to_document() {
        let point: ScoredPoint = serde_json::from_value(json!({
            "id": 7,
            "score": 0.83,
            "payload": {
                "page_content": "Novation requires the consent of all parties.",
                "metadata": {"case": "Scarf v Jardine", "year": 1882}
            }
        }))
        .unwrap();
        let doc = ScoredDocument::from(point);
        assert_eq!(doc.document.page_content, "Novation requires the consent of all parties.");
        assert_eq!(doc.document.metadata["year"], 1882);
        assert!((doc.score - 0.83).abs() < 1e-6);
    }

    #[test]
    fn missing_payload_yields_empty_document() {
        let point: ScoredPoint = serde_json::from_value(json!({"id": 1, "score": 0.1})).unwrap();
        let doc = ScoredDocument::from(point);
        assert!(doc.document.page_content.is_empty());
        assert!(doc.document.metadata.is_empty());
    }

    #[tokio::test]
    async fn search_posts_vector_and_api_key() {
        let router = Router::new().route(
            "/collections/{collection}/points/search",
            post(
                |Path(collection): Path<String>, headers: HeaderMap, Json(body): Json<Value>| async move {
                    assert_eq!(collection, "legal_precedents");
                    assert_eq!(headers["api-key"], "secret");
                    assert_eq!(body["limit"], 20);
                    assert_eq!(body["with_payload"], true);
                    assert_eq!(body["vector"].as_array().unwrap().len(), 3);
                    Json(json!({
                        "status": "ok",
                        "time": 0.001,
                        "result": [
                            {"id": 1, "score": 0.9, "payload": {"page_content": "first", "metadata": {}}},
                            {"id": 2, "score": 0.7, "payload": {"page_content": "second"}}
                        ]
                    }))
                },
            ),
        );
        let base = serve(router).await;

        let store = QdrantStore::new(
            format!("{base}/"),
            Some("secret".into()),
            DEFAULT_COLLECTION.into(),
        )
        .unwrap();
        let hits = store.search(&[0.1, 0.2, 0.3], 20).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].document.page_content, "first");
        assert_eq!(hits[1].document.page_content, "second");
    }

    #[tokio::test]
    async fn missing_collection_is_server_error() {
        let router = Router::new().route(
            "/collections/{collection}/points/search",
            post(|| async { (axum::http::StatusCode::NOT_FOUND, "Collection not found") }),
        );
        let base = serve(router).await;

        let store = QdrantStore::new(base, None, "missing".into()).unwrap();
        let err = store.search(&[0.0], 5).await.unwrap_err();
        assert!(matches!(err, RagError::Server { status: 404, .. }));
    }
}
