use crate::endpoint::join_segments;
use crate::error::{SearchError, UpsertError};
use crate::models::{Point, ScoredPoint, CONTENT_PAYLOAD_KEY};
use crate::retry::RetryPolicy;
use crate::traits::VectorStore;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{debug, info};
use url::Url;
use uuid::Uuid;

const BACKEND: &str = "qdrant";

pub struct QdrantStore {
    endpoint: Url,
    api_key: Option<String>,
    client: Client,
    retry: RetryPolicy,
    dimensions: Mutex<HashMap<String, usize>>,
}

impl QdrantStore {
    pub fn new(client: Client, endpoint: Url, api_key: Option<String>, retry: RetryPolicy) -> Self {
        Self {
            endpoint,
            api_key,
            client,
            retry,
            dimensions: Mutex::new(HashMap::new()),
        }
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("api-key", key),
            None => request,
        }
    }

    fn collection_url(&self, name: &str, rest: &[&str]) -> Result<Url, url::ParseError> {
        let mut segments = vec!["collections", name];
        segments.extend_from_slice(rest);
        join_segments(&self.endpoint, &segments)
    }

    fn known_dimension(&self, name: &str) -> Option<usize> {
        self.dimensions
            .lock()
            .ok()
            .and_then(|dimensions| dimensions.get(name).copied())
    }

    fn remember_dimension(&self, name: &str, vector_dim: usize) {
        if let Ok(mut dimensions) = self.dimensions.lock() {
            dimensions.insert(name.to_string(), vector_dim);
        }
    }

    async fn delete_collection(&self, name: &str) -> Result<(), UpsertError> {
        let url = self.collection_url(name, &[])?;
        let response = self.authorized(self.client.delete(url)).send().await?;
        if response.status().is_success() || response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        Err(upsert_failure(response).await)
    }

    async fn create_collection(&self, name: &str, vector_dim: usize) -> Result<(), UpsertError> {
        let url = self.collection_url(name, &[])?;
        let body = json!({
            "vectors": {
                "size": vector_dim,
                "distance": "Cosine",
            }
        });
        let response = self.authorized(self.client.put(url)).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(upsert_failure(response).await);
        }
        Ok(())
    }

    async fn put_points(&self, name: &str, body: &Value) -> Result<(), UpsertError> {
        let mut url = self.collection_url(name, &["points"])?;
        url.query_pairs_mut().append_pair("wait", "true");

        let response = self.authorized(self.client.put(url)).json(body).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(UpsertError::MissingCollection(name.to_string()));
        }
        if !response.status().is_success() {
            return Err(upsert_failure(response).await);
        }
        Ok(())
    }

    async fn post_search(&self, name: &str, body: &Value) -> Result<Option<Value>, SearchError> {
        let url = self.collection_url(name, &["points", "search"])?;
        let response = self.authorized(self.client.post(url)).json(body).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status();
            return Err(SearchError::BackendResponse {
                backend: BACKEND.to_string(),
                status: Some(status.as_u16()),
                details: response.text().await.unwrap_or_else(|_| status.to_string()),
            });
        }
        Ok(Some(response.json().await?))
    }
}

async fn upsert_failure(response: Response) -> UpsertError {
    let status = response.status();
    UpsertError::BackendResponse {
        backend: BACKEND.to_string(),
        status: Some(status.as_u16()),
        details: response.text().await.unwrap_or_else(|_| status.to_string()),
    }
}

fn point_body(points: &[Point]) -> Value {
    let points = points
        .iter()
        .map(|point| {
            json!({
                "id": point.id.to_string(),
                "vector": point.vector,
                "payload": { CONTENT_PAYLOAD_KEY: point.content },
            })
        })
        .collect::<Vec<_>>();
    json!({ "points": points })
}

fn parse_point_id(value: &Value) -> Option<Uuid> {
    match value {
        Value::String(raw) => Uuid::parse_str(raw).ok(),
        Value::Number(number) => number.as_u64().map(|id| Uuid::from_u128(id as u128)),
        _ => None,
    }
}

fn parse_hits(parsed: &Value) -> Vec<ScoredPoint> {
    let hits = parsed
        .pointer("/result")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    hits.iter()
        .filter_map(|hit| {
            let id = hit.pointer("/id").and_then(parse_point_id)?;
            let score = hit.pointer("/score").and_then(Value::as_f64).unwrap_or(0.0) as f32;
            let content = hit
                .pointer(&format!("/payload/{CONTENT_PAYLOAD_KEY}"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            Some(ScoredPoint { id, score, content })
        })
        .collect()
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn ensure_collection(&self, name: &str, vector_dim: usize) -> Result<(), UpsertError> {
        if vector_dim == 0 {
            return Err(UpsertError::InvalidCollection(
                "vector dimension must be positive".to_string(),
            ));
        }

        self.retry
            .run("delete_collection", move || self.delete_collection(name))
            .await?;
        self.retry
            .run("create_collection", move || self.create_collection(name, vector_dim))
            .await?;
        self.remember_dimension(name, vector_dim);

        info!(collection = name, vector_dim, "collection recreated");
        Ok(())
    }

    async fn upsert_batch(&self, name: &str, points: &[Point]) -> Result<(), UpsertError> {
        if points.is_empty() {
            return Ok(());
        }

        if let Some(expected) = self.known_dimension(name) {
            if let Some(point) = points.iter().find(|point| point.vector.len() != expected) {
                return Err(UpsertError::DimensionMismatch {
                    expected,
                    actual: point.vector.len(),
                });
            }
        }

        let body = &point_body(points);
        self.retry
            .run("upsert_points", move || self.put_points(name, body))
            .await?;
        debug!(collection = name, points = points.len(), "batch acknowledged");
        Ok(())
    }

    async fn search(
        &self,
        name: &str,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredPoint>, SearchError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        if let Some(expected) = self.known_dimension(name) {
            if query_vector.len() != expected {
                return Err(SearchError::DimensionMismatch {
                    expected,
                    actual: query_vector.len(),
                });
            }
        }

        let body = &json!({
            "vector": query_vector,
            "limit": limit,
            "with_payload": true,
        });

        let parsed = self
            .retry
            .run("search_points", move || self.post_search(name, body))
            .await?;

        Ok(parsed.as_ref().map(parse_hits).unwrap_or_default())
    }
}
