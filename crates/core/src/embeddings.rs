use crate::endpoint::join_segments;
use crate::error::{ConfigurationError, EmbeddingError};
use crate::retry::RetryPolicy;
use crate::traits::Embedder;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tracing::debug;
use url::Url;

pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 128;
pub const NGRAM_MODEL_PREFIX: &str = "ngram-hash";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmbeddingModel {
    NgramHash { dimensions: usize },
    Remote { name: String },
}

impl EmbeddingModel {
    pub fn parse(selector: &str) -> Result<Self, ConfigurationError> {
        let selector = selector.trim();
        if selector.is_empty() {
            return Err(ConfigurationError::Missing("embedding_model"));
        }

        let Some(rest) = selector.strip_prefix(NGRAM_MODEL_PREFIX) else {
            return Ok(EmbeddingModel::Remote {
                name: selector.to_string(),
            });
        };

        let dimensions = match rest {
            "" => DEFAULT_EMBEDDING_DIMENSIONS,
            _ => rest
                .strip_prefix(':')
                .and_then(|dims| dims.parse::<usize>().ok())
                .filter(|dims| *dims > 0)
                .ok_or_else(|| ConfigurationError::UnsupportedModel(selector.to_string()))?,
        };
        Ok(EmbeddingModel::NgramHash { dimensions })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CharacterNgramEmbedder {
    pub dimensions: usize,
}

impl Default for CharacterNgramEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }
}

impl CharacterNgramEmbedder {
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions.max(1)];
        let lowered = text.to_lowercase();
        let chars: Vec<char> = lowered.chars().collect();

        for window in chars.windows(3) {
            let mut hash = 1469598103934665603u64;
            for c in window {
                let mut buffer = [0u8; 4];
                for byte in c.encode_utf8(&mut buffer).bytes() {
                    hash ^= byte as u64;
                    hash = hash.wrapping_mul(1099511628211);
                }
            }
            let bucket = (hash % vector.len() as u64) as usize;
            vector[bucket] += 1.0;
        }

        let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }

        vector
    }
}

#[async_trait]
impl Embedder for CharacterNgramEmbedder {
    fn model(&self) -> &str {
        NGRAM_MODEL_PREFIX
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }
        Ok(self.embed_text(text))
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: [&'a str; 1],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

pub struct HttpEmbedder {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
    model: String,
    retry: RetryPolicy,
    dimensions: OnceLock<usize>,
}

impl HttpEmbedder {
    pub fn new(
        client: Client,
        base_url: Url,
        api_key: Option<String>,
        model: impl Into<String>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            client,
            base_url,
            api_key,
            model: model.into(),
            retry,
            dimensions: OnceLock::new(),
        }
    }

    async fn request(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let url = join_segments(&self.base_url, &["embeddings"])
            .map_err(|error| EmbeddingError::InvalidResponse(error.to_string()))?;

        let mut request = self.client.post(url).json(&EmbeddingRequest {
            model: &self.model,
            input: [text],
        });
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let details = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Backend {
                status: status.as_u16(),
                details,
            });
        }

        let parsed: EmbeddingResponse = response.json().await?;
        parsed
            .data
            .into_iter()
            .next()
            .map(|data| data.embedding)
            .filter(|embedding| !embedding.is_empty())
            .ok_or_else(|| EmbeddingError::InvalidResponse("no embedding returned".to_string()))
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    fn model(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }

        let vector = self.retry.run("embed", move || self.request(text)).await?;
        let expected = *self.dimensions.get_or_init(|| vector.len());
        if vector.len() != expected {
            return Err(EmbeddingError::DimensionMismatch {
                expected,
                actual: vector.len(),
            });
        }
        debug!(model = %self.model, dimensions = expected, "embedded text");
        Ok(vector)
    }
}
