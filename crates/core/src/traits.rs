use crate::error::{EmbeddingError, GenerationError, SearchError, UpsertError};
use crate::models::{Point, ScoredPoint};
use async_trait::async_trait;

#[async_trait]
pub trait Embedder: Send + Sync {
    fn model(&self) -> &str;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    // drops any existing collection of that name first
    async fn ensure_collection(&self, name: &str, vector_dim: usize) -> Result<(), UpsertError>;

    async fn upsert_batch(&self, name: &str, points: &[Point]) -> Result<(), UpsertError>;

    async fn search(
        &self,
        name: &str,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredPoint>, SearchError>;
}

#[async_trait]
pub trait CompletionModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, GenerationError>;
}
