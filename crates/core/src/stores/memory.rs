use crate::error::{SearchError, UpsertError};
use crate::models::{Point, ScoredPoint};
use crate::traits::VectorStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
struct Collection {
    dimension: usize,
    points: HashMap<Uuid, Point>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    collections: Arc<RwLock<HashMap<String, Collection>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn collection_names(&self) -> Vec<String> {
        let mut names = self.collections.read().await.keys().cloned().collect::<Vec<_>>();
        names.sort();
        names
    }

    pub async fn point(&self, name: &str, id: Uuid) -> Option<Point> {
        self.collections
            .read()
            .await
            .get(name)
            .and_then(|collection| collection.points.get(&id).cloned())
    }

    pub async fn point_count(&self, name: &str) -> usize {
        self.collections
            .read()
            .await
            .get(name)
            .map_or(0, |collection| collection.points.len())
    }

    fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        if a.len() != b.len() {
            return 0.0;
        }

        let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }

        dot / (norm_a * norm_b)
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn ensure_collection(&self, name: &str, vector_dim: usize) -> Result<(), UpsertError> {
        if vector_dim == 0 {
            return Err(UpsertError::InvalidCollection(
                "vector dimension must be positive".to_string(),
            ));
        }

        self.collections.write().await.insert(
            name.to_string(),
            Collection {
                dimension: vector_dim,
                points: HashMap::new(),
            },
        );
        debug!(collection = name, vector_dim, "memory collection recreated");
        Ok(())
    }

    async fn upsert_batch(&self, name: &str, points: &[Point]) -> Result<(), UpsertError> {
        let mut collections = self.collections.write().await;
        let collection = collections
            .get_mut(name)
            .ok_or_else(|| UpsertError::MissingCollection(name.to_string()))?;

        if let Some(point) = points
            .iter()
            .find(|point| point.vector.len() != collection.dimension)
        {
            return Err(UpsertError::DimensionMismatch {
                expected: collection.dimension,
                actual: point.vector.len(),
            });
        }

        for point in points {
            collection.points.insert(point.id, point.clone());
        }
        Ok(())
    }

    async fn search(
        &self,
        name: &str,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredPoint>, SearchError> {
        let collections = self.collections.read().await;
        let Some(collection) = collections.get(name) else {
            return Ok(Vec::new());
        };

        if query_vector.len() != collection.dimension {
            return Err(SearchError::DimensionMismatch {
                expected: collection.dimension,
                actual: query_vector.len(),
            });
        }

        let mut scored = collection
            .points
            .values()
            .map(|point| ScoredPoint {
                id: point.id,
                score: Self::cosine_similarity(query_vector, &point.vector),
                content: point.content.clone(),
            })
            .collect::<Vec<_>>();

        scored.sort_by(|left, right| {
            right
                .score
                .total_cmp(&left.score)
                .then_with(|| left.id.cmp(&right.id))
        });
        scored.truncate(limit);
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(id: u128, vector: Vec<f32>, content: &str) -> Point {
        Point {
            id: Uuid::from_u128(id),
            vector,
            content: content.to_string(),
        }
    }

    #[tokio::test]
    async fn empty_collection_search_is_empty() -> Result<(), Box<dyn std::error::Error>> {
        let store = MemoryStore::new();
        store.ensure_collection("doc", 3).await?;
        assert!(store.search("doc", &[1.0, 0.0, 0.0], 5).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn missing_collection_search_is_empty() -> Result<(), SearchError> {
        let store = MemoryStore::new();
        assert!(store.search("nothing", &[1.0], 5).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn upserted_points_are_all_found() -> Result<(), Box<dyn std::error::Error>> {
        let store = MemoryStore::new();
        store.ensure_collection("doc", 2).await?;
        store
            .upsert_batch(
                "doc",
                &[
                    point(1, vec![1.0, 0.0], "east"),
                    point(2, vec![0.0, 1.0], "north"),
                    point(3, vec![0.7, 0.7], "north-east"),
                ],
            )
            .await?;

        let hits = store.search("doc", &[1.0, 0.1], 10).await?;
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].content, "east");
        assert_eq!(hits[2].content, "north");

        let limited = store.search("doc", &[1.0, 0.1], 1).await?;
        assert_eq!(limited.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn ensure_collection_replaces_existing_points() -> Result<(), Box<dyn std::error::Error>> {
        let store = MemoryStore::new();
        store.ensure_collection("doc", 2).await?;
        store.upsert_batch("doc", &[point(1, vec![1.0, 0.0], "old")]).await?;

        store.ensure_collection("doc", 2).await?;
        assert_eq!(store.point_count("doc").await, 0);
        Ok(())
    }

    #[tokio::test]
    async fn wrong_dimension_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
        let store = MemoryStore::new();
        store.ensure_collection("doc", 2).await?;
        let result = store
            .upsert_batch("doc", &[point(1, vec![1.0, 0.0, 0.0], "too long")])
            .await;
        assert!(matches!(
            result,
            Err(UpsertError::DimensionMismatch {
                expected: 2,
                actual: 3
            })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn upsert_without_collection_fails() {
        let store = MemoryStore::new();
        let result = store.upsert_batch("doc", &[point(1, vec![1.0], "x")]).await;
        assert!(matches!(result, Err(UpsertError::MissingCollection(_))));
    }
}
