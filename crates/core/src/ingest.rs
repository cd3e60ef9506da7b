use crate::chunking::{chunk_sentences, ChunkingConfig};
use crate::dedup::{identify_chunks, IdPolicy};
use crate::error::{EmbeddingError, ExtractionError, RagError};
use crate::extractor::TextExtractor;
use crate::jobs::{JobRegistry, JobTicket};
use crate::models::{JobState, Point, UploadedDocument};
use crate::sentences::SentenceSplitter;
use crate::traits::{Embedder, VectorStore};
use std::sync::Arc;
use tracing::{error, info};

pub const BATCH_SIZE: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct IngestionOptions {
    pub chunking: ChunkingConfig,
    pub batch_size: usize,
    pub language: String,
    pub id_policy: IdPolicy,
}

impl Default for IngestionOptions {
    fn default() -> Self {
        Self {
            chunking: ChunkingConfig::default(),
            batch_size: BATCH_SIZE,
            language: "en".to_string(),
            id_policy: IdPolicy::default(),
        }
    }
}

impl IngestionOptions {
    pub fn validate(&self) -> Result<(), RagError> {
        self.chunking.validate()?;
        if self.batch_size == 0 {
            return Err(RagError::InvalidArgument(
                "upsert batch size must be at least 1".to_string(),
            ));
        }
        SentenceSplitter::for_language(&self.language)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestionSummary {
    pub chunks: usize,
    pub batches: usize,
    pub vector_dim: usize,
}

pub struct IngestionPipeline<'a> {
    pub extractor: Arc<dyn TextExtractor>,
    pub embedder: &'a dyn Embedder,
    pub store: &'a dyn VectorStore,
    pub options: &'a IngestionOptions,
    pub registry: &'a JobRegistry,
}

fn log_stage_failure(stage: &str, collection: &str, err: &dyn std::fmt::Display) {
    error!(stage, collection, error = %err, "ingestion stage failed");
}

impl IngestionPipeline<'_> {
    fn enter(&self, ticket: &JobTicket, state: JobState) -> Result<(), RagError> {
        if ticket.is_cancelled() {
            return Err(RagError::Cancelled(ticket.collection.clone()));
        }
        self.registry.transition(ticket, state);
        Ok(())
    }

    pub async fn run(
        &self,
        document: &UploadedDocument,
        ticket: &JobTicket,
    ) -> Result<IngestionSummary, RagError> {
        let collection = document.collection.as_str();
        info!(path = %document.path.display(), collection, job_id = %ticket.job_id, "processing pdf");

        self.enter(ticket, JobState::Extracting)?;
        let extractor = self.extractor.clone();
        let path = document.path.clone();
        let text = tokio::task::spawn_blocking(move || extractor.extract_text(&path))
            .await
            .map_err(|join| ExtractionError::Join(join.to_string()))
            .and_then(|extracted| extracted)
            .inspect_err(|err| log_stage_failure("extract", collection, err))?;

        self.enter(ticket, JobState::Splitting)?;
        let splitter = SentenceSplitter::for_language(&self.options.language)
            .inspect_err(|err| log_stage_failure("split", collection, err))?;
        let sentences = splitter.split(&text);

        self.enter(ticket, JobState::Chunking)?;
        let texts = chunk_sentences(&sentences, self.options.chunking);
        if texts.is_empty() {
            let err = RagError::EmptyDocument {
                collection: collection.to_string(),
            };
            log_stage_failure("chunk", collection, &err);
            return Err(err);
        }
        let chunks = identify_chunks(texts, collection, self.options.id_policy);
        self.registry.record_chunks(ticket, chunks.len());
        info!(
            collection,
            language = splitter.language(),
            sentences = sentences.len(),
            chunks = chunks.len(),
            "document chunked"
        );

        self.enter(ticket, JobState::Embedding)?;
        let mut points: Vec<Point> = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            if ticket.is_cancelled() {
                return Err(RagError::Cancelled(collection.to_string()));
            }
            let vector = self
                .embedder
                .embed(&chunk.text)
                .await
                .inspect_err(|err| log_stage_failure("embed", collection, err))?;
            if let Some(first) = points.first() {
                if first.vector.len() != vector.len() {
                    let err = EmbeddingError::DimensionMismatch {
                        expected: first.vector.len(),
                        actual: vector.len(),
                    };
                    log_stage_failure("embed", collection, &err);
                    return Err(err.into());
                }
            }
            points.push(Point {
                id: chunk.id,
                vector,
                content: chunk.text,
            });
        }
        let vector_dim = points.first().map_or(0, |point| point.vector.len());

        self.enter(ticket, JobState::Upserting)?;
        self.store
            .ensure_collection(collection, vector_dim)
            .await
            .inspect_err(|err| log_stage_failure("ensure_collection", collection, err))?;

        let total_batches = points.len().div_ceil(self.options.batch_size);
        for (index, batch) in points.chunks(self.options.batch_size).enumerate() {
            if ticket.is_cancelled() {
                return Err(RagError::Cancelled(collection.to_string()));
            }
            self.store
                .upsert_batch(collection, batch)
                .await
                .inspect_err(|err| log_stage_failure("upsert", collection, err))?;
            self.registry.record_batch(ticket);
            info!(collection, "Upserted batch {} of {}", index + 1, total_batches);
        }

        info!(path = %document.path.display(), collection, "pdf processing and upsert completed");
        Ok(IngestionSummary {
            chunks: points.len(),
            batches: total_batches,
            vector_dim,
        })
    }
}
