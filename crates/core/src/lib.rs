pub mod answer;
pub mod backends;
pub mod chunking;
pub mod dedup;
pub mod embeddings;
pub mod endpoint;
pub mod error;
pub mod extractor;
pub mod ingest;
pub mod jobs;
pub mod models;
pub mod orchestrator;
pub mod retry;
pub mod sentences;
pub mod settings;
pub mod stores;
pub mod traits;

pub use answer::{answer_from_hits, build_prompt, ChatCompletionClient};
pub use backends::{BackendConfig, BackendFactory, RemoteBackends};
pub use chunking::{chunk_sentences, normalize_whitespace, ChunkingConfig};
pub use dedup::{content_id, IdPolicy};
pub use embeddings::{CharacterNgramEmbedder, EmbeddingModel, HttpEmbedder};
pub use error::{
    ConfigurationError, EmbeddingError, ExtractionError, GenerationError, RagError, SearchError,
    SplitError, UpsertError,
};
pub use extractor::{LopdfExtractor, PageText, TextExtractor};
pub use ingest::{IngestionOptions, IngestionPipeline, IngestionSummary};
pub use jobs::JobRegistry;
pub use models::{Answer, JobSnapshot, JobState, Point, QueryRequest, ScoredPoint};
pub use orchestrator::{
    collection_for_upload, HealthStatus, RagService, ServiceConfig, SettingsAck, UploadAck,
    UploadHandle,
};
pub use retry::RetryPolicy;
pub use sentences::SentenceSplitter;
pub use settings::{Settings, SettingsStore};
pub use stores::{MemoryStore, QdrantStore};
pub use traits::{CompletionModel, Embedder, VectorStore};
