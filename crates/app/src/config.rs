use anyhow::{anyhow, Context};
use clap::Parser;
use pdf_rag_core::answer::DEFAULT_COMPLETION_ENDPOINT;
use pdf_rag_core::endpoint::parse_http_url;
use pdf_rag_core::{BackendConfig, ChunkingConfig, IdPolicy, IngestionOptions, RetryPolicy, ServiceConfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Parser)]
#[command(name = "pdf-rag-server", version, about = "Ask questions about uploaded PDFs")]
pub struct Cli {
    /// Address the HTTP server listens on
    #[arg(long, env = "RAG_BIND", default_value = "127.0.0.1:8001")]
    pub bind: SocketAddr,

    /// Directory where uploaded PDFs are kept
    #[arg(long, env = "RAG_UPLOAD_DIR", default_value = "uploads")]
    pub upload_dir: PathBuf,

    /// Largest accepted upload body in bytes
    #[arg(long, env = "RAG_MAX_UPLOAD_BYTES", default_value_t = 50 * 1024 * 1024)]
    pub max_upload_bytes: usize,

    /// Maximum words per chunk
    #[arg(long, env = "RAG_MAX_CHUNK_SIZE", default_value_t = 512)]
    pub max_chunk_size: usize,

    /// Words carried from one chunk into the next
    #[arg(long, env = "RAG_CHUNK_OVERLAP", default_value_t = 50)]
    pub chunk_overlap: usize,

    /// Points per vector store upsert
    #[arg(long, env = "RAG_BATCH_SIZE", default_value_t = 10)]
    pub batch_size: usize,

    /// Hits retrieved as context for each question
    #[arg(long, env = "RAG_SEARCH_LIMIT", default_value_t = 5)]
    pub search_limit: usize,

    /// Ingestion jobs allowed to run at the same time
    #[arg(long, env = "RAG_MAX_CONCURRENT_JOBS", default_value_t = 4)]
    pub max_concurrent_jobs: usize,

    /// Language used for sentence segmentation (en, de, fr)
    #[arg(long, env = "RAG_LANGUAGE", default_value = "en")]
    pub language: String,

    /// Chunk id scheme: content (dedupe identical text) or document (scoped to upload)
    #[arg(long, env = "RAG_ID_POLICY", default_value = "content")]
    pub id_policy: IdPolicy,

    /// Attempts per embedder or vector store call, 1 disables retries
    #[arg(long, env = "RAG_RETRY_ATTEMPTS", default_value_t = 3)]
    pub retry_attempts: u32,

    /// Backoff before the first retry in milliseconds
    #[arg(long, env = "RAG_RETRY_INITIAL_BACKOFF_MS", default_value_t = 200)]
    pub retry_initial_backoff_ms: u64,

    /// Upper bound for retry backoff in milliseconds
    #[arg(long, env = "RAG_RETRY_MAX_BACKOFF_MS", default_value_t = 5_000)]
    pub retry_max_backoff_ms: u64,

    /// Timeout for each outbound HTTP request in seconds
    #[arg(long, env = "RAG_REQUEST_TIMEOUT_SECS", default_value_t = 120)]
    pub request_timeout_secs: u64,

    /// OpenAI-compatible embeddings API base URL used for non-local models
    #[arg(long, env = "RAG_EMBEDDING_ENDPOINT")]
    pub embedding_endpoint: Option<String>,

    /// Bearer token for the embeddings API
    #[arg(long, env = "RAG_EMBEDDING_API_KEY", hide_env_values = true)]
    pub embedding_api_key: Option<String>,

    /// OpenAI-compatible chat completions API base URL
    #[arg(long, env = "RAG_COMPLETION_ENDPOINT", default_value = DEFAULT_COMPLETION_ENDPOINT)]
    pub completion_endpoint: String,
}

impl Cli {
    pub fn service_config(&self) -> anyhow::Result<ServiceConfig> {
        let chunking = ChunkingConfig::new(self.max_chunk_size, self.chunk_overlap)
            .context("invalid chunking options")?;

        let ingestion = IngestionOptions {
            chunking,
            batch_size: self.batch_size,
            language: self.language.clone(),
            id_policy: self.id_policy,
        };
        ingestion.validate().context("invalid ingestion options")?;

        Ok(ServiceConfig {
            upload_dir: self.upload_dir.clone(),
            ingestion,
            search_limit: self.search_limit,
            max_concurrent_jobs: self.max_concurrent_jobs,
        })
    }

    pub fn backend_config(&self) -> anyhow::Result<BackendConfig> {
        let completion_endpoint = parse_http_url(&self.completion_endpoint)
            .map_err(|details| anyhow!("invalid completion endpoint: {details}"))?;
        let embedding_endpoint = self
            .embedding_endpoint
            .as_deref()
            .filter(|raw| !raw.trim().is_empty())
            .map(parse_http_url)
            .transpose()
            .map_err(|details| anyhow!("invalid embedding endpoint: {details}"))?;

        let retry = RetryPolicy::default()
            .with_max_attempts(self.retry_attempts)
            .with_initial_backoff(Duration::from_millis(self.retry_initial_backoff_ms))
            .with_max_backoff(Duration::from_millis(self.retry_max_backoff_ms));

        let mut config = BackendConfig::new(completion_endpoint);
        config.embedding_endpoint = embedding_endpoint;
        config.embedding_api_key = self.embedding_api_key.clone();
        config.retry = retry;
        config.request_timeout = Duration::from_secs(self.request_timeout_secs);
        Ok(config)
    }

    pub fn ensure_upload_dir(&self) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.upload_dir)
            .with_context(|| format!("cannot create upload dir {}", self.upload_dir.display()))
    }
}
