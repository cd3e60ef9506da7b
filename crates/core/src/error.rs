use crate::retry::Retryable;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Settings not configured.")]
    NotConfigured,

    #[error("missing setting: {0}")]
    Missing(&'static str),

    #[error("invalid url {url}: {details}")]
    InvalidUrl { url: String, details: String },

    #[error("unsupported embedding model: {0}")]
    UnsupportedModel(String),

    #[error("no embedding endpoint is configured for model {0}")]
    NoEmbeddingEndpoint(String),
}

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("extraction task failed: {0}")]
    Join(String),
}

#[derive(Debug, Error)]
pub enum SplitError {
    #[error("unsupported sentence splitting language: {0}")]
    UnsupportedLanguage(String),

    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),
}

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("embedding backend returned {status}: {details}")]
    Backend { status: u16, details: String },

    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),

    #[error("embedding dimension {actual} does not match expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("cannot embed empty text")]
    EmptyInput,
}

#[derive(Debug, Error)]
pub enum UpsertError {
    #[error("upsert request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid response from {backend}: {details}")]
    BackendResponse {
        backend: String,
        status: Option<u16>,
        details: String,
    },

    #[error("url error: {0}")]
    Url(#[from] url::ParseError),

    #[error("collection {0} does not exist")]
    MissingCollection(String),

    #[error("vector dimension {actual} does not match collection dimension {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("invalid collection configuration: {0}")]
    InvalidCollection(String),
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid response from {backend}: {details}")]
    BackendResponse {
        backend: String,
        status: Option<u16>,
        details: String,
    },

    #[error("url error: {0}")]
    Url(#[from] url::ParseError),

    #[error("query vector dimension {actual} does not match collection dimension {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("completion request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("completion backend returned {status}: {details}")]
    Backend { status: u16, details: String },

    #[error("completion response had no content")]
    EmptyResponse,

    #[error("url error: {0}")]
    Url(#[from] url::ParseError),
}

#[derive(Debug, Error)]
pub enum RagError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Split(#[from] SplitError),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Upsert(#[from] UpsertError),

    #[error(transparent)]
    Search(#[from] SearchError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error("document {collection} produced no text chunks; nothing to embed")]
    EmptyDocument { collection: String },

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("ingestion of {0} was cancelled")]
    Cancelled(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

fn transient_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 500 | 502 | 503 | 504)
}

fn transient_transport(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect()
}

impl Retryable for EmbeddingError {
    fn is_retryable(&self) -> bool {
        match self {
            EmbeddingError::Http(error) => transient_transport(error),
            EmbeddingError::Backend { status, .. } => transient_status(*status),
            _ => false,
        }
    }
}

impl Retryable for UpsertError {
    fn is_retryable(&self) -> bool {
        match self {
            UpsertError::Http(error) => transient_transport(error),
            UpsertError::BackendResponse {
                status: Some(status),
                ..
            } => transient_status(*status),
            _ => false,
        }
    }
}

impl Retryable for SearchError {
    fn is_retryable(&self) -> bool {
        match self {
            SearchError::Http(error) => transient_transport(error),
            SearchError::BackendResponse {
                status: Some(status),
                ..
            } => transient_status(*status),
            _ => false,
        }
    }
}
