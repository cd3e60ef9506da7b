use crate::answer::{ChatCompletionClient, DEFAULT_COMPLETION_ENDPOINT};
use crate::embeddings::{CharacterNgramEmbedder, EmbeddingModel, HttpEmbedder};
use crate::endpoint::parse_http_url;
use crate::error::ConfigurationError;
use crate::retry::RetryPolicy;
use crate::settings::Settings;
use crate::stores::QdrantStore;
use crate::traits::{CompletionModel, Embedder, VectorStore};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

pub trait BackendFactory: Send + Sync {
    fn embedder(&self, settings: &Settings) -> Result<Arc<dyn Embedder>, ConfigurationError>;

    fn vector_store(&self, settings: &Settings) -> Result<Arc<dyn VectorStore>, ConfigurationError>;

    fn completion_model(
        &self,
        settings: &Settings,
    ) -> Result<Arc<dyn CompletionModel>, ConfigurationError>;
}

#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub embedding_endpoint: Option<Url>,
    pub embedding_api_key: Option<String>,
    pub completion_endpoint: Url,
    pub retry: RetryPolicy,
    pub request_timeout: Duration,
}

impl BackendConfig {
    pub fn new(completion_endpoint: Url) -> Self {
        Self {
            embedding_endpoint: None,
            embedding_api_key: None,
            completion_endpoint,
            retry: RetryPolicy::default(),
            request_timeout: Duration::from_secs(120),
        }
    }

    pub fn groq() -> Result<Self, ConfigurationError> {
        let endpoint =
            parse_http_url(DEFAULT_COMPLETION_ENDPOINT).map_err(|details| ConfigurationError::InvalidUrl {
                url: DEFAULT_COMPLETION_ENDPOINT.to_string(),
                details,
            })?;
        Ok(Self::new(endpoint))
    }
}

pub struct RemoteBackends {
    client: Client,
    config: BackendConfig,
}

impl RemoteBackends {
    pub fn new(config: BackendConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }
}

impl BackendFactory for RemoteBackends {
    fn embedder(&self, settings: &Settings) -> Result<Arc<dyn Embedder>, ConfigurationError> {
        match EmbeddingModel::parse(&settings.embedding_model)? {
            EmbeddingModel::NgramHash { dimensions } => {
                Ok(Arc::new(CharacterNgramEmbedder { dimensions }))
            }
            EmbeddingModel::Remote { name } => {
                let endpoint = self
                    .config
                    .embedding_endpoint
                    .clone()
                    .ok_or_else(|| ConfigurationError::NoEmbeddingEndpoint(name.clone()))?;
                Ok(Arc::new(HttpEmbedder::new(
                    self.client.clone(),
                    endpoint,
                    self.config.embedding_api_key.clone(),
                    name,
                    self.config.retry,
                )))
            }
        }
    }

    fn vector_store(&self, settings: &Settings) -> Result<Arc<dyn VectorStore>, ConfigurationError> {
        let endpoint =
            parse_http_url(&settings.vector_store_url).map_err(|details| ConfigurationError::InvalidUrl {
                url: settings.vector_store_url.clone(),
                details,
            })?;
        Ok(Arc::new(QdrantStore::new(
            self.client.clone(),
            endpoint,
            settings.vector_store_key(),
            self.config.retry,
        )))
    }

    fn completion_model(
        &self,
        settings: &Settings,
    ) -> Result<Arc<dyn CompletionModel>, ConfigurationError> {
        if settings.completion_model_key.trim().is_empty() {
            return Err(ConfigurationError::Missing("completion_model_key"));
        }
        Ok(Arc::new(ChatCompletionClient::new(
            self.client.clone(),
            self.config.completion_endpoint.clone(),
            settings.completion_model_key.trim(),
            settings.completion_model.clone(),
        )))
    }
}
