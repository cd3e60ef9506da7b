use crate::answer::answer_from_hits;
use crate::backends::BackendFactory;
use crate::error::{ConfigurationError, RagError};
use crate::extractor::TextExtractor;
use crate::ingest::{IngestionOptions, IngestionPipeline};
use crate::jobs::{JobRegistry, JobTicket, DEFAULT_MAX_CONCURRENT_JOBS};
use crate::models::{Answer, JobSnapshot, JobState, QueryRequest, UploadedDocument};
use crate::settings::{Settings, SettingsStore};
use crate::traits::{Embedder, VectorStore};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

pub const SEARCH_LIMIT: usize = 5;
pub const UPLOAD_ACK_MESSAGE: &str = "File uploaded. PDF processing started in the background.";
pub const SETTINGS_ACK_MESSAGE: &str = "Settings saved successfully.";

const MAX_COLLECTION_NAME_LEN: usize = 255;

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub upload_dir: PathBuf,
    pub ingestion: IngestionOptions,
    pub search_limit: usize,
    pub max_concurrent_jobs: usize,
}

impl ServiceConfig {
    pub fn new(upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            ingestion: IngestionOptions::default(),
            search_limit: SEARCH_LIMIT,
            max_concurrent_jobs: DEFAULT_MAX_CONCURRENT_JOBS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadAck {
    pub message: String,
    pub collection_name: String,
    pub job_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsAck {
    pub message: String,
    pub version: u64,
}

#[derive(Debug)]
pub struct UploadHandle {
    pub ack: UploadAck,
    pub task: JoinHandle<Option<JobSnapshot>>,
}

pub fn collection_for_upload(file_name: &str) -> Result<(String, String), RagError> {
    let normalized = file_name.replace('\\', "/");
    let base = Path::new(&normalized)
        .file_name()
        .and_then(|name| name.to_str())
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| RagError::InvalidArgument(format!("invalid file name {file_name:?}")))?;

    let path = Path::new(base);
    let is_pdf = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
    if !is_pdf {
        return Err(RagError::InvalidArgument(format!(
            "only pdf uploads are supported, got {base:?}"
        )));
    }

    let stem = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::trim)
        .unwrap_or_default();
    let valid = !stem.is_empty()
        && stem.len() <= MAX_COLLECTION_NAME_LEN
        && stem
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | ' '));
    if !valid {
        return Err(RagError::InvalidArgument(format!(
            "{base:?} does not yield a valid collection name"
        )));
    }

    Ok((base.to_string(), stem.to_string()))
}

pub struct RagService {
    settings: SettingsStore,
    jobs: Arc<JobRegistry>,
    backends: Arc<dyn BackendFactory>,
    extractor: Arc<dyn TextExtractor>,
    options: Arc<IngestionOptions>,
    upload_dir: PathBuf,
    search_limit: usize,
}

impl RagService {
    pub fn new(
        config: ServiceConfig,
        backends: Arc<dyn BackendFactory>,
        extractor: Arc<dyn TextExtractor>,
    ) -> Result<Self, RagError> {
        config.ingestion.validate()?;
        if config.search_limit == 0 {
            return Err(RagError::InvalidArgument(
                "search limit must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            settings: SettingsStore::new(),
            jobs: Arc::new(JobRegistry::new(config.max_concurrent_jobs)),
            backends,
            extractor,
            options: Arc::new(config.ingestion),
            upload_dir: config.upload_dir,
            search_limit: config.search_limit,
        })
    }

    pub fn health(&self) -> HealthStatus {
        HealthStatus {
            status: "ok".to_string(),
        }
    }

    pub fn set_settings(&self, settings: Settings) -> Result<SettingsAck, RagError> {
        let update = self.settings.update(settings).inspect_err(|err| {
            error!(error = %err, "Error saving settings");
        })?;
        if let Some(previous) = &update.previous {
            info!(previous_version = previous.version, previous = ?previous.settings, "settings replaced");
        }
        Ok(SettingsAck {
            message: SETTINGS_ACK_MESSAGE.to_string(),
            version: update.version,
        })
    }

    pub fn job_status(&self, collection: &str) -> Option<JobSnapshot> {
        self.jobs.get(collection)
    }

    pub fn jobs(&self) -> Vec<JobSnapshot> {
        self.jobs.list()
    }

    pub fn cancel_job(&self, collection: &str) -> bool {
        self.jobs.cancel(collection)
    }

    pub async fn upload(&self, file_name: &str, bytes: &[u8]) -> Result<UploadHandle, RagError> {
        let (file_name, collection) = collection_for_upload(file_name)?;

        let snapshot = match self.settings.snapshot() {
            Ok(snapshot) => snapshot,
            Err(err) => return Err(self.rejected(&collection, &file_name, err)),
        };
        let resolved = snapshot
            .settings
            .validate_for_ingestion()
            .and_then(|_| self.backends.embedder(&snapshot.settings))
            .and_then(|embedder| {
                self.backends
                    .vector_store(&snapshot.settings)
                    .map(|store| (embedder, store))
            });
        let (embedder, store) = match resolved {
            Ok(backends) => backends,
            Err(err) => return Err(self.rejected(&collection, &file_name, err)),
        };

        tokio::fs::create_dir_all(&self.upload_dir).await?;
        let path = self.upload_dir.join(&file_name);
        tokio::fs::write(&path, bytes).await.inspect_err(|err| {
            error!(path = %path.display(), error = %err, "Error during file upload");
        })?;

        let document = UploadedDocument {
            file_name,
            collection,
            path,
        };
        let ticket = self
            .jobs
            .register(&document.collection, &document.file_name, snapshot.version);
        info!(
            collection = %document.collection,
            job_id = %ticket.job_id,
            bytes = bytes.len(),
            "upload accepted"
        );

        let ack = UploadAck {
            message: UPLOAD_ACK_MESSAGE.to_string(),
            collection_name: document.collection.clone(),
            job_id: ticket.job_id,
        };

        let job = BackgroundJob {
            registry: self.jobs.clone(),
            extractor: self.extractor.clone(),
            options: self.options.clone(),
            embedder,
            store,
        };
        let task = tokio::spawn(job.run(document, ticket));

        Ok(UploadHandle { ack, task })
    }

    fn rejected(&self, collection: &str, file_name: &str, err: ConfigurationError) -> RagError {
        warn!(collection, error = %err, "upload rejected");
        self.jobs.reject(collection, file_name, &err.to_string());
        err.into()
    }

    pub async fn query(&self, request: &QueryRequest) -> Result<Answer, RagError> {
        let snapshot = self.settings.snapshot()?;
        snapshot.settings.validate_for_query()?;

        if request.query.trim().is_empty() {
            return Err(RagError::InvalidArgument("query must not be empty".to_string()));
        }
        if request.collection_name.trim().is_empty() {
            return Err(RagError::InvalidArgument(
                "collection_name must not be empty".to_string(),
            ));
        }

        let embedder = self.backends.embedder(&snapshot.settings)?;
        let store = self.backends.vector_store(&snapshot.settings)?;
        let completion = self.backends.completion_model(&snapshot.settings)?;

        let result = async {
            let query_vector = embedder.embed(&request.query).await?;
            let hits = store
                .search(&request.collection_name, &query_vector, self.search_limit)
                .await?;
            info!(collection = %request.collection_name, hits = hits.len(), "retrieved context");
            let answer = answer_from_hits(completion.as_ref(), &request.query, &hits).await?;
            Ok::<_, RagError>(Answer {
                answer,
                context_chunks: hits.len(),
            })
        }
        .await;

        result.inspect_err(|err| {
            error!(collection = %request.collection_name, error = %err, "Error during query and LLM inference");
        })
    }
}

struct BackgroundJob {
    registry: Arc<JobRegistry>,
    extractor: Arc<dyn TextExtractor>,
    options: Arc<IngestionOptions>,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
}

impl BackgroundJob {
    async fn run(self, document: UploadedDocument, ticket: JobTicket) -> Option<JobSnapshot> {
        let _slot = self.registry.acquire_slot().await;

        let pipeline = IngestionPipeline {
            extractor: self.extractor.clone(),
            embedder: self.embedder.as_ref(),
            store: self.store.as_ref(),
            options: self.options.as_ref(),
            registry: self.registry.as_ref(),
        };

        match pipeline.run(&document, &ticket).await {
            Ok(summary) => {
                self.registry.transition(&ticket, JobState::Done);
                info!(
                    collection = %document.collection,
                    chunks = summary.chunks,
                    batches = summary.batches,
                    vector_dim = summary.vector_dim,
                    "ingestion finished"
                );
            }
            Err(RagError::Cancelled(_)) => {
                self.registry.mark_cancelled(&ticket);
                warn!(collection = %document.collection, job_id = %ticket.job_id, "ingestion cancelled");
            }
            Err(err) => {
                self.registry.fail(&ticket, &err.to_string());
                error!(
                    collection = %document.collection,
                    job_id = %ticket.job_id,
                    error = %err,
                    "Error processing and upserting PDF"
                );
            }
        }

        self.registry.get(&document.collection)
    }
}
