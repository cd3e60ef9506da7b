use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use pdf_rag_core::{
    Answer, HealthStatus, JobSnapshot, QueryRequest, RagError, RagService, Settings, SettingsAck,
    UploadAck,
};
use serde_json::json;
use std::sync::Arc;
use tracing::warn;

const UPLOAD_FIELD: &str = "file";

pub type AppState = Arc<RagService>;

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    fn bad_request(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            detail: detail.into(),
        }
    }

    fn not_found(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            detail: detail.into(),
        }
    }
}

impl From<RagError> for ApiError {
    fn from(error: RagError) -> Self {
        let status = match error {
            RagError::InvalidArgument(_) | RagError::InvalidChunkConfig(_) => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            detail: error.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

pub fn router(service: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/upload-pdf", post(upload_pdf))
        .route("/query", post(query))
        .route("/set-settings", post(set_settings))
        .route("/jobs", get(list_jobs))
        .route("/jobs/{collection_name}", get(job_status))
        .route("/jobs/{collection_name}/cancel", post(cancel_job))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(service)
}

pub async fn health(State(service): State<AppState>) -> Json<HealthStatus> {
    Json(service.health())
}

pub async fn upload_pdf(
    State(service): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadAck>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|error| ApiError::bad_request(error.body_text()))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let file_name = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| ApiError::bad_request("uploaded file has no file name"))?;
        let bytes = field
            .bytes()
            .await
            .map_err(|error| ApiError::bad_request(error.body_text()))?;

        // The ingestion task keeps running after the handle is dropped.
        let handle = service.upload(&file_name, &bytes).await?;
        return Ok(Json(handle.ack));
    }

    Err(ApiError::bad_request(format!(
        "multipart field {UPLOAD_FIELD:?} is required"
    )))
}

pub async fn query(
    State(service): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<Answer>, ApiError> {
    let answer = service.query(&request).await?;
    Ok(Json(answer))
}

pub async fn set_settings(
    State(service): State<AppState>,
    Json(settings): Json<Settings>,
) -> Result<Json<SettingsAck>, ApiError> {
    let ack = service.set_settings(settings)?;
    Ok(Json(ack))
}

pub async fn list_jobs(State(service): State<AppState>) -> Json<Vec<JobSnapshot>> {
    Json(service.jobs())
}

pub async fn job_status(
    State(service): State<AppState>,
    Path(collection_name): Path<String>,
) -> Result<Json<JobSnapshot>, ApiError> {
    service
        .job_status(&collection_name)
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("no job for collection {collection_name}")))
}

pub async fn cancel_job(
    State(service): State<AppState>,
    Path(collection_name): Path<String>,
) -> Result<Json<JobSnapshot>, ApiError> {
    if !service.cancel_job(&collection_name) {
        warn!(collection = %collection_name, "cancel requested without a running job");
        return Err(ApiError::not_found(format!(
            "no running job for collection {collection_name}"
        )));
    }
    service
        .job_status(&collection_name)
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("no job for collection {collection_name}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdf_rag_core::{BackendConfig, LopdfExtractor, RemoteBackends, ServiceConfig};

    fn state(upload_dir: &std::path::Path) -> anyhow::Result<AppState> {
        let backends = RemoteBackends::new(BackendConfig::groq()?)?;
        let service = RagService::new(
            ServiceConfig::new(upload_dir),
            Arc::new(backends),
            Arc::new(LopdfExtractor),
        )?;
        Ok(Arc::new(service))
    }

    fn settings() -> anyhow::Result<Settings> {
        let settings = serde_json::from_value(json!({
            "embedding_model": "ngram-hash:32",
            "qdrant_cloud_url": "http://localhost:6333",
            "qdrant_api_key": "qdrant-key",
            "groq_api_key": "groq-key"
        }))?;
        Ok(settings)
    }

    #[tokio::test]
    async fn health_is_ok() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let Json(status) = health(State(state(dir.path())?)).await;
        assert_eq!(status.status, "ok");
        Ok(())
    }

    #[tokio::test]
    async fn query_without_settings_is_a_server_error() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let request = QueryRequest {
            query: "What color is the sky?".to_string(),
            collection_name: "sky".to_string(),
        };

        let result = query(State(state(dir.path())?), Json(request)).await;

        let error = result.err().ok_or_else(|| anyhow::anyhow!("query should fail"))?;
        assert_eq!(error.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error.detail, "Settings not configured.");
        Ok(())
    }

    #[tokio::test]
    async fn empty_query_is_a_bad_request() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let service = state(dir.path())?;
        set_settings(State(service.clone()), Json(settings()?))
            .await
            .map_err(|error| anyhow::anyhow!(error.detail))?;

        let request = QueryRequest {
            query: "   ".to_string(),
            collection_name: "sky".to_string(),
        };
        let result = query(State(service), Json(request)).await;

        let error = result.err().ok_or_else(|| anyhow::anyhow!("query should fail"))?;
        assert_eq!(error.status, StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn settings_are_acknowledged_with_increasing_versions() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let service = state(dir.path())?;

        let Json(first) = set_settings(State(service.clone()), Json(settings()?))
            .await
            .map_err(|error| anyhow::anyhow!(error.detail))?;
        let Json(second) = set_settings(State(service), Json(settings()?))
            .await
            .map_err(|error| anyhow::anyhow!(error.detail))?;

        assert_eq!(first.message, "Settings saved successfully.");
        assert!(second.version > first.version);
        Ok(())
    }

    #[tokio::test]
    async fn unknown_jobs_are_not_found() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let service = state(dir.path())?;

        let status = job_status(State(service.clone()), Path("missing".to_string())).await;
        assert_eq!(
            status.err().map(|error| error.status),
            Some(StatusCode::NOT_FOUND)
        );

        let cancel = cancel_job(State(service.clone()), Path("missing".to_string())).await;
        assert_eq!(
            cancel.err().map(|error| error.status),
            Some(StatusCode::NOT_FOUND)
        );

        let Json(jobs) = list_jobs(State(service)).await;
        assert!(jobs.is_empty());
        Ok(())
    }

    #[test]
    fn errors_render_as_detail_bodies() {
        let error = ApiError::from(RagError::InvalidArgument("bad name".to_string()));
        assert_eq!(error.status, StatusCode::BAD_REQUEST);
        assert_eq!(error.detail, "invalid argument: bad name");

        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
