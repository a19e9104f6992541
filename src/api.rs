//! HTTP surface: submit a query, poll a job, liveness probe.
//!
//! The API is a thin pass-through to the job store. Submission returns the
//! job id immediately; polling is a non-blocking read of current job state.
//! The handlers never wait on job completion.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::RagError;
use crate::queue::{Job, JobId, JobStore};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn JobStore>,
    /// Nudges idle workers when new work arrives.
    pub wakeup: flume::Sender<()>,
}

/// Builds the service router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(liveness))
        .route("/chat", post(submit_chat))
        .route("/job-status", get(job_status))
        .with_state(state)
}

#[derive(Deserialize)]
struct ChatParams {
    query: String,
}

#[derive(Serialize)]
struct SubmitResponse {
    status: &'static str,
    job_id: String,
}

#[derive(Deserialize)]
struct StatusParams {
    job_id: String,
}

/// Full job state exposed to polling clients.
///
/// `status` and `error` are included so callers can distinguish
/// queued/running/failed instead of guessing from a null result.
#[derive(Serialize)]
struct JobStatusResponse {
    job_id: String,
    status: String,
    result: Option<String>,
    error: Option<String>,
}

impl From<Job> for JobStatusResponse {
    fn from(job: Job) -> Self {
        Self {
            job_id: job.id.to_string(),
            status: job.status.as_str().to_string(),
            result: job.result,
            error: job.error,
        }
    }
}

enum ApiError {
    NotFound(String),
    Unavailable(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            ApiError::Unavailable(message) => (StatusCode::SERVICE_UNAVAILABLE, message),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

async fn liveness() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn submit_chat(
    State(state): State<AppState>,
    Query(params): Query<ChatParams>,
) -> Result<(StatusCode, Json<SubmitResponse>), ApiError> {
    let job = state
        .store
        .submit(&params.query)
        .await
        .map_err(|err| ApiError::Unavailable(err.to_string()))?;
    // Best effort: a full/closed channel only delays pickup to the next poll.
    let _ = state.wakeup.try_send(());
    info!(job = %job.id, "query submitted");
    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitResponse {
            status: "queued",
            job_id: job.id.to_string(),
        }),
    ))
}

async fn job_status(
    State(state): State<AppState>,
    Query(params): Query<StatusParams>,
) -> Result<Json<JobStatusResponse>, ApiError> {
    let Some(id) = JobId::parse(&params.job_id) else {
        return Err(ApiError::NotFound(format!(
            "unknown job id: {}",
            params.job_id
        )));
    };
    match state.store.get(&id).await {
        Ok(job) => Ok(Json(job.into())),
        Err(RagError::JobNotFound(_)) => {
            Err(ApiError::NotFound(format!("unknown job id: {id}")))
        }
        Err(err) => {
            warn!(%err, "job lookup failed");
            Err(ApiError::Unavailable(err.to_string()))
        }
    }
}
