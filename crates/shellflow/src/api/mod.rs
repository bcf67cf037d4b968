use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::api::models::{JobView, QueueMetrics};
use crate::error::QueueError;
use crate::jobs::model::{JobState, JobSubmission};
use crate::jobs::JobsRepo;
use crate::settings::SettingsRepo;

pub mod models;

#[derive(Clone)]
pub struct ApiState {
    pub jobs: JobsRepo,
    pub settings: SettingsRepo,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/jobs", get(list_jobs).post(enqueue_job))
        .route("/jobs/:id", get(get_job))
        .route("/dlq", get(list_dlq))
        .route("/dlq/:id/retry", post(dlq_retry))
        .route("/metrics", get(metrics))
        .route("/health", get(health))
        .with_state(state)
}

fn queue_err(err: QueueError) -> (StatusCode, String) {
    let status = match &err {
        QueueError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        QueueError::Conflict(_) => StatusCode::CONFLICT,
        QueueError::NotFound(_) => StatusCode::NOT_FOUND,
        QueueError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
        QueueError::Fatal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub state: Option<String>,
}

pub async fn list_jobs(
    State(state): State<ApiState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<JobView>>, (StatusCode, String)> {
    let filter = match query.state.as_deref() {
        Some(raw) => Some(JobState::parse(raw).ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                format!("unknown job state: {raw}"),
            )
        })?),
        None => None,
    };

    let jobs = state.jobs.list_jobs(filter).await.map_err(queue_err)?;
    Ok(Json(jobs.into_iter().map(JobView::from).collect()))
}

pub async fn get_job(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<JobView>, (StatusCode, String)> {
    let job = state
        .jobs
        .get_job(&id)
        .await
        .map_err(queue_err)?
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("job {id} not found")))?;

    Ok(Json(job.into()))
}

#[derive(Debug, Serialize)]
pub struct EnqueueResponse {
    pub job_id: String,
}

pub async fn enqueue_job(
    State(state): State<ApiState>,
    Json(submission): Json<JobSubmission>,
) -> Result<(StatusCode, Json<EnqueueResponse>), (StatusCode, String)> {
    let job_id = state.jobs.enqueue(&submission).await.map_err(queue_err)?;
    Ok((StatusCode::CREATED, Json(EnqueueResponse { job_id })))
}

pub async fn list_dlq(
    State(state): State<ApiState>,
) -> Result<Json<Vec<JobView>>, (StatusCode, String)> {
    let jobs = state.jobs.list_dlq().await.map_err(queue_err)?;
    Ok(Json(jobs.into_iter().map(JobView::from).collect()))
}

pub async fn dlq_retry(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<JobView>, (StatusCode, String)> {
    state
        .jobs
        .dlq_retry(&id, Utc::now().timestamp())
        .await
        .map_err(queue_err)?;

    let job = state
        .jobs
        .get_job(&id)
        .await
        .map_err(queue_err)?
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("job {id} not found")))?;

    Ok(Json(job.into()))
}

pub async fn metrics(
    State(state): State<ApiState>,
) -> Result<Json<QueueMetrics>, (StatusCode, String)> {
    let (pending, processing, completed, dead) =
        state.jobs.counts_by_state().await.map_err(queue_err)?;

    Ok(Json(QueueMetrics {
        pending,
        processing,
        completed,
        dead,
    }))
}

pub async fn health() -> &'static str {
    "ok"
}
