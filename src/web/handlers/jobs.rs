//! `GET /job-status` — status of asynchronous jobs.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::{Extension, Json};

use crate::web::dto::JobStatusParams;
use crate::web::error::ApiError;
use crate::web::handlers::AppState;
use crate::web::middleware::RequestId;
use crate::worker::JobStatus;

/// Look up the status of a submitted job.
pub async fn job_status(
    State(state): State<Arc<AppState>>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Query(params): Query<JobStatusParams>,
) -> Result<Json<JobStatus>, ApiError> {
    let job_id = params
        .job_id
        .as_deref()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::bad_request(&request_id, "job_id parameter is missing"))?;

    let status = state
        .pool
        .job_status(job_id)
        .ok_or_else(|| ApiError::not_found(&request_id, "job not found"))?;

    tracing::debug!(request_id = %request_id, job_id, status = ?status.status, "Job status retrieved");

    Ok(Json(status))
}
