//! Broadcast submission, progress, and report endpoints.

use crate::rest::{ApiError, AppState, ErrorResponse};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::Json;
use relay_core::types::{DispatchRequest, JobCounters, JobProgress, JobReport};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub job_id: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct ProgressQuery {
    /// Only report progress if the current job has this id.
    pub job_id: Option<String>,
}

/// POST /api/messages/send: Start a rate-limited broadcast.
#[utoipa::path(
    post,
    path = "/api/messages/send",
    tag = "Messages",
    request_body = DispatchRequest,
    responses(
        (status = 200, description = "Broadcast started", body = SubmitResponse),
        (status = 400, description = "Invalid request or session not ready", body = ErrorResponse),
        (status = 409, description = "Another broadcast is running", body = ErrorResponse),
    )
)]
pub async fn handle_send(
    State(state): State<AppState>,
    payload: Result<Json<DispatchRequest>, JsonRejection>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let Json(request) =
        payload.map_err(|rejection| ApiError::bad_request("invalid_body", rejection.body_text()))?;
    let job_id = state.registry.submit(request)?;
    Ok(Json(SubmitResponse { job_id }))
}

/// GET /api/messages/progress: Counters for the current broadcast.
#[utoipa::path(
    get,
    path = "/api/messages/progress",
    tag = "Messages",
    params(ProgressQuery),
    responses(
        (status = 200, description = "`{hasJob: false}` or `hasJob: true` with the job counters", body = JobCounters),
    )
)]
pub async fn handle_progress(
    State(state): State<AppState>,
    Query(query): Query<ProgressQuery>,
) -> Json<JobProgress> {
    Json(state.registry.progress(query.job_id.as_deref()))
}

/// GET /api/messages/report: Full per-recipient ledger of the current job.
#[utoipa::path(
    get,
    path = "/api/messages/report",
    tag = "Messages",
    responses(
        (status = 200, description = "Broadcast report", body = JobReport),
        (status = 404, description = "No broadcast submitted yet", body = ErrorResponse),
    )
)]
pub async fn handle_report(State(state): State<AppState>) -> Result<Json<JobReport>, ApiError> {
    Ok(Json(state.registry.report()?))
}
