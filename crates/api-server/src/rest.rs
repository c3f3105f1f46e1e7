//! Shared REST state, error mapping, and operational endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use relay_channels::SessionManager;
use relay_core::RelayError;
use relay_delivery::JobRegistry;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::error;
use utoipa::ToSchema;

/// Shared application state for REST handlers.
#[derive(Clone)]
pub struct AppState {
    pub session: Arc<SessionManager>,
    pub registry: Arc<JobRegistry>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(session: Arc<SessionManager>, registry: Arc<JobRegistry>) -> Self {
        Self {
            session,
            registry,
            start_time: Instant::now(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub session: String,
    pub uptime_secs: u64,
}

/// REST-facing wrapper that maps domain errors onto HTTP statuses.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code,
            message: message.into(),
        }
    }

    pub fn not_found() -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            code: "not_found",
            message: "Not found".to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<RelayError> for ApiError {
    fn from(err: RelayError) -> Self {
        let status = match &err {
            RelayError::Validation(_) | RelayError::SessionNotReady => StatusCode::BAD_REQUEST,
            RelayError::JobAlreadyRunning { .. } => StatusCode::CONFLICT,
            RelayError::NoJob | RelayError::PairingNotAvailable => StatusCode::NOT_FOUND,
            RelayError::Protocol(_) => {
                error!(error = %err, "Request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        metrics::counter!("api.errors", "code" => err.code()).increment(1);
        Self {
            status,
            code: err.code(),
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.code.to_string(),
                message: self.message,
            }),
        )
            .into_response()
    }
}

/// GET /health: Health check endpoint.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Operations",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        session: state.session.phase().display_name().to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// GET /ready: 200 only once the messaging session can send.
#[utoipa::path(
    get,
    path = "/ready",
    tag = "Operations",
    responses(
        (status = 200, description = "Session ready"),
        (status = 503, description = "Session not ready"),
    )
)]
pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    if state.session.ready_client().is_ok() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// GET /live: Liveness probe.
#[utoipa::path(
    get,
    path = "/live",
    tag = "Operations",
    responses((status = 200, description = "Process alive"))
)]
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// Fallback for unknown `/api` paths.
pub async fn api_not_found() -> ApiError {
    ApiError::not_found()
}
