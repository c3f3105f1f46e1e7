//! Messaging session REST endpoints.

use crate::rest::{ApiError, AppState, ErrorResponse};
use axum::extract::State;
use axum::Json;
use relay_core::types::SessionStatus;
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PairingResponse {
    pub qr_data_url: String,
}

/// GET /api/session/status: Session readiness; starts the client if needed.
#[utoipa::path(
    get,
    path = "/api/session/status",
    tag = "Session",
    responses((status = 200, description = "Current session status", body = SessionStatus))
)]
pub async fn handle_status(State(state): State<AppState>) -> Json<SessionStatus> {
    Json(state.session.status())
}

/// GET /api/session/qr: Pairing artifact to scan with the phone.
#[utoipa::path(
    get,
    path = "/api/session/qr",
    tag = "Session",
    responses(
        (status = 200, description = "Pairing artifact", body = PairingResponse),
        (status = 404, description = "No pairing challenge pending", body = ErrorResponse),
    )
)]
pub async fn handle_qr(State(state): State<AppState>) -> Result<Json<PairingResponse>, ApiError> {
    let artifact = state.session.pairing_artifact()?;
    Ok(Json(PairingResponse {
        qr_data_url: artifact.data_url().to_string(),
    }))
}
