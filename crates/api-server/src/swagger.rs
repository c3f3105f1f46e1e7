//! OpenAPI specification and Swagger UI configuration.

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Bulk Relay API",
        version = "0.1.0",
        description = "Rate-limited WhatsApp broadcasts over a single linked session.",
        license(name = "MIT"),
    ),
    tags(
        (name = "Session", description = "Messaging session status and pairing"),
        (name = "Messages", description = "Broadcast submission, progress, and reports"),
        (name = "Operations", description = "Health, readiness, and liveness probes"),
    ),
    paths(
        // Session
        crate::session_rest::handle_status,
        crate::session_rest::handle_qr,
        // Messages
        crate::message_rest::handle_send,
        crate::message_rest::handle_progress,
        crate::message_rest::handle_report,
        // Operations
        crate::rest::health_check,
        crate::rest::readiness,
        crate::rest::liveness,
    ),
    components(schemas(
        relay_core::types::SessionStatus,
        relay_core::types::SessionPhase,
        relay_core::types::DispatchRequest,
        relay_core::types::JobCounters,
        relay_core::types::JobReport,
        relay_core::types::JobStatus,
        relay_core::types::DeliveryResult,
        relay_core::types::DeliveryOutcome,
        crate::session_rest::PairingResponse,
        crate::message_rest::SubmitResponse,
        crate::rest::ErrorResponse,
        crate::rest::HealthResponse,
    ))
)]
pub struct ApiDoc;
