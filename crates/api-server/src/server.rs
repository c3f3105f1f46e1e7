//! API server: routes, middleware, and the metrics exporter.

use crate::rest::{self, AppState};
use crate::swagger::ApiDoc;
use crate::{message_rest, session_rest};
use axum::routing::{get, post};
use axum::Router;
use relay_core::config::AppConfig;
use std::net::SocketAddr;
use std::path::Path;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Build the full HTTP router. When `static_dir` is given, non-API paths
/// serve the web UI with `index.html` as the SPA fallback.
pub fn build_router(state: AppState, static_dir: Option<&str>) -> Router {
    let api = Router::new()
        .route("/session/status", get(session_rest::handle_status))
        .route("/session/qr", get(session_rest::handle_qr))
        .route("/messages/send", post(message_rest::handle_send))
        .route("/messages/progress", get(message_rest::handle_progress))
        .route("/messages/report", get(message_rest::handle_report))
        .fallback(rest::api_not_found);

    let router = Router::new()
        .nest("/api", api)
        .route("/health", get(rest::health_check))
        .route("/ready", get(rest::readiness))
        .route("/live", get(rest::liveness))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    let router = match static_dir {
        Some(dir) => {
            let index = Path::new(dir).join("index.html");
            router.fallback_service(ServeDir::new(dir).fallback(ServeFile::new(index)))
        }
        None => router,
    };

    router
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Main API server.
pub struct ApiServer {
    config: AppConfig,
    state: AppState,
}

impl ApiServer {
    pub fn new(config: AppConfig, state: AppState) -> Self {
        Self { config, state }
    }

    /// Start the HTTP REST server.
    pub async fn start_http(&self) -> anyhow::Result<()> {
        let app = build_router(self.state.clone(), self.config.api.static_dir.as_deref());

        let addr = SocketAddr::new(self.config.api.host.parse()?, self.config.api.http_port);

        info!(
            addr = %addr,
            static_dir = ?self.config.api.static_dir,
            "Starting HTTP server"
        );

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }

    /// Start the Prometheus metrics exporter on a separate port.
    pub fn start_metrics(&self) -> anyhow::Result<()> {
        if !self.config.metrics.enabled {
            info!("Metrics exporter disabled");
            return Ok(());
        }
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(SocketAddr::new(
                self.config.api.host.parse()?,
                self.config.metrics.port,
            ))
            .install()?;

        info!(port = self.config.metrics.port, "Metrics exporter started");
        Ok(())
    }
}
