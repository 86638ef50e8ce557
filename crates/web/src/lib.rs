//! MergeAI web server and REST API.
//!
//! Provides an Axum-based HTTP server with:
//! - Detect and resolve endpoints taking multipart uploads
//! - Artifact download
//! - Liveness and health endpoints

pub mod api;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, Method};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use mergeai_core::config::WebConfig;
use mergeai_core::orchestrator::MergeOrchestrator;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub orchestrator: MergeOrchestrator,
    pub config: WebConfig,
}

/// The web server.
pub struct WebServer {
    state: Arc<AppState>,
}

impl WebServer {
    /// Create a new web server around an orchestrator.
    pub fn new(config: WebConfig, orchestrator: MergeOrchestrator) -> Self {
        let state = Arc::new(AppState {
            orchestrator,
            config,
        });
        Self { state }
    }

    /// Build the full router with middleware.
    pub fn router(&self) -> Router {
        // The frontend is served from its own dev server, so allow any origin.
        let cors = CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::CONTENT_TYPE]);

        Router::new()
            .merge(api::merge::routes())
            .merge(api::download::routes())
            .merge(api::status::routes())
            .layer(DefaultBodyLimit::max(self.state.config.max_upload_bytes))
            .layer(TraceLayer::new_for_http())
            .layer(cors)
            .with_state(self.state.clone())
    }

    /// Start the web server, listening on the given address.
    pub async fn start(self, listen_addr: &str) -> anyhow::Result<()> {
        let addr: SocketAddr = listen_addr.parse()?;
        let app = self.router();

        info!(addr = %addr, "starting web server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}
