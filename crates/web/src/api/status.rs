//! Liveness and health check endpoints.

use std::sync::Arc;

use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tracing::error;

use mergeai_core::errors::{MergeError, StoreError};

use crate::AppState;

/// Liveness response.
#[derive(Serialize)]
struct PingResponse {
    message: &'static str,
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
    version: String,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ping", get(ping))
        .route("/health", get(health_check))
}

async fn ping() -> Json<PingResponse> {
    Json(PingResponse {
        message: "MergeAI backend is running!",
    })
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ---------------------------------------------------------------------------
// Shared error type for API handlers
// ---------------------------------------------------------------------------

/// Simple API error type that converts to an Axum response.
#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    NotFound(String),
    PayloadTooLarge(String),
    /// The engine ran and failed; the message is its own diagnostic text.
    EngineFailed(String),
    Internal(String),
}

impl From<MergeError> for AppError {
    fn from(err: MergeError) -> Self {
        if err.is_engine_failure() {
            return AppError::EngineFailed(err.to_string());
        }
        error!(error = %err, "merge request failed");
        AppError::Internal("internal error while processing merge".into())
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => AppError::NotFound("artifact not found".into()),
            other => {
                error!(error = %other, "artifact store failure");
                AppError::Internal("internal error while reading artifact".into())
            }
        }
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (axum::http::StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (axum::http::StatusCode::NOT_FOUND, msg),
            AppError::PayloadTooLarge(msg) => (axum::http::StatusCode::PAYLOAD_TOO_LARGE, msg),
            AppError::EngineFailed(msg) => (axum::http::StatusCode::UNPROCESSABLE_ENTITY, msg),
            AppError::Internal(msg) => (axum::http::StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = serde_json::json!({ "error": message });
        (status, Json(body)).into_response()
    }
}
