//! Artifact download endpoint.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;

use crate::api::status::AppError;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/download/:artifact_id", get(download))
}

async fn download(
    State(state): State<Arc<AppState>>,
    Path(artifact_id): Path<String>,
) -> Result<Response, AppError> {
    let bytes = state.orchestrator.retrieve(&artifact_id).await?;

    // `retrieve` only succeeds for identifiers made of [A-Za-z0-9_.-], so the
    // name is safe to echo into the header.
    let disposition = format!("attachment; filename=\"{}\"", artifact_id);
    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}
