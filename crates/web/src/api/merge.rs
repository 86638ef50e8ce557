//! Detect and resolve endpoints.
//!
//! Both take `multipart/form-data` with the two revisions in `file1` and
//! `file2`; resolve additionally takes a `resolutions` part holding a JSON
//! array of `{ "id": n, "choice": "A" | "B" | "Both" }`.

use std::sync::Arc;

use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use tracing::debug;

use mergeai_core::models::{InputFile, MergeResult, Resolution};

use crate::api::status::AppError;
use crate::AppState;

// ---------------------------------------------------------------------------
// Upload parsing
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MergeUpload {
    file1: Option<InputFile>,
    file2: Option<InputFile>,
    resolutions: Option<Vec<u8>>,
}

impl MergeUpload {
    async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut upload = Self::default();

        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let name = field.name().unwrap_or_default().to_string();
            let file_name = field.file_name().map(str::to_string);
            let bytes = field.bytes().await.map_err(multipart_error)?.to_vec();

            match name.as_str() {
                "file1" => upload.file1 = Some(InputFile { file_name, bytes }),
                "file2" => upload.file2 = Some(InputFile { file_name, bytes }),
                "resolutions" => upload.resolutions = Some(bytes),
                other => debug!(field = other, "ignoring unexpected multipart field"),
            }
        }

        Ok(upload)
    }

    fn files(&mut self) -> Result<(InputFile, InputFile), AppError> {
        let file1 = self
            .file1
            .take()
            .ok_or_else(|| AppError::BadRequest("missing multipart field 'file1'".into()))?;
        let file2 = self
            .file2
            .take()
            .ok_or_else(|| AppError::BadRequest("missing multipart field 'file2'".into()))?;
        Ok((file1, file2))
    }

    fn resolutions(&self) -> Result<Vec<Resolution>, AppError> {
        let raw = self
            .resolutions
            .as_deref()
            .ok_or_else(|| AppError::BadRequest("missing multipart field 'resolutions'".into()))?;
        serde_json::from_slice(raw)
            .map_err(|e| AppError::BadRequest(format!("invalid resolutions: {}", e)))
    }
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(err.body_text())
    } else {
        AppError::BadRequest(err.body_text())
    }
}

// ---------------------------------------------------------------------------
// Routes
// ---------------------------------------------------------------------------

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/merge", post(detect))
        .route("/merge/resolve", post(resolve))
}

async fn detect(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<MergeResult>, AppError> {
    let mut upload = MergeUpload::read(multipart).await?;
    let (left, right) = upload.files()?;

    let result = state.orchestrator.detect(left, right).await?;
    Ok(Json(result))
}

async fn resolve(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<MergeResult>, AppError> {
    let mut upload = MergeUpload::read(multipart).await?;
    let resolutions = upload.resolutions()?;
    let (left, right) = upload.files()?;

    let result = state
        .orchestrator
        .resolve(left, right, &resolutions)
        .await?;
    Ok(Json(result))
}
