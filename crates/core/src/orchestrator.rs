//! Two-phase merge orchestration.
//!
//! `detect` stages two inputs and runs the engine on them; `resolve` does the
//! same with a resolutions document as the third argument. Both stage the
//! engine's stdout as a fresh artifact and report the conflicts found in its
//! diagnostics. Nothing is kept between calls except what sits in the store.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::conflict_log::parse_conflict_log;
use crate::engine::MergeEngine;
use crate::errors::{MergeError, StoreError};
use crate::models::{InputFile, MergeResult, Resolution};
use crate::store::{ArtifactKind, ArtifactRef, ArtifactStore, MAX_EXTENSION_LEN};

const RESOLUTIONS_NAME: &str = "resolutions.json";

/// Composes the artifact store and the merge engine.
#[derive(Clone)]
pub struct MergeOrchestrator {
    store: ArtifactStore,
    engine: Arc<dyn MergeEngine>,
    download_prefix: String,
    merged_extension: String,
}

impl MergeOrchestrator {
    pub fn new(store: ArtifactStore, engine: Arc<dyn MergeEngine>) -> Self {
        Self {
            store,
            engine,
            download_prefix: "/download".into(),
            merged_extension: "cs".into(),
        }
    }

    /// Prefix for download references (`<prefix>/<artifact id>`).
    pub fn with_download_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.download_prefix = prefix.into().trim_end_matches('/').to_string();
        self
    }

    /// Extension given to merged and final outputs.
    ///
    /// Must be 1 to 16 ASCII alphanumerics, as enforced by
    /// [`AppConfig::validate`](crate::config::AppConfig::validate). The store
    /// drops any other extension.
    pub fn with_merged_extension(mut self, extension: impl Into<String>) -> Self {
        let extension = extension.into();
        debug_assert!(
            is_valid_extension(&extension),
            "invalid merged extension {:?}",
            extension
        );
        self.merged_extension = extension;
        self
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// First pass: merge `left` and `right` and report conflicts.
    #[instrument(skip_all)]
    pub async fn detect(&self, left: InputFile, right: InputFile) -> Result<MergeResult, MergeError> {
        let left = self.stage_input(&left).await?;
        let right = self.stage_input(&right).await?;

        self.run(vec![left.path, right.path], ArtifactKind::Merged)
            .await
    }

    /// Second pass: merge again, passing the caller's decisions to the engine.
    #[instrument(skip_all, fields(resolutions = resolutions.len()))]
    pub async fn resolve(
        &self,
        left: InputFile,
        right: InputFile,
        resolutions: &[Resolution],
    ) -> Result<MergeResult, MergeError> {
        let left = self.stage_input(&left).await?;
        let right = self.stage_input(&right).await?;
        let decisions = self
            .store
            .stage_json(resolutions, ArtifactKind::Resolution, Some(RESOLUTIONS_NAME))
            .await?;
        debug!(id = %decisions.id, "staged resolutions");

        self.run(
            vec![left.path, right.path, decisions.path],
            ArtifactKind::Final,
        )
        .await
    }

    /// Fetch a previously produced or staged artifact.
    pub async fn retrieve(&self, artifact_id: &str) -> Result<Vec<u8>, StoreError> {
        let result = self.store.read(artifact_id).await;
        if let Err(StoreError::NotFound(_)) = &result {
            debug!(artifact_id, "artifact not found");
        }
        result
    }

    async fn stage_input(&self, input: &InputFile) -> Result<ArtifactRef, StoreError> {
        self.store
            .stage(&input.bytes, ArtifactKind::Input, input.file_name.as_deref())
            .await
    }

    async fn run(&self, paths: Vec<PathBuf>, kind: ArtifactKind) -> Result<MergeResult, MergeError> {
        let output = self.engine.invoke(&paths).await?;

        if !output.success() {
            warn!(exit_code = output.exit_code, %kind, "merge engine reported failure");
            return Err(MergeError::EngineFailed {
                exit_code: output.exit_code,
                diagnostics: output.stderr.trim().to_string(),
            });
        }

        let conflicts = parse_conflict_log(&output.stderr);
        let suggested = format!("{}.{}", kind, self.merged_extension);
        let merged = self
            .store
            .stage(&output.stdout, kind, Some(&suggested))
            .await?;

        info!(
            artifact = %merged.id,
            %kind,
            conflicts = conflicts.len(),
            "merge completed"
        );

        Ok(MergeResult {
            download_reference: format!("{}/{}", self.download_prefix, merged.id),
            merged_artifact_id: merged.id.to_string(),
            conflicts,
            kind,
        })
    }
}

fn is_valid_extension(extension: &str) -> bool {
    !extension.is_empty()
        && extension.len() <= MAX_EXTENSION_LEN
        && extension.chars().all(|c| c.is_ascii_alphanumeric())
}
