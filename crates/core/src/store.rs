//! Ephemeral artifact staging area.
//!
//! Every artifact lives as a single file directly under the store root. Its
//! name is generated here (`<kind>_<uuid>[.<ext>]`), never taken from the
//! caller, so two requests can never collide and no identifier can escape the
//! root.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::errors::StoreError;

/// Longest extension carried over from a suggested file name.
pub(crate) const MAX_EXTENSION_LEN: usize = 16;
/// Longest identifier accepted from a caller.
const MAX_ID_LEN: usize = 128;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// What an artifact holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// An uploaded file revision.
    Input,
    /// A serialized resolutions document.
    Resolution,
    /// Engine output from the detect phase.
    Merged,
    /// Engine output from the resolve phase.
    Final,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Resolution => "resolution",
            Self::Merged => "merged",
            Self::Final => "final",
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated artifact identifier: a bare file name inside the store root.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactId(String);

impl ArtifactId {
    fn generate(kind: ArtifactKind, extension: Option<&str>) -> Self {
        let token = Uuid::new_v4().simple();
        match extension {
            Some(ext) => Self(format!("{}_{}.{}", kind, token, ext)),
            None => Self(format!("{}_{}", kind, token)),
        }
    }

    /// Accept a caller-supplied identifier only if it is a plain file name
    /// made of `[A-Za-z0-9_.-]`, with no leading dot and no `..`.
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.is_empty() || raw.len() > MAX_ID_LEN {
            return None;
        }
        if raw.starts_with('.') || raw.contains("..") {
            return None;
        }
        if !raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        {
            return None;
        }
        Some(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Handle to a staged artifact.
#[derive(Debug, Clone)]
pub struct ArtifactRef {
    pub id: ArtifactId,
    pub kind: ArtifactKind,
    pub path: PathBuf,
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Filesystem-backed artifact store shared by all requests.
///
/// Cloning is cheap; clones address the same root.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Open the store at `root`, creating the directory if needed.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        info!(root = %root.display(), "artifact store ready");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write `bytes` as a new artifact of `kind`.
    ///
    /// `suggested_name` only contributes its extension, and only when that
    /// extension is short and alphanumeric.
    #[instrument(skip(self, bytes, kind), fields(kind = %kind, len = bytes.len()))]
    pub async fn stage(
        &self,
        bytes: &[u8],
        kind: ArtifactKind,
        suggested_name: Option<&str>,
    ) -> Result<ArtifactRef, StoreError> {
        let extension = suggested_name.and_then(sanitized_extension);
        let id = ArtifactId::generate(kind, extension.as_deref());
        self.write_atomic(&id, bytes).await?;

        debug!(id = %id, "staged artifact");
        Ok(ArtifactRef {
            path: self.root.join(id.as_str()),
            id,
            kind,
        })
    }

    /// Serialize `value` as JSON and stage it.
    pub async fn stage_json<T: Serialize + ?Sized>(
        &self,
        value: &T,
        kind: ArtifactKind,
        suggested_name: Option<&str>,
    ) -> Result<ArtifactRef, StoreError> {
        let bytes = serde_json::to_vec(value).map_err(|source| StoreError::Serialize {
            name: suggested_name.unwrap_or(kind.as_str()).to_string(),
            source,
        })?;
        self.stage(&bytes, kind, suggested_name).await
    }

    /// Location of a staged artifact on disk.
    pub fn path(&self, artifact: &ArtifactRef) -> PathBuf {
        self.root.join(artifact.id.as_str())
    }

    /// Whether `id` names a readable artifact.
    pub async fn exists(&self, id: &str) -> bool {
        match ArtifactId::parse(id) {
            Some(id) => tokio::fs::metadata(self.root.join(id.as_str()))
                .await
                .map(|m| m.is_file())
                .unwrap_or(false),
            None => false,
        }
    }

    /// Read an artifact's bytes.
    ///
    /// Unknown, malformed and evicted identifiers all yield
    /// [`StoreError::NotFound`].
    #[instrument(skip(self))]
    pub async fn read(&self, id: &str) -> Result<Vec<u8>, StoreError> {
        let parsed = ArtifactId::parse(id).ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        let path = self.root.join(parsed.as_str());

        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return Err(StoreError::NotFound(id.to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(id.to_string()))
            }
            Err(e) => return Err(StoreError::Io(e)),
        }

        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(id.to_string()))
            }
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    /// Delete every file under the root last modified at least `max_age` ago.
    /// Returns the number of files removed.
    #[instrument(skip(self))]
    pub async fn evict_older_than(&self, max_age: Duration) -> Result<usize, StoreError> {
        let now = SystemTime::now();
        let mut removed = 0;

        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(StoreError::Io(e)),
        };

        while let Some(entry) = entries.next_entry().await? {
            let meta = match entry.metadata().await {
                Ok(meta) if meta.is_file() => meta,
                Ok(_) => continue,
                // Raced with another sweeper or a rename.
                Err(_) => continue,
            };
            let age = meta
                .modified()
                .ok()
                .and_then(|t| now.duration_since(t).ok())
                .unwrap_or(Duration::ZERO);
            if age < max_age {
                continue;
            }
            match tokio::fs::remove_file(entry.path()).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(path = %entry.path().display(), error = %e, "failed to evict artifact")
                }
            }
        }

        if removed > 0 {
            info!(removed, "evicted expired artifacts");
        }
        Ok(removed)
    }

    /// Write to a hidden temp file, then rename it into place so readers never
    /// observe a partial artifact.
    async fn write_atomic(&self, id: &ArtifactId, bytes: &[u8]) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.root).await?;

        let final_path = self.root.join(id.as_str());
        let tmp_path = self.root.join(format!(".{}.tmp", id));

        if let Err(e) = tokio::fs::write(&tmp_path, bytes).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(StoreError::Io(e));
        }
        if let Err(e) = tokio::fs::rename(&tmp_path, &final_path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(StoreError::Io(e));
        }
        Ok(())
    }
}

fn sanitized_extension(name: &str) -> Option<String> {
    let ext = Path::new(name).extension()?.to_str()?;
    if ext.is_empty()
        || ext.len() > MAX_EXTENSION_LEN
        || !ext.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return None;
    }
    Some(ext.to_string())
}
