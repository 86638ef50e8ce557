//! Domain model types shared by the orchestrator and the web API.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::store::ArtifactKind;

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// One uploaded file revision.
///
/// `file_name` is whatever the caller sent; it is only ever used to pick an
/// extension for the staged copy.
#[derive(Debug, Clone, Default)]
pub struct InputFile {
    pub file_name: Option<String>,
    pub bytes: Vec<u8>,
}

impl InputFile {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: Some(file_name.into()),
            bytes: bytes.into(),
        }
    }

    pub fn unnamed(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: None,
            bytes: bytes.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Resolutions
// ---------------------------------------------------------------------------

/// Which side wins for a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionChoice {
    /// Keep the left revision.
    #[serde(alias = "a")]
    A,
    /// Keep the right revision.
    #[serde(alias = "b")]
    B,
    /// Keep both revisions.
    #[serde(alias = "both")]
    Both,
}

impl std::fmt::Display for ResolutionChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::A => write!(f, "A"),
            Self::B => write!(f, "B"),
            Self::Both => write!(f, "Both"),
        }
    }
}

/// A caller decision for one engine-reported conflict.
///
/// Serializes with the `Id` / `Choice` casing the engine reads; both that
/// casing and lowercase keys are accepted on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    #[serde(rename = "Id", alias = "id")]
    pub id: i64,
    #[serde(rename = "Choice", alias = "choice")]
    pub choice: ResolutionChoice,
}

impl Resolution {
    pub fn new(id: i64, choice: ResolutionChoice) -> Self {
        Self { id, choice }
    }
}

// ---------------------------------------------------------------------------
// Conflicts
// ---------------------------------------------------------------------------

/// One engine-reported merge ambiguity.
///
/// The schema belongs to the engine, so the record is kept as whatever JSON
/// value the engine emitted and passed through untouched. The accessors
/// return `None` for records that are not objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Conflict(pub Value);

impl Conflict {
    /// Synthetic record standing in for an undecodable conflict payload.
    pub fn decode_error(message: impl Into<String>) -> Self {
        Self(json!({ "type": "error", "message": message.into() }))
    }

    /// The `type` field, if present and a string.
    pub fn kind(&self) -> Option<&str> {
        self.0.get("type").and_then(Value::as_str)
    }

    /// The `id` field, if present and an integer. The engine emits either
    /// `id` or `Id`.
    pub fn id(&self) -> Option<i64> {
        self.0
            .get("id")
            .or_else(|| self.0.get("Id"))
            .and_then(Value::as_i64)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Outcome of a successful detect or resolve call.
#[derive(Debug, Clone, Serialize)]
pub struct MergeResult {
    pub merged_artifact_id: String,
    pub conflicts: Vec<Conflict>,
    pub download_reference: String,
    /// `Merged` for detect, `Final` for resolve.
    #[serde(skip)]
    pub kind: ArtifactKind,
}
