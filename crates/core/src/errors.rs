//! Error types for the MergeAI core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them all for callers that want a
//! single error type.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Merge(#[from] MergeError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Artifact store errors
// ---------------------------------------------------------------------------

/// Errors from the artifact staging area.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The identifier does not name a stored artifact (unknown, malformed or
    /// evicted). Deliberately carries no filesystem detail.
    #[error("artifact not found: {0}")]
    NotFound(String),

    /// A value could not be serialized before staging.
    #[error("failed to serialize artifact '{name}': {source}")]
    Serialize {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    /// Underlying filesystem failure (root missing, permissions, disk full).
    #[error("artifact store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Engine errors
// ---------------------------------------------------------------------------

/// Errors raised while running the external merge engine.
///
/// A non-zero exit is *not* an `EngineError`: the invoker reports it through
/// [`EngineOutput`](crate::engine::EngineOutput) and the orchestrator decides
/// what it means.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine program was not found on `$PATH`.
    #[error("merge engine binary not found: {0}")]
    BinaryNotFound(String),

    /// The engine accepts two or three positional paths, nothing else.
    #[error("merge engine expects 2 or 3 input paths, got {0}")]
    Arity(usize),

    /// The engine did not finish within the configured deadline.
    #[error("merge engine timed out after {secs}s")]
    Timeout { secs: u64 },

    /// Spawning or waiting on the child process failed.
    #[error("merge engine I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Orchestration errors
// ---------------------------------------------------------------------------

/// Errors surfaced by [`MergeOrchestrator`](crate::orchestrator::MergeOrchestrator).
#[derive(Debug, Error)]
pub enum MergeError {
    /// The engine exited non-zero; `diagnostics` is its stderr, verbatim.
    #[error("{diagnostics}")]
    EngineFailed { exit_code: i32, diagnostics: String },

    /// The engine was killed after exceeding its deadline.
    #[error("merge engine timed out after {secs}s")]
    Timeout { secs: u64 },

    /// Inputs or outputs could not be written to the store.
    #[error("staging failed: {0}")]
    Staging(#[from] StoreError),

    /// The engine could not be started at all.
    #[error("engine invocation failed: {0}")]
    Engine(EngineError),
}

impl MergeError {
    /// Whether the failure was reported by the engine itself (non-zero exit or
    /// deadline) rather than by the infrastructure around it.
    pub fn is_engine_failure(&self) -> bool {
        matches!(self, Self::EngineFailed { .. } | Self::Timeout { .. })
    }
}

impl From<EngineError> for MergeError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Timeout { secs } => Self::Timeout { secs },
            other => Self::Engine(other),
        }
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let err = StoreError::NotFound("merged_abc.cs".into());
        assert_eq!(err.to_string(), "artifact not found: merged_abc.cs");

        let err = EngineError::Arity(4);
        assert_eq!(
            err.to_string(),
            "merge engine expects 2 or 3 input paths, got 4"
        );

        let err = MergeError::EngineFailed {
            exit_code: 1,
            diagnostics: "fatal: invalid syntax".into(),
        };
        assert_eq!(err.to_string(), "fatal: invalid syntax");

        let err = ConfigError::InvalidValue {
            field: "engine.program".into(),
            detail: "must not be empty".into(),
        };
        assert!(err.to_string().contains("engine.program"));
    }

    #[test]
    fn test_timeout_maps_to_engine_failure() {
        let err: MergeError = EngineError::Timeout { secs: 5 }.into();
        assert!(matches!(err, MergeError::Timeout { secs: 5 }));
        assert!(err.is_engine_failure());

        let err: MergeError = EngineError::BinaryNotFound("dotnet".into()).into();
        assert!(matches!(err, MergeError::Engine(_)));
        assert!(!err.is_engine_failure());

        let err: MergeError = StoreError::NotFound("x".into()).into();
        assert!(!err.is_engine_failure());
    }

    #[test]
    fn test_core_error_from_subsystem() {
        let core_err: CoreError = StoreError::NotFound("x".into()).into();
        assert!(matches!(core_err, CoreError::Store(_)));

        let core_err: CoreError = EngineError::Arity(1).into();
        assert!(matches!(core_err, CoreError::Engine(_)));
    }
}
