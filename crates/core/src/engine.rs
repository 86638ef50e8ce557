//! External merge engine invocation.
//!
//! The engine is modelled as `(paths) -> (stdout, stderr, exit code)` behind
//! the [`MergeEngine`] trait. [`ProcessEngine`] is the production
//! implementation: one child process per call.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, instrument, warn};

use crate::config::EngineConfig;
use crate::errors::EngineError;

/// Captured result of one engine run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOutput {
    /// Merged output, byte for byte.
    pub stdout: Vec<u8>,
    /// Diagnostics, possibly containing a conflict block. Decoded lossily.
    pub stderr: String,
    /// Process exit code; `-1` when the process was killed by a signal.
    pub exit_code: i32,
}

impl EngineOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Anything that can merge two files, optionally guided by a resolutions
/// document.
#[async_trait]
pub trait MergeEngine: Send + Sync {
    /// Run the engine on `paths` (left, right, and optionally resolutions).
    ///
    /// A non-zero exit is returned as an [`EngineOutput`], not an error.
    async fn invoke(&self, paths: &[PathBuf]) -> Result<EngineOutput, EngineError>;
}

/// Runs the engine as `program args... <paths...>`.
#[derive(Debug, Clone)]
pub struct ProcessEngine {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl ProcessEngine {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.program.clone(), config.args.clone(), config.timeout())
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

#[async_trait]
impl MergeEngine for ProcessEngine {
    #[instrument(skip(self), fields(program = %self.program))]
    async fn invoke(&self, paths: &[PathBuf]) -> Result<EngineOutput, EngineError> {
        if !(2..=3).contains(&paths.len()) {
            return Err(EngineError::Arity(paths.len()));
        }

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .args(paths)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(args = ?self.args, inputs = paths.len(), "running merge engine");
        let child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                EngineError::BinaryNotFound(self.program.clone())
            } else {
                EngineError::Io(e)
            }
        })?;

        // Dropping the wait future on timeout drops the child, which kills it.
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(timeout_secs = self.timeout.as_secs(), "merge engine timed out");
                return Err(EngineError::Timeout {
                    secs: self.timeout.as_secs(),
                });
            }
        };

        let exit_code = output.status.code().unwrap_or(-1);
        if !output.status.success() {
            warn!(exit_code, "merge engine exited with failure");
        }

        Ok(EngineOutput {
            stdout: output.stdout,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code,
        })
    }
}
