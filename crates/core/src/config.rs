//! TOML-based configuration system for MergeAI.
//!
//! Every section is optional; a missing file section falls back to defaults
//! that match a local development setup (engine built next to the backend,
//! artifacts under the system temp directory).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::ConfigError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level application configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Daemon settings.
    #[serde(default)]
    pub daemon: DaemonConfig,

    /// Artifact staging area.
    #[serde(default)]
    pub store: StoreConfig,

    /// External merge engine.
    #[serde(default)]
    pub engine: EngineConfig,

    /// HTTP transport.
    #[serde(default)]
    pub web: WebConfig,
}

// ---------------------------------------------------------------------------
// Daemon
// ---------------------------------------------------------------------------

/// Daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Minimum tracing level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Artifact store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding staged inputs and produced outputs.
    #[serde(default = "default_store_root")]
    pub root: PathBuf,

    /// Extension given to merged and final outputs (without the dot).
    #[serde(default = "default_merged_extension")]
    pub merged_extension: String,

    /// Artifacts older than this are evicted by the sweeper. `0` disables
    /// eviction.
    #[serde(default = "default_max_age")]
    pub max_age_secs: u64,

    /// Seconds between sweeper runs.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

fn default_store_root() -> PathBuf {
    std::env::temp_dir().join("mergeai")
}
fn default_merged_extension() -> String {
    "cs".into()
}
fn default_max_age() -> u64 {
    24 * 60 * 60
}
fn default_sweep_interval() -> u64 {
    600
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: default_store_root(),
            merged_extension: default_merged_extension(),
            max_age_secs: default_max_age(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

impl StoreConfig {
    /// Maximum artifact age, or `None` when eviction is disabled.
    pub fn max_age(&self) -> Option<Duration> {
        (self.max_age_secs > 0).then(|| Duration::from_secs(self.max_age_secs))
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// External merge engine configuration.
///
/// The engine is run as `program args... <left> <right> [<resolutions>]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Executable to launch.
    #[serde(default = "default_engine_program")]
    pub program: String,

    /// Leading arguments placed before the input paths.
    #[serde(default = "default_engine_args")]
    pub args: Vec<String>,

    /// Wall-clock bound for a single invocation.
    #[serde(default = "default_engine_timeout")]
    pub timeout_secs: u64,
}

fn default_engine_program() -> String {
    "dotnet".into()
}
fn default_engine_args() -> Vec<String> {
    vec!["../roslyn_merger/roslyn_merger/bin/Release/net9.0/roslyn_merger.dll".into()]
}
fn default_engine_timeout() -> u64 {
    120
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            program: default_engine_program(),
            args: default_engine_args(),
            timeout_secs: default_engine_timeout(),
        }
    }
}

impl EngineConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ---------------------------------------------------------------------------
// Web
// ---------------------------------------------------------------------------

/// HTTP transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    /// Listen address (default `127.0.0.1:8000`).
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Upper bound on a request body, uploads included.
    #[serde(default = "default_max_upload")]
    pub max_upload_bytes: usize,

    /// Path prefix used to build download references.
    #[serde(default = "default_download_prefix")]
    pub download_prefix: String,
}

fn default_listen() -> String {
    "127.0.0.1:8000".into()
}
fn default_max_upload() -> usize {
    10 * 1024 * 1024
}
fn default_download_prefix() -> String {
    "/download".into()
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            max_upload_bytes: default_max_upload(),
            download_prefix: default_download_prefix(),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading & validation
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Load an [`AppConfig`] from a TOML file at the given path.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Validate that all values are present and sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.program.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "engine.program".into(),
                detail: "engine program must not be empty".into(),
            });
        }
        if self.engine.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "engine.timeout_secs".into(),
                detail: "engine timeout must be > 0".into(),
            });
        }
        let ext = &self.store.merged_extension;
        if ext.is_empty()
            || ext.len() > crate::store::MAX_EXTENSION_LEN
            || !ext.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return Err(ConfigError::InvalidValue {
                field: "store.merged_extension".into(),
                detail: format!(
                    "'{}' must be 1-{} alphanumeric characters",
                    ext,
                    crate::store::MAX_EXTENSION_LEN
                ),
            });
        }
        if self.store.max_age_secs > 0 && self.store.sweep_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "store.sweep_interval_secs".into(),
                detail: "sweep interval must be > 0 when eviction is enabled".into(),
            });
        }
        if self.web.max_upload_bytes == 0 {
            return Err(ConfigError::InvalidValue {
                field: "web.max_upload_bytes".into(),
                detail: "upload limit must be > 0".into(),
            });
        }
        if !self.web.download_prefix.starts_with('/') {
            return Err(ConfigError::InvalidValue {
                field: "web.download_prefix".into(),
                detail: "download prefix must start with '/'".into(),
            });
        }

        Ok(())
    }

    /// Convenience: load and validate in one call.
    pub fn load_and_validate<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load_from_file(path)?;
        config.validate()?;
        Ok(config)
    }
}
