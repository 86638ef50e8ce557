//! MergeAI core library.
//!
//! This crate provides the orchestration around an external merge engine:
//! configuration, artifact staging, engine invocation, conflict log parsing,
//! and the two-phase (detect, resolve) merge workflow.

pub mod config;
pub mod conflict_log;
pub mod engine;
pub mod errors;
pub mod models;
pub mod orchestrator;
pub mod store;

// Re-exports for convenience.
pub use config::AppConfig;
pub use engine::{MergeEngine, ProcessEngine};
pub use orchestrator::MergeOrchestrator;
pub use store::ArtifactStore;
