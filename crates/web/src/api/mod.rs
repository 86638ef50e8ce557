//! REST API endpoint modules.

pub mod download;
pub mod merge;
pub mod status;
