//! Extraction of the structured conflict block from engine diagnostics.
//!
//! The engine writes free-form text to stderr. Somewhere in it there may be a
//! single JSON array wrapped in sentinel lines:
//!
//! ```text
//! ===MERGEAI_CONFLICTS_START===
//! [ { "Type": "method", ... } ]
//! ===MERGEAI_CONFLICTS_END===
//! ```
//!
//! Parsing never fails. No block means no conflicts; a block that does not
//! decode becomes one synthetic `error` conflict so the merged output is still
//! delivered.

use std::sync::OnceLock;

use regex_lite::Regex;
use tracing::{debug, warn};

use crate::models::Conflict;

pub const CONFLICTS_START: &str = "===MERGEAI_CONFLICTS_START===";
pub const CONFLICTS_END: &str = "===MERGEAI_CONFLICTS_END===";

fn conflict_block() -> &'static Regex {
    static BLOCK: OnceLock<Regex> = OnceLock::new();
    BLOCK.get_or_init(|| {
        let pattern = format!(
            "(?s){}(.*?){}",
            regex_lite::escape(CONFLICTS_START),
            regex_lite::escape(CONFLICTS_END)
        );
        Regex::new(&pattern).expect("conflict block pattern is valid")
    })
}

/// Return the text between the first START/END marker pair, untrimmed.
pub fn extract_conflict_block(diagnostics: &str) -> Option<&str> {
    conflict_block()
        .captures(diagnostics)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Decode the conflicts reported in `diagnostics`.
pub fn parse_conflict_log(diagnostics: &str) -> Vec<Conflict> {
    let Some(block) = extract_conflict_block(diagnostics) else {
        debug!("no conflict block in engine diagnostics");
        return Vec::new();
    };

    match serde_json::from_str::<Vec<Conflict>>(block.trim()) {
        Ok(conflicts) => {
            debug!(count = conflicts.len(), "decoded conflict block");
            conflicts
        }
        Err(e) => {
            warn!(error = %e, "conflict block is not a JSON array");
            vec![Conflict::decode_error(format!("Failed to parse logs: {}", e))]
        }
    }
}
