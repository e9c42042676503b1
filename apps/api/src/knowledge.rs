//! Startup loader for the company-knowledge blob.
//!
//! The blob is plain text describing MakerMon's services and is read once at
//! startup. It is immutable afterwards and shared read-only across sessions.

use std::path::Path;

use tracing::{info, warn};

/// Returned when the knowledge file cannot be read. The guest persona still
/// works, it just has nothing concrete to ground answers in.
pub const FALLBACK_KNOWLEDGE: &str =
    "The company knowledge base is currently unavailable. \
    Ask the visitor to use the contact form on the official website.";

/// Reads the knowledge blob from `path`, falling back to a fixed string on
/// any I/O failure. Never fails startup.
pub fn load(path: &Path) -> String {
    match std::fs::read_to_string(path) {
        Ok(text) => {
            info!("Loaded company knowledge ({} bytes)", text.len());
            text
        }
        Err(e) => {
            warn!("Could not read knowledge file {}: {e}", path.display());
            FALLBACK_KNOWLEDGE.to_string()
        }
    }
}
