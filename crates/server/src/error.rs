// crates/server/src/error.rs
use std::path::PathBuf;

use taskfleet_core::ParseProgressError;
use thiserror::Error;

/// Errors that abort server startup.
///
/// Per-session errors never reach this type; a session failure only tears
/// down that session.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("progress file {path} is unreadable: {source}")]
    ReadProgress {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("progress file {path} is corrupt: {source}")]
    ParseProgress {
        path: PathBuf,
        #[source]
        source: ParseProgressError,
    },

    #[error("progress file {path} has floor {floor}, below the configured start {start_at}")]
    StaleProgress {
        path: PathBuf,
        floor: i64,
        start_at: u64,
    },
}
