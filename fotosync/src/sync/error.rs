use std::io;

use thiserror::Error;

use super::progress::ProgressError;

/// Errors that end a session. Per-file upload failures never surface here; they stay
/// in the pending queue.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("cannot read {what}: {source}")]
    Configuration {
        what: String,
        #[source]
        source: io::Error,
    },
    #[error("progress store error: {0}")]
    Persistence(#[from] ProgressError),
    #[error("confirmation prompt failed: {0}")]
    Prompt(String),
}

impl SyncError {
    pub fn configuration(what: impl Into<String>, source: io::Error) -> Self {
        Self::Configuration {
            what: what.into(),
            source,
        }
    }
}
