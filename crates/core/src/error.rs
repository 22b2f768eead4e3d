use std::path::PathBuf;

use thiserror::Error;

/// Failures raised by host backends.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("Binary not found at {0}")]
    MissingBinary(PathBuf),
    #[error("Backend not found: {0}")]
    MissingBackend(String),
    #[error("Analysis backend error: {0}")]
    Backend(String),
    #[error("Failed to load snapshot {path}: {reason}")]
    Snapshot { path: PathBuf, reason: String },
    #[error("Decompilation failed for {name} @ 0x{address:08x}: {reason}")]
    Decompilation { name: String, address: u64, reason: String },
}

/// Failures that abort a whole search.
///
/// Everything that concerns a single candidate function is reported as an
/// event instead (see `search::SearchEvent`).
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("{message}")]
    QuerySyntax { message: String, valid_in_cpp: bool },
    #[error("'{0}' is not a valid argument of the form var=regex")]
    InvalidConstraint(String),
    #[error("Regex error {0}")]
    InvalidRegex(#[from] regex::Error),
    #[error("'{0}' is not a valid query variable")]
    UnknownVariable(String),
    #[error(transparent)]
    Host(#[from] HostError),
    #[error("Failed to build worker pool: {0}")]
    WorkerPool(String),
}
