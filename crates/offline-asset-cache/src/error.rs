//! Error types for the offline asset cache

use asset_cache_store::StoreError;
use std::fmt;

#[derive(Debug)]
pub enum WorkerError {
    /// A required manifest URL could not be fetched or stored
    InstallFailed(String),
    /// A stale store could not be deleted; logged during activation, never returned by it
    ActivationCleanupFailed { cache_name: String, reason: String },
    /// Cache miss followed by a network failure
    FetchFailed { url: String, reason: String },
    /// The requester aborted the fetch
    Cancelled,
    /// The lifecycle does not allow the operation in the current state
    State(String),
    Manifest(String),
    /// A cache store could not be opened or updated
    Store(StoreError),
    NoHandler(String),
}

impl fmt::Display for WorkerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerError::InstallFailed(msg) => write!(f, "Install failed: {}", msg),
            WorkerError::ActivationCleanupFailed { cache_name, reason } => {
                write!(f, "Failed to delete stale cache {}: {}", cache_name, reason)
            }
            WorkerError::FetchFailed { url, reason } => {
                write!(f, "Fetch failed for {}: {}", url, reason)
            }
            WorkerError::Cancelled => write!(f, "Fetch cancelled"),
            WorkerError::State(msg) => write!(f, "Invalid worker state: {}", msg),
            WorkerError::Manifest(msg) => write!(f, "Manifest error: {}", msg),
            WorkerError::Store(err) => write!(f, "Cache store error: {}", err),
            WorkerError::NoHandler(kind) => write!(f, "No handler registered for {} events", kind),
        }
    }
}

impl std::error::Error for WorkerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WorkerError::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for WorkerError {
    fn from(err: StoreError) -> Self {
        WorkerError::Store(err)
    }
}

impl From<serde_json::Error> for WorkerError {
    fn from(err: serde_json::Error) -> Self {
        WorkerError::Manifest(err.to_string())
    }
}

impl From<url::ParseError> for WorkerError {
    fn from(err: url::ParseError) -> Self {
        WorkerError::Manifest(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, WorkerError>;
