//! Error types for the docscanner worker

use asset_cache_store::StoreError;
use asset_fetcher::FetchError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use offline_asset_cache::WorkerError;
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum ServerError {
    Config(String),
    BadRequest(String),
    Worker(WorkerError),
    Store(StoreError),
    Fetch(FetchError),
    Io(Box<std::io::Error>),
    Internal(String),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerError::Config(msg) => write!(f, "Configuration error: {}", msg),
            ServerError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ServerError::Worker(err) => write!(f, "Worker error: {}", err),
            ServerError::Store(err) => write!(f, "Cache store error: {}", err),
            ServerError::Fetch(err) => write!(f, "Network error: {}", err),
            ServerError::Io(err) => write!(f, "IO error: {}", err),
            ServerError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServerError::Worker(err) => Some(err),
            ServerError::Store(err) => Some(err),
            ServerError::Fetch(err) => Some(err),
            ServerError::Io(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<WorkerError> for ServerError {
    fn from(err: WorkerError) -> Self {
        ServerError::Worker(err)
    }
}

impl From<StoreError> for ServerError {
    fn from(err: StoreError) -> Self {
        ServerError::Store(err)
    }
}

impl From<FetchError> for ServerError {
    fn from(err: FetchError) -> Self {
        ServerError::Fetch(err)
    }
}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        ServerError::Io(Box::new(err))
    }
}

impl From<tracing_subscriber::filter::ParseError> for ServerError {
    fn from(err: tracing_subscriber::filter::ParseError) -> Self {
        ServerError::Config(err.to_string())
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ServerError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            // A failed network fetch surfaces as the request's own failure
            ServerError::Worker(err @ WorkerError::FetchFailed { .. }) => {
                (StatusCode::BAD_GATEWAY, err.to_string())
            }
            ServerError::Worker(err @ WorkerError::State(_)) => {
                (StatusCode::SERVICE_UNAVAILABLE, err.to_string())
            }
            // Fetches are only cancelled when the server shuts down
            ServerError::Worker(WorkerError::Cancelled) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Request cancelled".to_string(),
            ),
            other => {
                tracing::error!(error = %other, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, axum::Json(json!({ "error": message }))).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;
