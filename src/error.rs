//! Error types for mirror operations.

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while mirroring a public folder.
#[derive(Error, Debug)]
pub enum SyncError {
    /// I/O error during file operations.
    #[error(transparent)]
    IoError(#[from] io::Error),

    /// HTTP transport error during listing or download.
    #[error(transparent)]
    ReqwestError(#[from] reqwest::Error),

    /// JSON serialization/deserialization error.
    #[error(transparent)]
    SerdeJsonError(#[from] serde_json::Error),

    /// No response headers arrived within the request timeout.
    #[error("Request to {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    /// The server answered a download request with a non-success status.
    #[error("Request to {url} failed: HTTP {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
    },

    /// The run configuration cannot be used.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl SyncError {
    /// Whether another attempt of the same request may succeed.
    ///
    /// Connection failures, timeouts, broken transfers and 5xx answers are
    /// transient. Everything else (4xx, local I/O, bad JSON) is permanent.
    pub fn is_transient(&self) -> bool {
        match self {
            SyncError::Timeout { .. } => true,
            SyncError::HttpStatus { status, .. } => status.is_server_error(),
            SyncError::ReqwestError(e) => {
                e.is_connect() || e.is_timeout() || e.is_request() || e.is_body()
            }
            SyncError::IoError(_) | SyncError::SerdeJsonError(_) | SyncError::InvalidConfig(_) => {
                false
            }
        }
    }
}
