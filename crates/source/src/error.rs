//! Source Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A data source error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for data source operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The HTTP client could not be constructed (bad base URL, bad token).
    #[display("invalid client configuration: {_0}")]
    Client(#[error(not(source))] String),
    /// The request never produced a response (DNS, TLS, timeout, ...).
    #[display("request failed: {_0}")]
    Transport(#[error(not(source))] String),
    /// The remote API answered with a non-success status.
    #[display("request {path} returned HTTP {status}")]
    Status { path: String, status: u16 },
    /// The response body (or one of its linked documents) is not the JSON
    /// shape a response envelope requires.
    #[display("invalid JSON response: {_0}")]
    InvalidJson(#[error(not(source))] String),
    /// Reading or writing the on-disk response cache failed.
    #[display("response cache error: {}", _0.display())]
    Cache(#[error(not(source))] PathBuf),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
