//! Table Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A table store error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for table store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// A file the operation depends on does not exist.
    #[display("file not found: {}", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
    /// Shards are never rewritten; something already occupies this path.
    #[display("file already exists: {}", _0.display())]
    AlreadyExists(#[error(not(source))] PathBuf),
    /// Any other filesystem failure (permissions, full disk, ...).
    #[display("filesystem error: {}", _0.display())]
    Filesystem(#[error(not(source))] PathBuf),
    /// DuckDB failed to read, convert or write a table.
    #[display("database error")]
    Database,
    /// A record could not be turned into JSON rows.
    #[display("record could not be serialized")]
    Serialize,
    /// A file in the shard directory does not follow the shard naming scheme.
    #[display("not a shard: {_0}")]
    InvalidShard(#[error(not(source))] String),
    /// A shard was handed to a batch or table it does not belong to.
    #[display("shard {shard} does not belong to {owner}")]
    ForeignShard { shard: String, owner: String },
    /// A merge journal could not be written, read or replayed.
    #[display("merge journal error: {}", _0.display())]
    Journal(#[error(not(source))] PathBuf),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Filesystem(_))
    }
}
