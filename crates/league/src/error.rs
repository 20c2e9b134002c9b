//! League Pipeline Error Types
//!
//! Every variant aborts the run: downstream merges assume the shard set they
//! consume is complete, so nothing is skipped silently.

use derive_more::{Display, Error};
use paddock_table::Table;

/// A pipeline error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The data source failed to deliver the resource at this path.
    #[display("failed to fetch {_0}")]
    Fetch(#[error(not(source))] String),
    /// The resource at this path does not have the fields the pipeline needs.
    #[display("unexpected response shape from {_0}")]
    Shape(#[error(not(source))] String),
    /// Reading, writing or merging a table failed.
    #[display("table operation failed: {_0}")]
    Table(#[error(not(source))] Table),
    /// The output directory could not be opened or recovered.
    #[display("output directory is unusable")]
    Store,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    ///
    /// A fetch failure may be transient; everything else needs a fix first.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Fetch(_))
    }
}
