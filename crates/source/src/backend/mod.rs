//! Data source trait and implementations.
//!
//! This module defines the [`DataSource`] trait, the single seam between the
//! league pipeline and the remote data API. The pipeline decides *what* to
//! ask for and *how stale* an answer it will accept; the source decides how
//! to get it (network, response cache, canned test data).

mod http;
#[cfg(feature = "mock")]
mod mock;

pub use self::http::HttpSource;
#[cfg(feature = "mock")]
pub use self::mock::MockSource;
use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Unified interface for data sources.
///
/// # Examples
///
/// ```no_run
/// use paddock_source::{DataSource, Request, TtlPolicy, error::Result};
///
/// async fn league_json(source: &dyn DataSource, league_id: u64) -> Result<Vec<u8>> {
///     let request = Request::League { league_id };
///     let ttl = TtlPolicy::default().ttl(request.freshness());
///     source.get(&request.path(), ttl).await
/// }
/// ```
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Name of the configured source (used for logging only).
    fn name(&self) -> &str;

    /// Fetch the JSON body for `path`.
    ///
    /// A cached answer younger than `ttl` may be returned instead of
    /// performing a request; a zero `ttl` always goes to the network.
    ///
    /// # Errors
    /// Transport failures, non-success statuses and malformed envelopes are
    /// all errors; there is no partial or empty fallback.
    async fn get(&self, path: &str, ttl: Duration) -> Result<Vec<u8>>;
}
