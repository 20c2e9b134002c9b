//! Cached access to the remote league data API.
//!
//! The crate exposes the catalogue of consumed endpoints ([`Request`]), the
//! per-entity caching classes ([`Freshness`], [`TtlPolicy`]) and the
//! [`DataSource`] seam with an HTTP implementation backed by an on-disk
//! [`ResponseCache`]. Enable the `mock` feature for an in-memory source.

pub mod backend;
mod cache;
pub mod error;
mod request;

pub use crate::backend::DataSource;
pub use crate::cache::ResponseCache;
pub use crate::request::{Freshness, Participant, Request, TtlPolicy};
use std::sync::Arc;

pub type SourceHandle = Arc<dyn DataSource + Send + Sync>;
