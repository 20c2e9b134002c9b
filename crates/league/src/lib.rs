//! Incremental synchronisation of a sim-racing league into parquet tables.
//!
//! The [`Pipeline`] walks league → roster → seasons → sessions → results →
//! lap data through a [`Fetcher`], skips subsessions the [`DedupGate`] has
//! already seen, and hands everything else to the table store as shards.

pub mod error;
mod fetch;
mod gate;
pub mod models;
mod pipeline;

pub use crate::fetch::Fetcher;
pub use crate::gate::DedupGate;
pub use crate::pipeline::{Context, Pipeline, Summary, consolidate};
