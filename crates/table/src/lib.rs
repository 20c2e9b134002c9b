//! Parquet table store for league data.
//!
//! Small fetches become write-once shards; shards are merged into one parquet
//! file per table. Every step that publishes data is a rename, and merges are
//! journaled, so an interrupted run never leaves a table with partial or
//! duplicated rows.

mod batch;
pub mod error;
mod merge;
mod recover;
mod shard;
mod store;
mod table;

pub use batch::Batch;
pub use merge::MergeOutcome;
pub use shard::{Manifest, ShardId, season_batch, subsession_batch};
pub use store::Store;
pub use table::{Scope, Table};
