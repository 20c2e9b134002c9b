//! Shard naming and the in-run manifest of shards awaiting a merge.
//!
//! A shard is a small parquet file holding the rows one fetch produced. Shards
//! are grouped into batches (one directory each): the sessions of a season, or
//! everything fetched for one subsession. The file name encodes the table and
//! the natural key, so a directory listing is enough to rebuild the manifest
//! after a crash.

use crate::error::{ErrorKind, Result};
use crate::table::{Scope, Table};
use exn::{OptionExt, ResultExt};
use std::fmt;

pub(crate) const EXTENSION: &str = "parquet";

/// Natural key of the rows in a shard.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) enum ShardKey {
    /// All sessions of a league season.
    Season(i64),
    /// Result rows of one simulated session. Simsession numbers are signed:
    /// `0` is the race, practice and qualifying are negative.
    SimSession { subsession: i64, simsession: i64 },
    /// Lap events of one participant (driver or team) in one simsession.
    Lap { subsession: i64, simsession: i64, participant: i64 },
}
impl fmt::Display for ShardKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Season(season) => write!(f, "{season}"),
            Self::SimSession { subsession, simsession } => write!(f, "{subsession}_{simsession}"),
            Self::Lap { subsession, simsession, participant } => {
                write!(f, "{subsession}_{simsession}_{participant}")
            },
        }
    }
}

/// Name of the batch holding the sessions of a season.
pub fn season_batch(season_id: i64) -> String {
    format!("season-{season_id}")
}

/// Name of the batch holding the results and lap data of a subsession.
pub fn subsession_batch(scope: Scope, subsession_id: i64) -> String {
    format!("{}subsession-{subsession_id}", scope.prefix())
}

/// Identifies one shard file. Only valid table/key combinations can be built.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShardId {
    table: Table,
    key: ShardKey,
}
impl ShardId {
    pub fn sessions(season_id: i64) -> Self {
        Self { table: Table::Sessions, key: ShardKey::Season(season_id) }
    }

    pub fn results(scope: Scope, subsession: i64, simsession: i64) -> Self {
        Self {
            table: Table::Results(scope),
            key: ShardKey::SimSession { subsession, simsession },
        }
    }

    pub fn lap_data(scope: Scope, subsession: i64, simsession: i64, participant: i64) -> Self {
        Self {
            table: Table::LapData(scope),
            key: ShardKey::Lap { subsession, simsession, participant },
        }
    }

    pub fn table(&self) -> Table {
        self.table
    }

    pub fn subsession(&self) -> Option<i64> {
        match self.key {
            ShardKey::Season(_) => None,
            ShardKey::SimSession { subsession, .. } | ShardKey::Lap { subsession, .. } => Some(subsession),
        }
    }

    /// Result lineage of the shard. Session shards have none.
    pub fn scope(&self) -> Option<Scope> {
        match self.table {
            Table::Results(scope) | Table::LapData(scope) => Some(scope),
            _ => None,
        }
    }

    /// The batch directory this shard is staged and sealed in.
    pub fn batch(&self) -> String {
        match self.key {
            ShardKey::Season(season) => season_batch(season),
            ShardKey::SimSession { subsession, .. } | ShardKey::Lap { subsession, .. } => {
                subsession_batch(self.scope().unwrap_or(Scope::Individual), subsession)
            },
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}-{}.{EXTENSION}", self.table.name(), self.key)
    }

    /// Parses a shard file name found inside `batch`.
    ///
    /// The name must round-trip exactly: anything else in a batch directory is
    /// not ours to merge.
    pub fn parse(batch: &str, file_name: &str) -> Result<Self> {
        let invalid = || ErrorKind::InvalidShard(format!("{batch}/{file_name}"));
        let stem = file_name
            .strip_suffix(EXTENSION)
            .and_then(|stem| stem.strip_suffix('.'))
            .ok_or_raise(invalid)?;
        // Longest table name wins.
        let (table, key) = Table::INCREMENTAL
            .iter()
            .filter_map(|table| {
                stem.strip_prefix(table.name())
                    .and_then(|rest| rest.strip_prefix('-'))
                    .map(|key| (*table, key))
            })
            .max_by_key(|(table, _)| table.name().len())
            .ok_or_raise(invalid)?;
        let parts = key
            .split('_')
            .map(str::parse::<i64>)
            .collect::<std::result::Result<Vec<_>, _>>()
            .or_raise(invalid)?;
        let id = match (table, parts.as_slice()) {
            (Table::Sessions, [season]) => Self::sessions(*season),
            (Table::Results(scope), [subsession, simsession]) => Self::results(scope, *subsession, *simsession),
            (Table::LapData(scope), [subsession, simsession, participant]) => {
                Self::lap_data(scope, *subsession, *simsession, *participant)
            },
            _ => exn::bail!(invalid()),
        };
        if id.file_name() != file_name {
            exn::bail!(invalid());
        }
        if id.batch() != batch {
            exn::bail!(ErrorKind::ForeignShard { shard: file_name.to_string(), owner: batch.to_string() });
        }
        Ok(id)
    }
}
impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.batch(), self.file_name())
    }
}

/// Shards written (or recovered) during a run that have not been merged yet.
#[derive(Clone, Debug, Default)]
pub struct Manifest {
    shards: Vec<ShardId>,
}
impl Manifest {
    pub fn record(&mut self, id: ShardId) {
        if !self.shards.contains(&id) {
            self.shards.push(id);
        }
    }

    pub fn extend(&mut self, ids: impl IntoIterator<Item = ShardId>) {
        for id in ids {
            self.record(id);
        }
    }

    /// Removes and returns every shard belonging to `table`.
    pub fn take(&mut self, table: Table) -> Vec<ShardId> {
        let (taken, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.shards)
            .into_iter()
            .partition(|id| id.table() == table);
        self.shards = kept;
        taken
    }

    /// Whether result rows for the subsession are waiting to be merged.
    pub fn contains_results(&self, scope: Scope, subsession_id: i64) -> bool {
        self.shards
            .iter()
            .any(|id| id.table() == Table::Results(scope) && id.subsession() == Some(subsession_id))
    }

    /// Distinct tables with pending shards, in catalogue order.
    pub fn tables(&self) -> Vec<Table> {
        Table::INCREMENTAL
            .into_iter()
            .filter(|table| self.shards.iter().any(|id| id.table() == *table))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.shards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.is_empty()
    }
}
