//! The catalogue of consolidated tables.

use std::fmt;

/// Which lineage of result tables a subsession belongs to.
///
/// Sessions with driver changes are team events and land in the
/// `team-`prefixed tables; everything else lands in the individual tables.
/// A subsession id is only ever recorded under one scope.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scope {
    Individual,
    Team,
}
impl Scope {
    pub fn from_driver_changes(driver_changes: bool) -> Self {
        match driver_changes {
            true => Self::Team,
            false => Self::Individual,
        }
    }

    /// Table name prefix for this lineage.
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Individual => "",
            Self::Team => "team-",
        }
    }

    pub fn other(&self) -> Self {
        match self {
            Self::Individual => Self::Team,
            Self::Team => Self::Individual,
        }
    }
}

/// A consolidated table, stored as `<name>.parquet` in the output directory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Table {
    League,
    Roster,
    Seasons,
    Sessions,
    Results(Scope),
    LapData(Scope),
}
impl Table {
    /// Tables that grow by merging shards. The rest are replaced wholesale
    /// on every run.
    pub const INCREMENTAL: [Table; 5] = [
        Table::Sessions,
        Table::Results(Scope::Individual),
        Table::Results(Scope::Team),
        Table::LapData(Scope::Individual),
        Table::LapData(Scope::Team),
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::League => "league",
            Self::Roster => "roster",
            Self::Seasons => "seasons",
            Self::Sessions => "sessions",
            Self::Results(Scope::Individual) => "results",
            Self::Results(Scope::Team) => "team-results",
            Self::LapData(Scope::Individual) => "lap_data",
            Self::LapData(Scope::Team) => "team-lap_data",
        }
    }

    pub fn is_incremental(&self) -> bool {
        Self::INCREMENTAL.contains(self)
    }

    /// Column grouping rows that are replaced together on merge.
    ///
    /// A sessions shard is a full snapshot of one season, and sessions change
    /// after they are first seen (results arrive, schedules move), so rows of
    /// a season in the table are dropped whenever a shard brings that season
    /// again. Results and lap data are immutable and rely on the dedup gate
    /// never producing the same subsession twice.
    pub fn replace_key(&self) -> Option<&'static str> {
        match self {
            Self::Sessions => Some("league_season_id"),
            _ => None,
        }
    }
}
impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
