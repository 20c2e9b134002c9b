//! Catalogue of the remote resources the league pipeline consumes.
//!
//! Every endpoint has a fixed [`Freshness`] class. League-level resources
//! change between runs (new seasons, newly scheduled sessions) so they are
//! only cached for a short while; results and lap data never change once a
//! race has finished and are effectively cached forever.

use std::fmt;
use std::time::Duration;

const HOUR: u64 = 60 * 60;
/// Four years. Long enough that a completed race is never fetched twice.
const IMMUTABLE_SECS: u64 = 4 * 365 * 24 * HOUR;

/// How often the resource behind a [`Request`] is expected to change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Freshness {
    /// May change between runs.
    Volatile,
    /// Never changes once it exists.
    Immutable,
}

/// Maps a [`Freshness`] class onto the cache time-to-live requested from a
/// [`DataSource`](crate::DataSource).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TtlPolicy {
    pub volatile: Duration,
    pub immutable: Duration,
}
impl Default for TtlPolicy {
    fn default() -> Self {
        Self {
            volatile: Duration::from_secs(HOUR),
            immutable: Duration::from_secs(IMMUTABLE_SECS),
        }
    }
}
impl TtlPolicy {
    pub fn ttl(&self, freshness: Freshness) -> Duration {
        match freshness {
            Freshness::Volatile => self.volatile,
            Freshness::Immutable => self.immutable,
        }
    }
}

/// Whose laps a lap data request asks for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Participant {
    Driver(i64),
    Team(i64),
}
impl Participant {
    pub fn id(&self) -> i64 {
        match self {
            Self::Driver(id) | Self::Team(id) => *id,
        }
    }
}
impl fmt::Display for Participant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Driver(id) => write!(f, "cust_id={id}"),
            Self::Team(id) => write!(f, "team_id={id}"),
        }
    }
}

/// A single GET against the league data API.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Request {
    League { league_id: u64 },
    Roster { league_id: u64 },
    /// Always includes retired seasons.
    Seasons { league_id: u64 },
    SeasonSessions { league_id: u64, season_id: i64 },
    Results { subsession_id: i64 },
    LapData {
        subsession_id: i64,
        simsession_number: i64,
        participant: Participant,
    },
}
impl Request {
    /// Resource path (including query string) relative to the API root.
    pub fn path(&self) -> String {
        match self {
            Self::League { league_id } => format!("/data/league/get?league_id={league_id}"),
            Self::Roster { league_id } => format!("/data/league/roster?league_id={league_id}"),
            Self::Seasons { league_id } => format!("/data/league/seasons?league_id={league_id}&retired=true"),
            Self::SeasonSessions { league_id, season_id } => {
                format!("/data/league/season_sessions?league_id={league_id}&season_id={season_id}")
            },
            Self::Results { subsession_id } => format!("/data/results/get?subsession_id={subsession_id}"),
            Self::LapData {
                subsession_id,
                simsession_number,
                participant,
            } => format!(
                "/data/results/lap_data?subsession_id={subsession_id}&simsession_number={simsession_number}&{participant}"
            ),
        }
    }

    pub fn freshness(&self) -> Freshness {
        match self {
            Self::League { .. } | Self::Roster { .. } | Self::Seasons { .. } | Self::SeasonSessions { .. } => {
                Freshness::Volatile
            },
            Self::Results { .. } | Self::LapData { .. } => Freshness::Immutable,
        }
    }

    /// Entity name, for diagnostics.
    pub fn entity(&self) -> &'static str {
        match self {
            Self::League { .. } => "league",
            Self::Roster { .. } => "roster",
            Self::Seasons { .. } => "seasons",
            Self::SeasonSessions { .. } => "sessions",
            Self::Results { .. } => "results",
            Self::LapData { .. } => "lap_data",
        }
    }
}
