//! Typed records for the league data API.
//!
//! Each record names the fields the pipeline reads and keeps every other field
//! in a flattened `extra` map, so persisted rows carry the full remote shape.
//! Deserialization is where a response is validated: a missing or mistyped
//! named field fails the fetch.

mod lap;
mod league;
mod result;
mod season;
mod session;

pub use self::lap::LapData;
pub use self::league::{League, Member, Roster};
pub use self::result::{ResultRow, SimSessionResult, Subsession};
pub use self::season::{Season, Seasons};
pub use self::session::{SeasonSessions, Session};

/// Unnamed fields of a record.
pub type Extra = serde_json::Map<String, serde_json::Value>;
