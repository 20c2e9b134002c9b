//! Typed access to the league data endpoints.

use crate::error::{ErrorKind, Result};
use crate::models::{LapData, League, Member, Roster, Season, SeasonSessions, Seasons, Session, Subsession};
use exn::ResultExt;
use paddock_source::{Participant, Request, SourceHandle, TtlPolicy};
use serde::de::DeserializeOwned;
use tracing::debug;

/// Issues one cached GET per entity and validates the response shape.
///
/// The cache TTL of every request follows its [`Freshness`] class.
///
/// [`Freshness`]: paddock_source::Freshness
pub struct Fetcher {
    source: SourceHandle,
    ttl: TtlPolicy,
}

impl Fetcher {
    pub fn new(source: SourceHandle, ttl: TtlPolicy) -> Self {
        Self { source, ttl }
    }

    async fn fetch<T: DeserializeOwned>(&self, request: Request) -> Result<T> {
        let path = request.path();
        let ttl = self.ttl.ttl(request.freshness());
        debug!(entity = request.entity(), %path, ttl_secs = ttl.as_secs(), source = self.source.name(), "fetching");
        let body = self
            .source
            .get(&path, ttl)
            .await
            .or_raise(|| ErrorKind::Fetch(path.clone()))?;
        serde_json::from_slice(&body).or_raise(|| ErrorKind::Shape(path))
    }

    pub async fn league(&self, league_id: u64) -> Result<League> {
        self.fetch(Request::League { league_id }).await
    }

    pub async fn roster(&self, league_id: u64) -> Result<Vec<Member>> {
        let roster: Roster = self.fetch(Request::Roster { league_id }).await?;
        Ok(roster.roster)
    }

    /// All seasons of the league, retired ones included.
    pub async fn seasons(&self, league_id: u64) -> Result<Vec<Season>> {
        let seasons: Seasons = self.fetch(Request::Seasons { league_id }).await?;
        Ok(seasons.seasons)
    }

    pub async fn sessions(&self, league_id: u64, season_id: i64) -> Result<Vec<Session>> {
        let sessions: SeasonSessions = self.fetch(Request::SeasonSessions { league_id, season_id }).await?;
        Ok(sessions.sessions)
    }

    pub async fn subsession(&self, subsession_id: i64) -> Result<Subsession> {
        self.fetch(Request::Results { subsession_id }).await
    }

    pub async fn lap_data(&self, subsession_id: i64, simsession_number: i64, participant: Participant) -> Result<LapData> {
        self.fetch(Request::LapData { subsession_id, simsession_number, participant })
            .await
    }
}
