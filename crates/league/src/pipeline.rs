//! The top-down league traversal.
//!
//! League, roster and seasons are re-derived on every run. Each season's
//! sessions become one shard; each session with results becomes one sealed
//! batch holding its per-simsession results and per-participant lap data.
//! Sessions and results are consolidated after every season, every family
//! again at the end.

use crate::error::{ErrorKind, Result};
use crate::fetch::Fetcher;
use crate::gate::DedupGate;
use crate::models::Session;
use exn::{OptionExt, ResultExt};
use paddock_source::{Request, SourceHandle, TtlPolicy};
use paddock_table::{Manifest, MergeOutcome, Scope, ShardId, Store, Table, season_batch, subsession_batch};
use serde::Serialize;
use std::fmt;
use tracing::{debug, info, instrument};

const SEASON_TABLES: [Table; 3] = [
    Table::Sessions,
    Table::Results(Scope::Individual),
    Table::Results(Scope::Team),
];

/// Everything a run needs, built once and shared by reference.
pub struct Context {
    pub league_id: u64,
    pub source: SourceHandle,
    pub ttl: TtlPolicy,
    pub store: Store,
}

/// What a run did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub seasons: usize,
    pub sessions: usize,
    pub processed: usize,
    pub skipped: usize,
    pub shards: usize,
    pub merges: usize,
}
impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} seasons, {} sessions, {} subsessions processed ({} skipped), {} shards, {} merges",
            self.seasons, self.sessions, self.processed, self.skipped, self.shards, self.merges
        )
    }
}

pub struct Pipeline<'c> {
    ctx: &'c Context,
    fetcher: Fetcher,
    manifest: Manifest,
    summary: Summary,
}

impl<'c> Pipeline<'c> {
    pub fn new(ctx: &'c Context) -> Self {
        Self {
            ctx,
            fetcher: Fetcher::new(ctx.source.clone(), ctx.ttl),
            manifest: Manifest::default(),
            summary: Summary::default(),
        }
    }

    /// Synchronises the league into the output directory.
    ///
    /// Any failure aborts the run. Whatever was sealed before the failure is
    /// merged by the next run; anything unsealed is fetched again.
    #[instrument(skip(self), fields(league_id = self.ctx.league_id))]
    pub async fn run(mut self) -> Result<Summary> {
        self.summary.merges += consolidate(&self.ctx.store)?;

        let league_id = self.ctx.league_id;
        let league = self.fetcher.league(league_id).await?;
        self.replace(Table::League, &league)?;
        let roster = self.fetcher.roster(league_id).await?;
        self.replace(Table::Roster, &roster)?;
        let seasons = self.fetcher.seasons(league_id).await?;
        self.replace(Table::Seasons, &seasons)?;

        for season in &seasons {
            self.season(season.season_id).await?;
            self.summary.seasons += 1;
        }
        self.merge(&Table::INCREMENTAL)?;

        info!(summary = %self.summary, "league synchronised");
        Ok(self.summary)
    }

    /// Recovers the output directory and merges every pending shard, without
    /// touching the network.
    pub fn consolidate(mut self) -> Result<Summary> {
        self.summary.merges += consolidate(&self.ctx.store)?;
        Ok(self.summary)
    }

    #[instrument(skip(self))]
    async fn season(&mut self, season_id: i64) -> Result<()> {
        let mut sessions = self.fetcher.sessions(self.ctx.league_id, season_id).await?;
        self.summary.sessions += sessions.len();
        for session in &mut sessions {
            session.league_season_id.get_or_insert(season_id);
        }

        if sessions.is_empty() {
            debug!("season has no sessions");
        } else {
            let id = ShardId::sessions(season_id);
            let mut batch = self
                .ctx
                .store
                .batch(season_batch(season_id))
                .or_raise(|| ErrorKind::Table(id.table()))?;
            batch.write(id, &sessions).or_raise(|| ErrorKind::Table(id.table()))?;
            let shards = batch.seal().or_raise(|| ErrorKind::Table(id.table()))?;
            self.record(shards);
        }

        for session in sessions.iter().filter(|session| session.has_results) {
            self.session(session).await?;
        }
        self.merge(&SEASON_TABLES)
    }

    /// Fetches and stores one session's results and lap data, unless the
    /// dedup gate has seen it already.
    async fn session(&mut self, session: &Session) -> Result<()> {
        let scope = session.scope();
        let sessions_path = Request::SeasonSessions {
            league_id: self.ctx.league_id,
            season_id: session.league_season_id.unwrap_or_default(),
        }
        .path();
        let subsession_id = session.subsession_id.ok_or_raise(|| ErrorKind::Shape(sessions_path))?;

        let gate = DedupGate::new(&self.ctx.store);
        if gate.already_processed(scope, subsession_id, &self.manifest)? {
            debug!(subsession_id, "already processed");
            self.summary.skipped += 1;
            return Ok(());
        }

        let subsession = self.fetcher.subsession(subsession_id).await?;
        let results_table = Table::Results(scope);
        let mut batch = self
            .ctx
            .store
            .batch(subsession_batch(scope, subsession_id))
            .or_raise(|| ErrorKind::Table(results_table))?;
        for mut result in subsession.session_results {
            let simsession = result.simsession_number;
            result.subsession_id = Some(subsession_id);
            for row in &result.results {
                let participant = row
                    .participant(scope)
                    .ok_or_raise(|| ErrorKind::Shape(Request::Results { subsession_id }.path()))?;
                let laps = self
                    .fetcher
                    .lap_data(subsession_id, simsession, participant)
                    .await?
                    .keyed(subsession_id, simsession, participant);
                let id = ShardId::lap_data(scope, subsession_id, simsession, participant.id());
                batch.write(id, &laps).or_raise(|| ErrorKind::Table(id.table()))?;
            }
            batch
                .write(ShardId::results(scope, subsession_id, simsession), &result)
                .or_raise(|| ErrorKind::Table(results_table))?;
        }
        let shards = batch.seal().or_raise(|| ErrorKind::Table(results_table))?;
        info!(subsession_id, table = %results_table, shards = shards.len(), "subsession stored");
        self.record(shards);
        self.summary.processed += 1;
        Ok(())
    }

    fn replace<T: Serialize + ?Sized>(&self, table: Table, record: &T) -> Result<()> {
        self.ctx.store.replace(table, record).or_raise(|| ErrorKind::Table(table))?;
        Ok(())
    }

    fn record(&mut self, shards: Vec<ShardId>) {
        self.summary.shards += shards.len();
        self.manifest.extend(shards);
    }

    fn merge(&mut self, tables: &[Table]) -> Result<()> {
        for &table in tables {
            let shards = self.manifest.take(table);
            let outcome = self.ctx.store.merge(table, &shards).or_raise(|| ErrorKind::Table(table))?;
            if let MergeOutcome::Merged { .. } = outcome {
                self.summary.merges += 1;
            }
        }
        Ok(())
    }
}

/// Recovers `store` and merges every shard a previous run left behind.
/// Returns the number of merges performed.
#[instrument(skip(store), fields(root = %store.root().display()))]
pub fn consolidate(store: &Store) -> Result<usize> {
    let mut manifest = store.recover().or_raise(|| ErrorKind::Store)?;
    let mut merges = 0;
    for table in manifest.tables() {
        let pending = manifest.take(table);
        let outcome = store.merge(table, &pending).or_raise(|| ErrorKind::Table(table))?;
        if let MergeOutcome::Merged { shards, rows } = outcome {
            info!(%table, shards, rows, "consolidated pending shards");
            merges += 1;
        }
    }
    Ok(merges)
}
