//! Journaled merges of sealed shards into consolidated tables.
//!
//! A merge never edits a table in place: DuckDB writes the union of the
//! current table and the shards to `.tmp/`, a journal naming that output and
//! the consumed shards is made durable, and only then is the output renamed
//! over the table and the shards deleted. Recovery uses the journal to finish
//! or roll back whatever a crash interrupted.

use crate::error::{ErrorKind, Result};
use crate::shard::{EXTENSION, ShardId};
use crate::store::{PARQUET_OPTIONS, SHARDS_DIR, Store, exists, remove_file, sql_path};
use crate::table::Table;
use exn::ResultExt;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{ErrorKind as IoErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Nothing to merge; the table was not touched.
    Skipped,
    Merged { shards: usize, rows: u64 },
}

/// Paths are relative to the store root so an output directory can be moved
/// between a crash and the next run.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Journal {
    pub(crate) staged: PathBuf,
    pub(crate) shards: Vec<PathBuf>,
}

impl Store {
    pub(crate) fn journal_path(&self, table: Table) -> PathBuf {
        self.shards_dir().join(format!("{}.journal", table.name()))
    }

    /// Merges `shards` into `table`.
    ///
    /// Rows are combined by column name; a column missing from some inputs is
    /// null in their rows. For tables with a replace key, shard rows replace
    /// every row already in the table with the same key. Consumed shards are
    /// deleted.
    #[instrument(skip(self, shards), fields(table = %table, shards = shards.len()))]
    pub fn merge(&self, table: Table, shards: &[ShardId]) -> Result<MergeOutcome> {
        if shards.is_empty() {
            return Ok(MergeOutcome::Skipped);
        }
        if let Some(foreign) = shards.iter().find(|id| id.table() != table) {
            exn::bail!(ErrorKind::ForeignShard { shard: foreign.to_string(), owner: table.to_string() });
        }
        let consumed: Vec<PathBuf> = shards.iter().map(|id| self.shard_path(id)).collect();
        for path in &consumed {
            if !exists(path)? {
                exn::bail!(ErrorKind::NotFound(path.clone()));
            }
        }

        let target = self.table_path(table);
        let mut inputs = consumed.clone();
        if exists(&target)? {
            inputs.push(target.clone());
        }
        let staged = self.tmp_dir().join(format!("{}.{EXTENSION}", table.name()));
        remove_file(&staged)?;
        let sql = merge_sql(&inputs, &target, table.replace_key(), &staged);
        debug!(inputs = inputs.len(), "duckdb merge starting");
        self.conn.execute_batch(&sql).or_raise(|| ErrorKind::Database)?;

        let journal_path = self.journal_path(table);
        let journal = Journal {
            staged: self.relative(&staged),
            shards: consumed.iter().map(|path| self.relative(path)).collect(),
        };
        write_journal(&journal_path, &journal)?;
        fs::rename(&staged, &target).or_raise(|| ErrorKind::Filesystem(target.clone()))?;
        self.discard(&consumed)?;
        remove_file(&journal_path)?;

        let rows = self.row_count(table)?;
        info!(rows, "table merged");
        Ok(MergeOutcome::Merged { shards: shards.len(), rows })
    }

    /// Deletes consumed shards and any batch directory left empty.
    pub(crate) fn discard(&self, shards: &[PathBuf]) -> Result<()> {
        let mut batches: Vec<&Path> = Vec::new();
        for shard in shards {
            remove_file(shard)?;
            if let Some(batch) = shard.parent()
                && !batches.contains(&batch)
            {
                batches.push(batch);
            }
        }
        for batch in batches {
            match fs::remove_dir(batch) {
                Ok(()) => debug!(batch = %batch.display(), "batch drained"),
                // Shards of other tables in the same batch are still pending.
                Err(err) if err.kind() == IoErrorKind::DirectoryNotEmpty => {},
                Err(err) if err.kind() == IoErrorKind::NotFound => {},
                Err(err) => return Err(err).or_raise(|| ErrorKind::Filesystem(batch.to_path_buf())),
            }
        }
        Ok(())
    }

    pub(crate) fn relative(&self, path: &Path) -> PathBuf {
        path.strip_prefix(self.root()).unwrap_or(path).to_path_buf()
    }
}

fn merge_sql(inputs: &[PathBuf], merged: &Path, key: Option<&str>, staged: &Path) -> String {
    let list = inputs
        .iter()
        .map(|path| format!("'{}'", sql_path(path)))
        .collect::<Vec<_>>()
        .join(", ");
    let select = match key {
        None => format!("SELECT * FROM read_parquet([{list}], union_by_name = true)"),
        // `filename = '<merged>'` sorts false first, so shard rows take rank 1
        // and table rows survive only for keys no shard mentions.
        Some(key) => format!(
            "WITH unioned AS (
                 SELECT * FROM read_parquet([{list}], union_by_name = true, filename = true)
             ),
             ranked AS (
                 SELECT u.*, RANK() OVER (PARTITION BY {key} ORDER BY filename = '{merged}') AS rn
                 FROM unioned u
             )
             SELECT * EXCLUDE (rn, filename) FROM ranked WHERE rn = 1",
            merged = sql_path(merged),
        ),
    };
    format!("COPY ({select}) TO '{}' ({PARQUET_OPTIONS})", sql_path(staged))
}

fn write_journal(path: &Path, journal: &Journal) -> Result<()> {
    let error = || ErrorKind::Journal(path.to_path_buf());
    let partial = path.with_extension("journal.partial");
    let bytes = serde_json::to_vec(journal).or_raise(error)?;
    let mut file = fs::File::create(&partial).or_raise(error)?;
    file.write_all(&bytes).or_raise(error)?;
    file.sync_all().or_raise(error)?;
    fs::rename(&partial, path).or_raise(error)?;
    Ok(())
}

pub(crate) fn read_journal(path: &Path) -> Result<Journal> {
    let error = || ErrorKind::Journal(path.to_path_buf());
    let bytes = fs::read(path).or_raise(error)?;
    serde_json::from_slice(&bytes).or_raise(error)
}

pub(crate) fn is_journal(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "journal")
        && path.parent().and_then(Path::file_name).is_some_and(|dir| dir == SHARDS_DIR)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::shard::{season_batch, subsession_batch};
    use crate::store::tests::store;
    use crate::table::Scope;
    use serde_json::{Value, json};

    pub(crate) fn seal(store: &Store, batch: &str, shards: &[(ShardId, Value)]) -> Vec<ShardId> {
        let mut batch = store.batch(batch).unwrap();
        for (id, record) in shards {
            batch.write(*id, record).unwrap();
        }
        batch.seal().unwrap()
    }

    fn count(store: &Store, table: Table, predicate: &str) -> i64 {
        let sql = format!(
            "SELECT count(*) FROM read_parquet('{}') WHERE {predicate}",
            sql_path(&store.table_path(table))
        );
        store.conn.query_row(&sql, [], |row| row.get(0)).unwrap()
    }

    #[test]
    fn test_merge_nothing_is_noop() {
        let (_dir, store) = store();
        let table = Table::Results(Scope::Individual);
        assert_eq!(store.merge(table, &[]).unwrap(), MergeOutcome::Skipped);
        assert!(!store.exists(table).unwrap());
    }

    #[test]
    fn test_merge_nothing_keeps_existing_table() {
        let (_dir, store) = store();
        let table = Table::Results(Scope::Individual);
        let shards = seal(&store, &subsession_batch(Scope::Individual, 555), &[(
            ShardId::results(Scope::Individual, 555, 0),
            json!([{"subsession_id": 555, "cust_id": 1}, {"subsession_id": 555, "cust_id": 2}]),
        )]);
        store.merge(table, &shards).unwrap();
        let before = fs::read(store.table_path(table)).unwrap();

        assert_eq!(store.merge(table, &[]).unwrap(), MergeOutcome::Skipped);
        assert_eq!(fs::read(store.table_path(table)).unwrap(), before);
        assert_eq!(store.row_count(table).unwrap(), 2);
        assert!(!store.journal_path(table).exists());
    }

    #[test]
    fn test_merge_unions_by_name() {
        let (_dir, store) = store();
        let table = Table::Results(Scope::Individual);
        let shards = seal(&store, &subsession_batch(Scope::Individual, 555), &[
            (
                ShardId::results(Scope::Individual, 555, 0),
                json!([{"subsession_id": 555, "a": 1}, {"subsession_id": 555, "a": 2}]),
            ),
            (
                ShardId::results(Scope::Individual, 555, -1),
                json!([{"subsession_id": 555, "b": "x"}]),
            ),
        ]);
        let outcome = store.merge(table, &shards).unwrap();
        assert_eq!(outcome, MergeOutcome::Merged { shards: 2, rows: 3 });
        let columns = store.columns(table).unwrap();
        assert!(columns.iter().any(|c| c == "a") && columns.iter().any(|c| c == "b"));
        assert_eq!(count(&store, table, "a IS NULL"), 1);
        assert_eq!(count(&store, table, "b IS NULL"), 2);
    }

    #[test]
    fn test_merge_accumulates_and_deletes_shards() {
        let (_dir, store) = store();
        let table = Table::Results(Scope::Individual);
        for subsession in [555, 556] {
            let shards = seal(&store, &subsession_batch(Scope::Individual, subsession), &[(
                ShardId::results(Scope::Individual, subsession, 0),
                json!([{"subsession_id": subsession, "cust_id": 42}]),
            )]);
            store.merge(table, &shards).unwrap();
            for id in &shards {
                assert!(!store.shard_path(id).exists());
            }
        }
        assert_eq!(store.row_count(table).unwrap(), 2);
        assert!(!store.shards_dir().join("subsession-555").exists());
        assert!(!store.journal_path(table).exists());
        assert_eq!(fs::read_dir(store.tmp_dir()).unwrap().count(), 0);
    }

    #[test]
    fn test_merge_keeps_batch_with_pending_shards() {
        let (_dir, store) = store();
        let results = ShardId::results(Scope::Individual, 555, 0);
        let laps = ShardId::lap_data(Scope::Individual, 555, 0, 42);
        seal(&store, &subsession_batch(Scope::Individual, 555), &[
            (results, json!({"subsession_id": 555})),
            (laps, json!({"subsession_id": 555, "cust_id": 42})),
        ]);
        store.merge(Table::Results(Scope::Individual), &[results]).unwrap();
        assert!(store.shard_path(&laps).is_file());
        store.merge(Table::LapData(Scope::Individual), &[laps]).unwrap();
        assert!(!store.shards_dir().join("subsession-555").exists());
    }

    #[test]
    fn test_sessions_snapshot_replaces_season() {
        let (_dir, store) = store();
        let shards = seal(&store, &season_batch(10), &[(
            ShardId::sessions(10),
            json!([
                {"league_season_id": 10, "subsession_id": 555, "has_results": false},
                {"league_season_id": 10, "subsession_id": 556, "has_results": false},
            ]),
        )]);
        store.merge(Table::Sessions, &shards).unwrap();
        let shards = seal(&store, &season_batch(11), &[(
            ShardId::sessions(11),
            json!([{"league_season_id": 11, "subsession_id": 600, "has_results": true}]),
        )]);
        store.merge(Table::Sessions, &shards).unwrap();

        let shards = seal(&store, &season_batch(10), &[(
            ShardId::sessions(10),
            json!([
                {"league_season_id": 10, "subsession_id": 555, "has_results": true},
                {"league_season_id": 10, "subsession_id": 557, "has_results": false},
                {"league_season_id": 10, "has_results": false},
            ]),
        )]);
        let outcome = store.merge(Table::Sessions, &shards).unwrap();
        assert_eq!(outcome, MergeOutcome::Merged { shards: 1, rows: 4 });
        assert_eq!(count(&store, Table::Sessions, "subsession_id = 555 AND has_results"), 1);
        assert_eq!(count(&store, Table::Sessions, "subsession_id = 556"), 0);
        assert_eq!(count(&store, Table::Sessions, "league_season_id = 11"), 1);
        assert_eq!(count(&store, Table::Sessions, "subsession_id IS NULL"), 1);
        assert!(!store.columns(Table::Sessions).unwrap().iter().any(|c| c == "filename" || c == "rn"));
    }

    #[test]
    fn test_sessions_stripped_column_is_null() {
        let (_dir, store) = store();
        let mut shards = seal(&store, &season_batch(10), &[(
            ShardId::sessions(10),
            json!([{"league_season_id": 10, "subsession_id": 555}]),
        )]);
        shards.extend(seal(&store, &season_batch(11), &[(
            ShardId::sessions(11),
            json!([{"league_season_id": 11, "subsession_id": 600, "weather": {"temp": 21}}]),
        )]));
        store.merge(Table::Sessions, &shards).unwrap();
        assert_eq!(store.row_count(Table::Sessions).unwrap(), 2);
        assert_eq!(count(&store, Table::Sessions, "weather IS NULL"), 1);
        assert_eq!(count(&store, Table::Sessions, "subsession_id = 555 AND weather IS NULL"), 1);
    }

    #[test]
    fn test_missing_shard_is_fatal() {
        let (_dir, store) = store();
        let err = store.merge(Table::Sessions, &[ShardId::sessions(10)]).unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
        assert!(!store.exists(Table::Sessions).unwrap());
    }

    #[test]
    fn test_merge_rejects_shards_of_other_tables() {
        let (_dir, store) = store();
        let err = store.merge(Table::Sessions, &[ShardId::results(Scope::Team, 1, 0)]).unwrap_err();
        assert!(matches!(&*err, ErrorKind::ForeignShard { .. }));
    }

    #[test]
    fn test_journal_round_trip() {
        let (_dir, store) = store();
        let path = store.journal_path(Table::Sessions);
        let journal = Journal {
            staged: PathBuf::from(".tmp/sessions.parquet"),
            shards: vec![PathBuf::from(".shards/season-10/sessions-10.parquet")],
        };
        write_journal(&path, &journal).unwrap();
        assert!(is_journal(&path));
        let read = read_journal(&path).unwrap();
        assert_eq!(read.staged, journal.staged);
        assert_eq!(read.shards, journal.shards);
    }
}
