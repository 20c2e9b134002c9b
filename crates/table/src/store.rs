//! The parquet table store.
//!
//! Layout of an output directory:
//!
//! ```text
//! <root>/<table>.parquet            consolidated tables
//! <root>/.staging/<batch>/          shards of a batch still being written
//! <root>/.shards/<batch>/           sealed shards awaiting a merge
//! <root>/.shards/<table>.journal    in-flight merge of <table>
//! <root>/.tmp/                      intermediate JSON and staged merge output
//! ```
//!
//! Every file that becomes visible under a final name gets there by a rename
//! within the same directory tree, so readers never observe a partial table.

use crate::error::{ErrorKind, Result};
use crate::shard::{EXTENSION, ShardId};
use crate::table::Table;
use duckdb::{Connection, params};
use exn::ResultExt;
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::io::{ErrorKind as IoErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

pub(crate) const SHARDS_DIR: &str = ".shards";
pub(crate) const STAGING_DIR: &str = ".staging";
pub(crate) const TMP_DIR: &str = ".tmp";
pub(crate) const QUARANTINE_DIR: &str = ".quarantine";

pub(crate) const PARQUET_OPTIONS: &str = "FORMAT PARQUET, COMPRESSION ZSTD";

pub struct Store {
    root: PathBuf,
    pub(crate) conn: Connection,
}
impl Store {
    /// Opens (creating if needed) the output directory at `root`.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        for dir in [
            root.clone(),
            root.join(SHARDS_DIR),
            root.join(STAGING_DIR),
            root.join(TMP_DIR),
        ] {
            fs::create_dir_all(&dir).or_raise(|| ErrorKind::Filesystem(dir.clone()))?;
        }
        let conn = Connection::open_in_memory().or_raise(|| ErrorKind::Database)?;
        Ok(Self { root, conn })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn table_path(&self, table: Table) -> PathBuf {
        self.root.join(format!("{}.{EXTENSION}", table.name()))
    }

    pub(crate) fn shards_dir(&self) -> PathBuf {
        self.root.join(SHARDS_DIR)
    }

    pub(crate) fn staging_dir(&self) -> PathBuf {
        self.root.join(STAGING_DIR)
    }

    pub(crate) fn tmp_dir(&self) -> PathBuf {
        self.root.join(TMP_DIR)
    }

    /// Where recovery moves files it does not recognise inside `.shards/`.
    pub fn quarantine_dir(&self) -> PathBuf {
        self.root.join(QUARANTINE_DIR)
    }

    pub fn shard_path(&self, id: &ShardId) -> PathBuf {
        self.shards_dir().join(id.batch()).join(id.file_name())
    }

    /// Replaces a whole table with the rows of `record`.
    ///
    /// A JSON object becomes a single row, an array one row per element. An
    /// empty array has no schema to write, so the existing table is removed
    /// and `false` returned.
    #[instrument(skip(self, record), fields(table = %table))]
    pub fn replace<T: Serialize + ?Sized>(&self, table: Table, record: &T) -> Result<bool> {
        let staged = self.tmp_dir().join(format!("{}.{EXTENSION}", table.name()));
        let target = self.table_path(table);
        if !self.convert(record, &staged)? {
            if remove_file(&target)? {
                debug!(path = %target.display(), "no rows, table removed");
            }
            return Ok(false);
        }
        fs::rename(&staged, &target).or_raise(|| ErrorKind::Filesystem(target.clone()))?;
        debug!(path = %target.display(), "table replaced");
        Ok(true)
    }

    /// Serializes `record` to intermediate JSON and converts it to parquet at
    /// `target`, letting DuckDB infer the schema. The intermediate file is
    /// removed however the conversion ends.
    pub(crate) fn convert<T: Serialize + ?Sized>(&self, record: &T, target: &Path) -> Result<bool> {
        let value = serde_json::to_value(record).or_raise(|| ErrorKind::Serialize)?;
        match &value {
            Value::Array(rows) if rows.is_empty() => return Ok(false),
            Value::Array(_) | Value::Object(_) => {},
            _ => exn::bail!(ErrorKind::Serialize),
        }
        let tmp_dir = self.tmp_dir();
        let mut intermediate = tempfile::Builder::new()
            .suffix(".json")
            .tempfile_in(&tmp_dir)
            .or_raise(|| ErrorKind::Filesystem(tmp_dir.clone()))?;
        serde_json::to_writer(&mut intermediate, &value).or_raise(|| ErrorKind::Serialize)?;
        intermediate
            .flush()
            .or_raise(|| ErrorKind::Filesystem(intermediate.path().to_path_buf()))?;
        let sql = format!(
            "COPY (SELECT * FROM read_json_auto('{}')) TO '{}' ({PARQUET_OPTIONS})",
            sql_path(intermediate.path()),
            sql_path(target),
        );
        self.conn.execute_batch(&sql).or_raise(|| ErrorKind::Database)?;
        Ok(true)
    }

    pub fn exists(&self, table: Table) -> Result<bool> {
        exists(&self.table_path(table))
    }

    /// Whether the consolidated `table` holds any row for the subsession.
    /// A table that does not exist yet holds nothing.
    pub fn contains_subsession(&self, table: Table, subsession_id: i64) -> Result<bool> {
        let path = self.table_path(table);
        if !exists(&path)? {
            return Ok(false);
        }
        let sql = format!(
            "SELECT EXISTS (SELECT 1 FROM read_parquet('{}') WHERE subsession_id = ?)",
            sql_path(&path)
        );
        self.conn
            .query_row(&sql, params![subsession_id], |row| row.get::<_, bool>(0))
            .or_raise(|| ErrorKind::Database)
    }

    /// Number of rows in the consolidated table, zero if it does not exist.
    pub fn row_count(&self, table: Table) -> Result<u64> {
        self.count(table, None)
    }

    /// Number of rows in the consolidated table belonging to the subsession.
    pub fn subsession_rows(&self, table: Table, subsession_id: i64) -> Result<u64> {
        self.count(table, Some(subsession_id))
    }

    fn count(&self, table: Table, subsession_id: Option<i64>) -> Result<u64> {
        let path = self.table_path(table);
        if !exists(&path)? {
            return Ok(0);
        }
        let source = format!("read_parquet('{}')", sql_path(&path));
        let count = match subsession_id {
            None => self
                .conn
                .query_row(&format!("SELECT count(*) FROM {source}"), [], |row| row.get::<_, i64>(0)),
            Some(id) => self.conn.query_row(
                &format!("SELECT count(*) FROM {source} WHERE subsession_id = ?"),
                params![id],
                |row| row.get::<_, i64>(0),
            ),
        }
        .or_raise(|| ErrorKind::Database)?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    /// Column names of the consolidated table, empty if it does not exist.
    pub fn columns(&self, table: Table) -> Result<Vec<String>> {
        let path = self.table_path(table);
        if !exists(&path)? {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT column_name FROM (DESCRIBE SELECT * FROM read_parquet('{}'))",
            sql_path(&path)
        );
        let mut stmt = self.conn.prepare(&sql).or_raise(|| ErrorKind::Database)?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .or_raise(|| ErrorKind::Database)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .or_raise(|| ErrorKind::Database)
    }
}

/// Escapes a path for use inside a single-quoted SQL literal.
pub(crate) fn sql_path(path: &Path) -> String {
    path.to_string_lossy().replace('\'', "''")
}

/// `Ok(false)` only when the path is definitely absent.
pub(crate) fn exists(path: &Path) -> Result<bool> {
    match fs::metadata(path) {
        Ok(_) => Ok(true),
        Err(err) if err.kind() == IoErrorKind::NotFound => Ok(false),
        Err(err) => Err(err).or_raise(|| ErrorKind::Filesystem(path.to_path_buf())),
    }
}

/// Removes a file, tolerating it already being gone.
pub(crate) fn remove_file(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == IoErrorKind::NotFound => Ok(false),
        Err(err) => Err(err).or_raise(|| ErrorKind::Filesystem(path.to_path_buf())),
    }
}

/// Removes a directory tree, tolerating it already being gone.
pub(crate) fn remove_dir_all(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == IoErrorKind::NotFound => Ok(()),
        Err(err) => Err(err).or_raise(|| ErrorKind::Filesystem(path.to_path_buf())),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::table::Scope;
    use serde_json::json;
    use tempfile::TempDir;

    pub(crate) fn store() -> (TempDir, Store) {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path().join("out")).unwrap();
        (dir, store)
    }

    #[test]
    fn test_open_creates_layout() {
        let (_dir, store) = store();
        assert!(store.root().join(SHARDS_DIR).is_dir());
        assert!(store.root().join(STAGING_DIR).is_dir());
        assert!(store.root().join(TMP_DIR).is_dir());
    }

    #[test]
    fn test_replace_object_is_single_row() {
        let (_dir, store) = store();
        let written = store
            .replace(Table::League, &json!({"league_id": 123, "league_name": "Thursday Night"}))
            .unwrap();
        assert!(written);
        assert_eq!(store.row_count(Table::League).unwrap(), 1);
        assert_eq!(store.columns(Table::League).unwrap(), vec!["league_id", "league_name"]);
    }

    #[test]
    fn test_replace_overwrites_previous_rows() {
        let (_dir, store) = store();
        let first = json!([{"cust_id": 1}, {"cust_id": 2}, {"cust_id": 3}]);
        store.replace(Table::Roster, &first).unwrap();
        store.replace(Table::Roster, &json!([{"cust_id": 1}])).unwrap();
        assert_eq!(store.row_count(Table::Roster).unwrap(), 1);
    }

    #[test]
    fn test_replace_empty_array_clears_table() {
        let (_dir, store) = store();
        store.replace(Table::Seasons, &json!([{"season_id": 10}])).unwrap();
        let written = store.replace(Table::Seasons, &json!([])).unwrap();
        assert!(!written);
        assert!(!store.exists(Table::Seasons).unwrap());
        assert_eq!(store.row_count(Table::Seasons).unwrap(), 0);
        // Nothing to clear is fine too.
        assert!(!store.replace(Table::Seasons, &json!([])).unwrap());
    }

    #[test]
    fn test_replace_rejects_scalars() {
        let (_dir, store) = store();
        let err = store.replace(Table::League, &json!(42)).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Serialize));
    }

    #[test]
    fn test_replace_leaves_no_intermediate_files() {
        let (_dir, store) = store();
        store.replace(Table::League, &json!({"league_id": 1})).unwrap();
        assert_eq!(fs::read_dir(store.tmp_dir()).unwrap().count(), 0);
    }

    #[test]
    fn test_missing_table_reads_as_empty() {
        let (_dir, store) = store();
        let table = Table::Results(Scope::Individual);
        assert!(!store.exists(table).unwrap());
        assert!(!store.contains_subsession(table, 555).unwrap());
        assert_eq!(store.row_count(table).unwrap(), 0);
        assert!(store.columns(table).unwrap().is_empty());
    }

    #[test]
    fn test_contains_subsession() {
        let (_dir, store) = store();
        let table = Table::Results(Scope::Team);
        store
            .replace(table, &json!([{"subsession_id": 555, "simsession_number": 0}]))
            .unwrap();
        assert!(store.contains_subsession(table, 555).unwrap());
        assert!(!store.contains_subsession(table, 556).unwrap());
        assert_eq!(store.subsession_rows(table, 555).unwrap(), 1);
    }

    #[test]
    fn test_sql_path_escapes_quotes() {
        assert_eq!(sql_path(Path::new("/tmp/o'brien/x.parquet")), "/tmp/o''brien/x.parquet");
    }
}
