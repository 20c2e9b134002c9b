//! Staging and sealing of shard batches.

use crate::error::{ErrorKind, Result};
use crate::shard::ShardId;
use crate::store::{Store, exists, remove_dir_all};
use exn::ResultExt;
use serde::Serialize;
use std::fs;
use std::io::ErrorKind as IoErrorKind;
use std::path::PathBuf;
use tracing::{debug, warn};

/// A group of shards that becomes visible to merges all at once.
///
/// Shards are written into `.staging/<batch>/`. Sealing renames the directory
/// into `.shards/`, so a crash either leaves the whole batch for the next run
/// to merge or none of it. A batch dropped without sealing is discarded.
pub struct Batch<'s> {
    store: &'s Store,
    name: String,
    staging: PathBuf,
    written: Vec<ShardId>,
    sealed: bool,
}

impl Store {
    /// Starts a new batch, discarding any unsealed leftovers under that name.
    pub fn batch(&self, name: impl Into<String>) -> Result<Batch<'_>> {
        let name = name.into();
        let staging = self.staging_dir().join(&name);
        remove_dir_all(&staging)?;
        fs::create_dir_all(&staging).or_raise(|| ErrorKind::Filesystem(staging.clone()))?;
        Ok(Batch { store: self, name, staging, written: Vec::new(), sealed: false })
    }
}

impl Batch<'_> {
    /// Writes one shard. Returns `false` (and writes nothing) when `record` is
    /// an empty array.
    ///
    /// Shards are write-once: a shard already written in this batch, or still
    /// sealed from an earlier run, is an error.
    pub fn write<T: Serialize + ?Sized>(&mut self, id: ShardId, record: &T) -> Result<bool> {
        if id.batch() != self.name {
            exn::bail!(ErrorKind::ForeignShard { shard: id.file_name(), owner: self.name.clone() });
        }
        let sealed = self.store.shard_path(&id);
        if self.written.contains(&id) || exists(&sealed)? {
            exn::bail!(ErrorKind::AlreadyExists(sealed));
        }
        let target = self.staging.join(id.file_name());
        let written = self.store.convert(record, &target)?;
        if written {
            debug!(shard = %id, "shard staged");
            self.written.push(id);
        }
        Ok(written)
    }

    /// Publishes the batch and returns its shards for the manifest.
    pub fn seal(mut self) -> Result<Vec<ShardId>> {
        if self.written.is_empty() {
            // Drop removes the empty staging directory.
            return Ok(Vec::new());
        }
        let target = self.store.shards_dir().join(&self.name);
        // An emptied batch directory can outlive a merge; anything else in
        // the way still holds unmerged shards.
        match fs::remove_dir(&target) {
            Ok(()) => {},
            Err(err) if err.kind() == IoErrorKind::NotFound => {},
            Err(err) => return Err(err).or_raise(|| ErrorKind::AlreadyExists(target.clone())),
        }
        fs::rename(&self.staging, &target).or_raise(|| ErrorKind::Filesystem(target.clone()))?;
        self.sealed = true;
        debug!(batch = %self.name, shards = self.written.len(), "batch sealed");
        Ok(std::mem::take(&mut self.written))
    }
}

impl Drop for Batch<'_> {
    fn drop(&mut self) {
        if self.sealed {
            return;
        }
        if let Err(err) = fs::remove_dir_all(&self.staging)
            && err.kind() != IoErrorKind::NotFound
        {
            warn!(batch = %self.name, error = %err, "failed to discard staged batch");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shard::{season_batch, subsession_batch};
    use crate::store::tests::store;
    use crate::table::Scope;
    use serde_json::json;

    #[test]
    fn test_seal_publishes_shards() {
        let (_dir, store) = store();
        let mut batch = store.batch(subsession_batch(Scope::Individual, 555)).unwrap();
        let results = ShardId::results(Scope::Individual, 555, 0);
        let laps = ShardId::lap_data(Scope::Individual, 555, 0, 42);
        assert!(batch.write(results, &json!({"subsession_id": 555})).unwrap());
        assert!(batch.write(laps, &json!({"cust_id": 42})).unwrap());
        let staged = store.staging_dir().join("subsession-555").join(results.file_name());
        assert!(staged.is_file());

        let shards = batch.seal().unwrap();
        assert_eq!(shards, vec![results, laps]);
        assert!(store.shard_path(&results).is_file());
        assert!(store.shard_path(&laps).is_file());
        assert!(!staged.exists());
    }

    #[test]
    fn test_empty_record_writes_nothing() {
        let (_dir, store) = store();
        let mut batch = store.batch(season_batch(10)).unwrap();
        assert!(!batch.write(ShardId::sessions(10), &json!([])).unwrap());
        assert!(batch.seal().unwrap().is_empty());
        assert!(!store.shards_dir().join("season-10").exists());
        assert!(!store.staging_dir().join("season-10").exists());
    }

    #[test]
    fn test_dropped_batch_is_discarded() {
        let (_dir, store) = store();
        {
            let mut batch = store.batch(season_batch(10)).unwrap();
            batch.write(ShardId::sessions(10), &json!([{"subsession_id": 1}])).unwrap();
        }
        assert!(!store.staging_dir().join("season-10").exists());
        assert!(!store.shard_path(&ShardId::sessions(10)).exists());
    }

    #[test]
    fn test_write_is_once_only() {
        let (_dir, store) = store();
        let id = ShardId::sessions(10);
        let mut batch = store.batch(season_batch(10)).unwrap();
        batch.write(id, &json!([{"subsession_id": 1}])).unwrap();
        let err = batch.write(id, &json!([{"subsession_id": 1}])).unwrap_err();
        assert!(matches!(&*err, ErrorKind::AlreadyExists(_)));
        batch.seal().unwrap();

        let mut again = store.batch(season_batch(10)).unwrap();
        let err = again.write(id, &json!([{"subsession_id": 2}])).unwrap_err();
        assert!(matches!(&*err, ErrorKind::AlreadyExists(_)));
    }

    #[test]
    fn test_write_rejects_foreign_shard() {
        let (_dir, store) = store();
        let mut batch = store.batch(season_batch(10)).unwrap();
        let err = batch.write(ShardId::sessions(11), &json!([])).unwrap_err();
        assert!(matches!(&*err, ErrorKind::ForeignShard { .. }));
    }
}
