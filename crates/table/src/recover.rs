//! Crash recovery for an output directory.

use crate::error::{ErrorKind, Result};
use crate::merge::{is_journal, read_journal};
use crate::shard::{Manifest, ShardId};
use crate::store::{Store, exists, remove_dir_all, remove_file};
use exn::ResultExt;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

impl Store {
    /// Brings the output directory back to a consistent state and returns the
    /// sealed shards a previous run left unmerged.
    ///
    /// Interrupted merges are resolved from their journals: if the staged
    /// output is still in `.tmp/` the table was never replaced and the shards
    /// stay pending; otherwise the table already holds their rows and the
    /// shards are deleted. Unsealed batches and intermediate files are
    /// discarded, their data is simply fetched again. Anything inside a batch
    /// directory that is not one of its shards is moved to `.quarantine/`, so
    /// that batch can be sealed again later.
    #[instrument(skip(self), fields(root = %self.root().display()))]
    pub fn recover(&self) -> Result<Manifest> {
        let shards_dir = self.shards_dir();
        for path in list(&shards_dir)? {
            if is_journal(&path) {
                self.replay(&path)?;
            } else if path.extension().is_some_and(|ext| ext == "partial") {
                remove_file(&path)?;
            }
        }

        for dir in [self.staging_dir(), self.tmp_dir()] {
            remove_dir_all(&dir)?;
            fs::create_dir_all(&dir).or_raise(|| ErrorKind::Filesystem(dir.clone()))?;
        }

        let mut manifest = Manifest::default();
        for batch_dir in list(&shards_dir)? {
            if !batch_dir.is_dir() {
                continue;
            }
            let Some(batch) = batch_dir.file_name().and_then(|name| name.to_str()) else {
                warn!(path = %batch_dir.display(), "skipping batch with non UTF-8 name");
                continue;
            };
            for file in list(&batch_dir)? {
                let name = file.file_name().and_then(|name| name.to_str()).unwrap_or_default();
                match ShardId::parse(batch, name) {
                    Ok(id) if file.is_file() => manifest.record(id),
                    Ok(_) => self.quarantine(batch, &file)?,
                    Err(err) => {
                        warn!(path = %file.display(), error = ?err, "quarantining unrecognised file");
                        self.quarantine(batch, &file)?;
                    },
                }
            }
            if list(&batch_dir)?.is_empty() {
                fs::remove_dir(&batch_dir).or_raise(|| ErrorKind::Filesystem(batch_dir.clone()))?;
            }
        }
        if !manifest.is_empty() {
            info!(shards = manifest.len(), "recovered unmerged shards");
        }
        Ok(manifest)
    }

    /// Moves `path` out of the batch directory into `.quarantine/<batch>/`,
    /// never overwriting an earlier quarantined entry.
    fn quarantine(&self, batch: &str, path: &Path) -> Result<()> {
        let dir = self.quarantine_dir().join(batch);
        fs::create_dir_all(&dir).or_raise(|| ErrorKind::Filesystem(dir.clone()))?;
        let name = path.file_name().unwrap_or(OsStr::new(batch));
        let mut target = dir.join(name);
        let mut n = 1;
        while exists(&target)? {
            let mut numbered = name.to_os_string();
            numbered.push(format!(".{n}"));
            target = dir.join(numbered);
            n += 1;
        }
        fs::rename(path, &target).or_raise(|| ErrorKind::Filesystem(path.to_path_buf()))?;
        info!(from = %path.display(), to = %target.display(), "quarantined file");
        Ok(())
    }

    fn replay(&self, journal_path: &Path) -> Result<()> {
        let journal = read_journal(journal_path)?;
        let staged = self.root().join(&journal.staged);
        if exists(&staged)? {
            remove_file(&staged)?;
            info!(journal = %journal_path.display(), "rolled back interrupted merge");
        } else {
            let shards: Vec<PathBuf> = journal.shards.iter().map(|path| self.root().join(path)).collect();
            self.discard(&shards)?;
            info!(journal = %journal_path.display(), shards = shards.len(), "completed interrupted merge");
        }
        remove_file(journal_path)?;
        Ok(())
    }
}

/// Directory entries in name order.
fn list(dir: &Path) -> Result<Vec<PathBuf>> {
    let error = || ErrorKind::Filesystem(dir.to_path_buf());
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).or_raise(error)? {
        paths.push(entry.or_raise(error)?.path());
    }
    paths.sort();
    Ok(paths)
}
