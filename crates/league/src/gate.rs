//! The "already processed" check guarding subsession fetches.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use paddock_table::{Manifest, Scope, Store, Table};
use tracing::warn;

/// Decides whether a subsession's results and lap data can be skipped.
///
/// A subsession counts as processed once result rows for it are either
/// pending in the manifest or present in a consolidated results table. Both
/// lineages are checked: the lineage of a subsession is fixed the first time
/// it is processed, so finding it under the other prefix means the session's
/// `driver_changes` flag flipped remotely, and the subsession is left alone.
pub struct DedupGate<'a> {
    store: &'a Store,
}

impl<'a> DedupGate<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    pub fn already_processed(&self, scope: Scope, subsession_id: i64, manifest: &Manifest) -> Result<bool> {
        if manifest.contains_results(scope, subsession_id) || self.contains(scope, subsession_id)? {
            return Ok(true);
        }
        let other = scope.other();
        if manifest.contains_results(other, subsession_id) || self.contains(other, subsession_id)? {
            warn!(
                subsession_id,
                expected = %Table::Results(scope),
                found = %Table::Results(other),
                "subsession already stored under the other lineage; keeping it there"
            );
            return Ok(true);
        }
        Ok(false)
    }

    fn contains(&self, scope: Scope, subsession_id: i64) -> Result<bool> {
        let table = Table::Results(scope);
        self.store
            .contains_subsession(table, subsession_id)
            .or_raise(|| ErrorKind::Table(table))
    }
}
