//! URL-keyed response cache.
//!
//! Responses are stored as plain files under a cache directory, named by the
//! BLAKE3 hash of the request path. An entry is fresh while it is younger (by
//! file modification time) than the TTL of the request asking for it, so the
//! same entry can be fresh for one caller and stale for another.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::fs::create_dir_all as sync_create_dir;
use std::path::{Path, PathBuf};
use std::time::Duration;
use time::OffsetDateTime;
use tokio::fs;

#[derive(Clone, Debug)]
pub struct ResponseCache {
    root: PathBuf,
}
impl ResponseCache {
    /// Open (creating if needed) a cache rooted at `root`.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        sync_create_dir(&root).or_raise(|| ErrorKind::Cache(root.clone()))?;
        Ok(Self { root })
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", blake3::hash(key.as_bytes()).to_hex()))
    }

    /// Cached body for `key`, if one exists and is younger than `ttl`.
    ///
    /// A zero TTL always misses.
    pub async fn get(&self, key: &str, ttl: Duration) -> Result<Option<Vec<u8>>> {
        if ttl.is_zero() {
            return Ok(None);
        }
        let path = self.entry_path(key);
        let metadata = match fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).or_raise(|| ErrorKind::Cache(path)),
        };
        let modified: OffsetDateTime = metadata.modified().or_raise(|| ErrorKind::Cache(path.clone()))?.into();
        let ttl = time::Duration::try_from(ttl).unwrap_or(time::Duration::MAX);
        if OffsetDateTime::now_utc() - modified > ttl {
            tracing::trace!(key, "cached response is stale");
            return Ok(None);
        }
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            // Removed between the stat and the read; treat as a miss.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).or_raise(|| ErrorKind::Cache(path)),
        }
    }

    /// Store `data` as the body for `key`, replacing any previous entry.
    pub async fn put(&self, key: &str, data: &[u8]) -> Result<()> {
        let path = self.entry_path(key);
        let partial = path.with_extension("partial");
        fs::write(&partial, data).await.or_raise(|| ErrorKind::Cache(partial.clone()))?;
        fs::rename(&partial, &path).await.or_raise(|| ErrorKind::Cache(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;

    const KEY: &str = "/data/league/get?league_id=123";

    #[tokio::test]
    async fn test_put_and_get() {
        let temp_dir = tempfile::tempdir().unwrap();
        let cache = ResponseCache::open(temp_dir.path()).unwrap();
        assert!(cache.get(KEY, Duration::from_secs(60)).await.unwrap().is_none());
        cache.put(KEY, br#"{"league_id":123}"#).await.unwrap();
        let hit = cache.get(KEY, Duration::from_secs(60)).await.unwrap();
        assert_eq!(hit.as_deref(), Some(br#"{"league_id":123}"#.as_slice()));
    }

    #[tokio::test]
    async fn test_zero_ttl_bypasses_cache() {
        let temp_dir = tempfile::tempdir().unwrap();
        let cache = ResponseCache::open(temp_dir.path()).unwrap();
        cache.put(KEY, b"{}").await.unwrap();
        assert!(cache.get(KEY, Duration::ZERO).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stale_entry_misses() {
        let temp_dir = tempfile::tempdir().unwrap();
        let cache = ResponseCache::open(temp_dir.path()).unwrap();
        cache.put(KEY, b"{}").await.unwrap();
        let two_hours_ago = SystemTime::now() - Duration::from_secs(2 * 3600);
        std::fs::File::options()
            .write(true)
            .open(cache.entry_path(KEY))
            .unwrap()
            .set_modified(two_hours_ago)
            .unwrap();
        // Stale for an hour-scale TTL, still fresh for a permanent one.
        assert!(cache.get(KEY, Duration::from_secs(3600)).await.unwrap().is_none());
        assert!(cache.get(KEY, Duration::from_secs(365 * 24 * 3600)).await.unwrap().is_some());
    }

    #[test]
    fn test_keys_do_not_collide() {
        let temp_dir = tempfile::tempdir().unwrap();
        let cache = ResponseCache::open(temp_dir.path()).unwrap();
        assert_ne!(
            cache.entry_path("/data/results/get?subsession_id=1"),
            cache.entry_path("/data/results/get?subsession_id=10")
        );
    }
}
