//! Full-store sweeps: delete-all, expire-all, and due-entry pruning.
//!
//! Each sweep enumerates the store exactly once and acts per entry.
//! Individual deletion failures are skipped — not counted, not retried —
//! and never abort the sweep; only a failure to enumerate the root is an
//! error. No lock spans a sweep, so entries created concurrently may or
//! may not be observed.

use anyhow::Result;
use tracing::debug;

use crate::constants::{EXPIRE_NEVER_UNIX, EXPIRE_RESERVED_UNIX};
use crate::store::{FileCache, unix_secs_of};

impl FileCache {
    /// Delete every entry except those stamped with the `reserved`
    /// sentinel expiration. Returns the number actually deleted.
    pub fn delete_all(&self) -> Result<usize> {
        let mut deleted = 0;
        for entry in self.entries()? {
            if unix_secs_of(entry.modified) == EXPIRE_RESERVED_UNIX {
                continue;
            }
            if self.fs_ref().remove_file(&self.root().join(&entry.name)).is_ok() {
                deleted += 1;
            }
        }
        debug!(deleted, "Deleted cache entries");
        Ok(deleted)
    }

    /// Delete every entry whose expiration lies strictly after the
    /// `never` sentinel. Entries stamped at or below it — permanent and
    /// reserved entries — survive. Returns the number actually deleted.
    pub fn expire_all(&self) -> Result<usize> {
        let mut deleted = 0;
        for entry in self.entries()? {
            if unix_secs_of(entry.modified) <= EXPIRE_NEVER_UNIX {
                continue;
            }
            if self.fs_ref().remove_file(&self.root().join(&entry.name)).is_ok() {
                deleted += 1;
            }
        }
        debug!(deleted, "Expired cache entries");
        Ok(deleted)
    }

    /// Delete every entry whose expiration is due as of the injected
    /// clock, sparing sentinel-stamped entries. Returns the number
    /// actually deleted.
    ///
    /// The store performs no background eviction; the surrounding
    /// application calls this as its periodic maintenance sweep.
    pub fn prune(&self) -> Result<usize> {
        let now = unix_secs_of(self.clock_ref().now());
        let mut deleted = 0;
        for entry in self.entries()? {
            let mtime = unix_secs_of(entry.modified);
            if mtime <= EXPIRE_NEVER_UNIX || mtime > now {
                continue;
            }
            if self.fs_ref().remove_file(&self.root().join(&entry.name)).is_ok() {
                deleted += 1;
            }
        }
        debug!(deleted, "Pruned due cache entries");
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    use chrono::{DateTime, NaiveDateTime, Utc};
    use tempfile::TempDir;

    use crate::fs::{Clock, StdFilesystem};
    use crate::store::Expiration;

    use super::*;

    /// Test clock pinned to a fixed instant.
    struct FixedClock(SystemTime);

    impl Clock for FixedClock {
        fn now(&self) -> SystemTime {
            self.0
        }
    }

    fn at_unix(secs: i64) -> NaiveDateTime {
        DateTime::<Utc>::from_timestamp(secs, 0).unwrap().naive_utc()
    }

    fn names_in(cache: &FileCache) -> Vec<String> {
        let mut names: Vec<String> = cache
            .entries()
            .unwrap()
            .into_iter()
            .filter_map(|e| e.name.strip_suffix(".cache").map(str::to_string))
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_delete_all_spares_reserved() {
        let tmp = TempDir::new().unwrap();
        let cache = FileCache::open(tmp.path().join("cache"));

        cache.save("plain", b"1", Expiration::At(at_unix(2_000_000_000))).unwrap();
        cache.save("forever", b"2", Expiration::Never).unwrap();
        cache.save("protected", b"3", Expiration::Reserved).unwrap();

        let deleted = cache.delete_all().unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(names_in(&cache), vec!["protected"]);
    }

    #[test]
    fn test_expire_all_spares_never_and_reserved() {
        let tmp = TempDir::new().unwrap();
        let cache = FileCache::open(tmp.path().join("cache"));

        cache.save("due", b"1", Expiration::At(at_unix(1_000_000))).unwrap();
        cache.save("later", b"2", Expiration::At(at_unix(2_000_000_000))).unwrap();
        cache.save("forever", b"3", Expiration::Never).unwrap();
        cache.save("protected", b"4", Expiration::Reserved).unwrap();

        let deleted = cache.expire_all().unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(names_in(&cache), vec!["forever", "protected"]);
    }

    #[test]
    fn test_sweeps_on_missing_root_return_zero() {
        let tmp = TempDir::new().unwrap();
        let cache = FileCache::open(tmp.path().join("cache"));

        assert_eq!(cache.delete_all().unwrap(), 0);
        assert_eq!(cache.expire_all().unwrap(), 0);
        assert_eq!(cache.prune().unwrap(), 0);
    }

    #[test]
    fn test_prune_deletes_only_due_entries() {
        let tmp = TempDir::new().unwrap();
        let now_secs = 1_700_000_000i64;
        let clock = FixedClock(UNIX_EPOCH + Duration::from_secs(now_secs as u64));
        let cache = FileCache::new(
            tmp.path().join("cache"),
            Arc::new(StdFilesystem),
            Arc::new(clock),
        );

        cache.save("stale", b"1", Expiration::At(at_unix(now_secs - 10))).unwrap();
        cache.save("exactly-due", b"2", Expiration::At(at_unix(now_secs))).unwrap();
        cache.save("fresh", b"3", Expiration::At(at_unix(now_secs + 10))).unwrap();
        cache.save("forever", b"4", Expiration::Never).unwrap();
        cache.save("protected", b"5", Expiration::Reserved).unwrap();

        let deleted = cache.prune().unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(names_in(&cache), vec!["forever", "fresh", "protected"]);
    }

    #[test]
    fn test_sweeps_skip_foreign_files() {
        let tmp = TempDir::new().unwrap();
        let cache = FileCache::open(tmp.path().join("cache"));
        cache.save("a", b"1", Expiration::At(at_unix(2_000_000_000))).unwrap();
        std::fs::write(cache.root().join("stray.txt"), b"keep me").unwrap();

        assert_eq!(cache.delete_all().unwrap(), 1);
        assert!(cache.root().join("stray.txt").exists());
    }
}
