//! Filesystem-backed cache entry storage.
//!
//! One flat directory holds every entry: the file name is the sanitized
//! cache name plus [`CACHE_SUFFIX`](crate::constants::CACHE_SUFFIX), the
//! file content is the raw cached bytes, and the file modification time
//! carries the expiration. A location's existence is the entry's
//! existence; there is no separate index.
//!
//! The root directory is created lazily by the first operation that needs
//! it and removed (recursively) only by [`FileCache::teardown`].

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::constants::{CACHE_SUFFIX, EXPIRE_NEVER_UNIX, EXPIRE_RESERVED_UNIX};
use crate::fs::{Clock, DirEntry, Filesystem, StdFilesystem, SystemClock};
use crate::name::sanitize_name;

/// When a cache entry should be considered stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiration {
    /// Stale at and after this moment (UTC, second resolution).
    At(NaiveDateTime),
    /// Never becomes stale on its own; excluded from expire-all sweeps.
    Never,
    /// Protected from full flushes; excluded from delete-all sweeps.
    Reserved,
}

impl Expiration {
    /// The unix-seconds timestamp this expiration is encoded as.
    pub(crate) fn unix_secs(self) -> i64 {
        match self {
            Self::At(at) => at.and_utc().timestamp(),
            Self::Never => EXPIRE_NEVER_UNIX,
            Self::Reserved => EXPIRE_RESERVED_UNIX,
        }
    }

    /// The modification timestamp to stamp on the storage location.
    pub(crate) fn to_system_time(self) -> SystemTime {
        // Pre-epoch expirations clamp to the epoch; sentinels are small
        // positive offsets and real expirations are modern dates.
        let secs = u64::try_from(self.unix_secs()).unwrap_or(0);
        UNIX_EPOCH + Duration::from_secs(secs)
    }
}

/// A [`SystemTime`] truncated to unix seconds.
///
/// All expiration comparisons happen at second resolution; sub-second
/// mtime precision is deliberately discarded so sentinel equality checks
/// are exact.
pub(crate) fn unix_secs_of(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => i64::try_from(d.as_secs()).unwrap_or(i64::MAX),
        Err(_) => 0,
    }
}

/// The sanitized entry name of a storage file, or `None` for files not
/// bearing the cache suffix.
pub(crate) fn entry_stem(file_name: &str) -> Option<&str> {
    file_name.strip_suffix(CACHE_SUFFIX)
}

/// Aggregate statistics over the stored entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Number of stored entries.
    pub entries: usize,
    /// Total size of stored values in bytes.
    pub total_bytes: u64,
}

/// Filesystem-backed key/value cache store with per-entry expiration.
///
/// The filesystem and clock are injected at construction; the store holds
/// no other state than its root path. Cloning is cheap and clones share
/// the same collaborators.
///
/// # Concurrency
///
/// Saves are atomic (readers never observe a torn value) and concurrent
/// writers to the same entry resolve to the last completed write. Sweeps
/// and wildcard queries enumerate then act without a global lock, so
/// entries created concurrently may or may not be observed; this is
/// best-effort by design, not a snapshot guarantee.
#[derive(Clone)]
pub struct FileCache {
    root: PathBuf,
    fs: Arc<dyn Filesystem>,
    clock: Arc<dyn Clock>,
}

impl FileCache {
    /// Create a store over `root` with explicit collaborators.
    ///
    /// Nothing is touched on disk; the root is created lazily by the
    /// first write that needs it, or eagerly via [`setup`](Self::setup).
    pub fn new(root: impl Into<PathBuf>, fs: Arc<dyn Filesystem>, clock: Arc<dyn Clock>) -> Self {
        Self {
            root: root.into(),
            fs,
            clock,
        }
    }

    /// Create a store over `root` backed by the real filesystem and clock.
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self::new(root, Arc::new(StdFilesystem), Arc::new(SystemClock))
    }

    /// The cache root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub(crate) fn fs_ref(&self) -> &dyn Filesystem {
        self.fs.as_ref()
    }

    pub(crate) fn clock_ref(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Resolve the storage location for an already-sanitized name.
    pub(crate) fn entry_path(&self, safe_name: &str) -> PathBuf {
        self.root.join(format!("{safe_name}{CACHE_SUFFIX}"))
    }

    fn ensure_root(&self) -> Result<()> {
        if !self.fs.dir_exists(&self.root) {
            self.fs
                .create_dir_all(&self.root)
                .with_context(|| format!("Failed to create cache root: {}", self.root.display()))?;
        }
        Ok(())
    }

    /// Create the cache root directory. Idempotent.
    pub fn setup(&self) -> Result<()> {
        self.ensure_root()
    }

    /// Remove the cache root and every entry beneath it, if present.
    pub fn teardown(&self) -> Result<()> {
        if self.fs.dir_exists(&self.root) {
            self.fs
                .remove_dir_all(&self.root)
                .with_context(|| format!("Failed to remove cache root: {}", self.root.display()))?;
        }
        Ok(())
    }

    /// Persist `data` under `name`, expiring at `expire`.
    ///
    /// The value is written atomically, then the expiration is stamped on
    /// the location's modification time. A failed stamp leaves the write
    /// in place and is logged rather than reported; a failed write is an
    /// error and the previous entry (if any) is untouched.
    pub fn save(&self, name: &str, data: &[u8], expire: Expiration) -> Result<()> {
        self.ensure_root()?;
        let safe = sanitize_name(name);
        let path = self.entry_path(&safe);

        self.fs
            .write_atomic(&path, data)
            .with_context(|| format!("Failed to write cache entry '{safe}'"))?;

        if let Err(e) = self.fs.set_modified(&path, expire.to_system_time()) {
            warn!(entry = %safe, error = %e, "Failed to stamp expiration on cache entry");
        }

        debug!(entry = %safe, bytes = data.len(), "Saved cache entry");
        Ok(())
    }

    /// Persist `data` under `name`, expiring `ttl_secs` from now.
    pub fn save_ttl(&self, name: &str, data: &[u8], ttl_secs: u64) -> Result<()> {
        let now = unix_secs_of(self.clock.now());
        let expires_at = now.saturating_add(i64::try_from(ttl_secs).unwrap_or(i64::MAX));
        let at = DateTime::<Utc>::from_timestamp(expires_at, 0)
            .context("TTL overflows representable time")?;
        self.save(name, data, Expiration::At(at.naive_utc()))
    }

    /// Retrieve the stored value for `name`, or `None` if absent.
    ///
    /// Reads are not coordinated with writers: a concurrent save yields
    /// either the old or the new complete value, never a torn one.
    pub fn get(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let path = self.entry_path(&sanitize_name(name));
        if !self.fs.file_exists(&path) {
            return Ok(None);
        }
        self.read(&path).map(Some)
    }

    /// Read the raw bytes at a resolved storage location.
    pub(crate) fn read(&self, path: &Path) -> Result<Vec<u8>> {
        self.fs
            .read(path)
            .with_context(|| format!("Failed to read cache entry: {}", path.display()))
    }

    /// Remove the entry for `name`. Idempotent: absence is success.
    pub fn delete(&self, name: &str) -> Result<()> {
        let safe = sanitize_name(name);
        let path = self.entry_path(&safe);
        if self.fs.file_exists(&path) {
            self.fs
                .remove_file(&path)
                .with_context(|| format!("Failed to delete cache entry '{safe}'"))?;
            debug!(entry = %safe, "Deleted cache entry");
        }
        Ok(())
    }

    /// Whether an entry exists under `name`.
    pub fn exists(&self, name: &str) -> bool {
        self.fs.file_exists(&self.entry_path(&sanitize_name(name)))
    }

    /// Every storage file in the root, skipping directories, temp files
    /// and anything else not bearing the cache suffix. A missing root
    /// yields an empty list, not an error.
    pub(crate) fn entries(&self) -> Result<Vec<DirEntry>> {
        if !self.fs.dir_exists(&self.root) {
            return Ok(Vec::new());
        }
        let mut entries = self
            .fs
            .list_dir(&self.root)
            .with_context(|| format!("Failed to scan cache root: {}", self.root.display()))?;
        entries.retain(|e| !e.is_dir && entry_stem(&e.name).is_some());
        Ok(entries)
    }

    /// Entry count and total value bytes currently stored.
    pub fn stats(&self) -> Result<CacheStats> {
        let mut stats = CacheStats::default();
        for entry in self.entries()? {
            stats.entries += 1;
            stats.total_bytes += entry.size;
        }
        Ok(stats)
    }
}
