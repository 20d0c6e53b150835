//! Filesystem and clock capability interface.
//!
//! The store never touches `std::fs` directly; everything it needs from the
//! host environment is expressed by the [`Filesystem`] and [`Clock`] traits
//! and injected through the store's constructor. [`StdFilesystem`] and
//! [`SystemClock`] are the production implementations; tests or embedders
//! can substitute their own.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use anyhow::{Context, Result};

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// The current wall-clock time.
    fn now(&self) -> SystemTime;
}

/// [`Clock`] backed by the system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// One directory entry as reported by [`Filesystem::list_dir`].
#[derive(Debug, Clone)]
pub struct DirEntry {
    /// File name including any extension (no directory components).
    pub name: String,
    /// Last modification time.
    pub modified: SystemTime,
    /// Size in bytes.
    pub size: u64,
    /// Whether the entry is a directory.
    pub is_dir: bool,
}

/// Metadata of a single file as reported by [`Filesystem::metadata`].
#[derive(Debug, Clone, Copy)]
pub struct FileMeta {
    /// Last modification time.
    pub modified: SystemTime,
    /// Size in bytes.
    pub size: u64,
}

/// Filesystem operations the store requires from its host environment.
pub trait Filesystem: Send + Sync {
    /// Create a directory and any missing parents. Idempotent.
    fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Whether `path` exists and is a directory.
    fn dir_exists(&self, path: &Path) -> bool;

    /// Whether `path` exists and is a regular file.
    fn file_exists(&self, path: &Path) -> bool;

    /// List the direct children of a directory.
    fn list_dir(&self, path: &Path) -> Result<Vec<DirEntry>>;

    /// Read the full content of a file.
    fn read(&self, path: &Path) -> Result<Vec<u8>>;

    /// Write `bytes` to `path` atomically.
    ///
    /// A reader must observe either the previous complete content or the
    /// new complete content, never a torn write. Concurrent writers to the
    /// same path must not interleave; the last completed write wins.
    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<()>;

    /// Set the modification time of a file.
    fn set_modified(&self, path: &Path, modified: SystemTime) -> Result<()>;

    /// Metadata of a single file.
    fn metadata(&self, path: &Path) -> Result<FileMeta>;

    /// Remove a file.
    fn remove_file(&self, path: &Path) -> Result<()>;

    /// Remove a directory and everything beneath it.
    fn remove_dir_all(&self, path: &Path) -> Result<()>;
}

/// Process-wide sequence for unique temp-file names, see
/// [`StdFilesystem::write_atomic`].
static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// [`Filesystem`] backed by `std::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdFilesystem;

impl Filesystem for StdFilesystem {
    fn create_dir_all(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory: {}", path.display()))
    }

    fn dir_exists(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn file_exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<DirEntry>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(path)
            .with_context(|| format!("Failed to read directory: {}", path.display()))?
        {
            let entry = entry.context("Failed to read directory entry")?;
            // Entries that vanish mid-scan are skipped, not fatal.
            let Ok(meta) = entry.metadata() else {
                continue;
            };
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
                size: meta.len(),
                is_dir: meta.is_dir(),
            });
        }
        Ok(entries)
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        fs::read(path).with_context(|| format!("Failed to read file: {}", path.display()))
    }

    /// Atomic write via a uniquely named temp file plus rename.
    ///
    /// The temp name carries the process id and a process-wide sequence
    /// number, so concurrent writers each stage into their own file and the
    /// rename decides the winner atomically.
    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
        let mut temp_name = path.as_os_str().to_os_string();
        temp_name.push(format!(".{}.{seq}.tmp", std::process::id()));
        let temp_path = PathBuf::from(temp_name);

        fs::write(&temp_path, bytes)
            .with_context(|| format!("Failed to write temp file: {}", temp_path.display()))?;

        if let Err(e) = fs::rename(&temp_path, path) {
            // Don't leave the staging file behind on a failed publish.
            let _ = fs::remove_file(&temp_path);
            return Err(e)
                .with_context(|| format!("Failed to rename temp file into: {}", path.display()));
        }
        Ok(())
    }

    fn set_modified(&self, path: &Path, modified: SystemTime) -> Result<()> {
        let file = fs::OpenOptions::new()
            .write(true)
            .open(path)
            .with_context(|| format!("Failed to open file for touching: {}", path.display()))?;
        file.set_modified(modified)
            .with_context(|| format!("Failed to set modification time: {}", path.display()))
    }

    fn metadata(&self, path: &Path) -> Result<FileMeta> {
        let meta = fs::metadata(path)
            .with_context(|| format!("Failed to stat file: {}", path.display()))?;
        Ok(FileMeta {
            modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            size: meta.len(),
        })
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        fs::remove_file(path).with_context(|| format!("Failed to remove file: {}", path.display()))
    }

    fn remove_dir_all(&self, path: &Path) -> Result<()> {
        fs::remove_dir_all(path)
            .with_context(|| format!("Failed to remove directory: {}", path.display()))
    }
}
