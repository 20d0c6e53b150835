// =============================================================================
// Lint Configuration
// =============================================================================

// Safety: nothing in this crate needs unsafe
#![deny(unsafe_code)]
// Correctness: must handle all fallible operations
#![deny(unused_must_use)]
// Quality: pedantic but pragmatic
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(rust_2018_idioms)]
#![warn(unreachable_pub)]
#![allow(missing_debug_implementations)] // FileCache holds dyn collaborators which lack Debug
//
// Allowed with documented reasons
#![allow(clippy::missing_errors_doc)] // Error returns self-documenting via anyhow context
#![allow(clippy::module_name_repetitions)] // e.g., fs::StdFilesystem is clearer
#![allow(clippy::must_use_candidate)] // Not all returned values need annotation

//! Filesystem-backed key/value cache store with per-entry expiration.
//!
//! One flat directory, one file per entry: the file name is the sanitized
//! cache name, the content is the raw cached bytes, and the modification
//! time carries the expiration — no separate index. The store is a
//! pluggable backend for a higher-level cache API: what to cache, for how
//! long, and how values serialize are the caller's concerns.
//!
//! Filesystem access and the clock are injected as capabilities
//! ([`Filesystem`], [`Clock`]), so hosts and tests can substitute their
//! own implementations.
//!
//! # Example
//!
//! ```no_run
//! use fscache::{Expiration, FileCache, FindOptions};
//!
//! # fn main() -> anyhow::Result<()> {
//! let cache = FileCache::open("/var/cache/myapp");
//!
//! // Persist a value that survives expire-all sweeps.
//! cache.save("config.rendered", b"...", Expiration::Never)?;
//!
//! // Or one that expires an hour from now.
//! cache.save_ttl("sessions.alice", b"...", 3600)?;
//!
//! // Query by trailing-wildcard prefix.
//! let hits = cache.find(&FindOptions {
//!     names: vec!["sessions.*".into()],
//!     ..FindOptions::default()
//! })?;
//! for hit in hits {
//!     println!("{:?} expires {:?}", hit.name, hit.expires);
//! }
//! # Ok(())
//! # }
//! ```

/// Centralized constants for storage layout and sentinel expirations.
pub mod constants;

/// Filesystem and clock capability interface with std-backed
/// implementations.
pub mod fs;

mod name;
mod query;
mod store;
mod sweep;

pub use fs::{Clock, DirEntry, FileMeta, Filesystem, StdFilesystem, SystemClock};
pub use name::sanitize_name;
pub use query::{CombineMode, Fields, FindOptions, FoundEntry, Operator};
pub use store::{CacheStats, Expiration, FileCache};
