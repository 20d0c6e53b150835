//! Centralized constants for storage layout and sentinel expirations.
//!
//! All magic values in the store are defined here with documented
//! rationale, so limits and sentinels can be audited in one place.

/// File suffix for cache entries, including the dot.
///
/// Only files bearing this suffix are treated as entries during scans;
/// everything else in the cache root (temp files, foreign files,
/// subdirectories) is ignored.
pub const CACHE_SUFFIX: &str = ".cache";

/// Maximum length of a sanitized cache name, in characters (191).
///
/// Keeps the full file name (name + suffix) comfortably under the 255-byte
/// limit common to filesystems, with headroom for temp-file decorations
/// during atomic writes.
pub const MAX_NAME_LEN: usize = 191;

/// Sentinel expiration for entries protected from delete-all sweeps
/// (unix seconds).
///
/// An entry whose modification time equals this exact value survives
/// [`delete_all`](crate::FileCache::delete_all). Chosen far below any real
/// expiration so it can never collide with an ordinary timestamp.
pub const EXPIRE_RESERVED_UNIX: i64 = 5;

/// Sentinel expiration for entries that never expire (unix seconds).
///
/// Expire-all sweeps delete only entries whose modification time is
/// strictly greater than this value, so entries stamped at or below it
/// (including [`EXPIRE_RESERVED_UNIX`]) are spared. Must stay greater than
/// `EXPIRE_RESERVED_UNIX` so reserved entries also survive expiration
/// sweeps.
pub const EXPIRE_NEVER_UNIX: i64 = 10;

/// Format of expiration strings in query conditions and results.
pub const EXPIRES_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Fallback format for date-only query conditions (midnight assumed).
pub const EXPIRES_DATE_FORMAT: &str = "%Y-%m-%d";
