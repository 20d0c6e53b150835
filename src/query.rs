//! Query engine over stored cache entries.
//!
//! [`FileCache::find`] filters entries by name (exact or trailing-wildcard
//! prefix) and by expiration conditions, and returns only the fields the
//! caller asked for. Expiration conditions arrive as `"<operator> <date>"`
//! strings and are parsed once per query, not once per scanned entry.
//!
//! Result order is directory enumeration order; callers needing a
//! deterministic order must sort the returned list themselves.

use std::collections::HashSet;
use std::path::Path;

use anyhow::Result;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::constants::{EXPIRES_DATE_FORMAT, EXPIRES_FORMAT};
use crate::name::{is_safe, sanitize_name};
use crate::store::{FileCache, entry_stem, unix_secs_of};

/// Comparison operator of an expiration condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// Candidate equals the reference.
    Eq,
    /// Candidate is strictly after the reference.
    Gt,
    /// Candidate is strictly before the reference.
    Lt,
    /// Candidate is at or after the reference.
    Ge,
    /// Candidate is at or before the reference.
    Le,
}

impl Operator {
    /// Parse an operator token; anything unrecognized is `None`.
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "=" => Some(Self::Eq),
            ">" => Some(Self::Gt),
            "<" => Some(Self::Lt),
            ">=" => Some(Self::Ge),
            "<=" => Some(Self::Le),
            _ => None,
        }
    }

    /// Evaluate `candidate <op> reference` on unix-second timestamps.
    pub fn matches(self, candidate: i64, reference: i64) -> bool {
        match self {
            Self::Eq => candidate == reference,
            Self::Gt => candidate > reference,
            Self::Lt => candidate < reference,
            Self::Ge => candidate >= reference,
            Self::Le => candidate <= reference,
        }
    }
}

/// How multiple expiration conditions combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CombineMode {
    /// True if any condition matches; stops at the first match.
    #[default]
    Or,
    /// True only if every condition matches.
    And,
}

/// One parsed `(operator, reference timestamp)` pair.
///
/// A condition with an unparseable date never matches; this is the same
/// defensive default as an unrecognized operator, not an error.
#[derive(Debug, Clone, Copy)]
struct Condition {
    op: Operator,
    reference: Option<i64>,
}

impl Condition {
    /// Parse `"<operator> <date>"`; the operator defaults to `=` when the
    /// leading token is not a recognized operator (which also covers bare
    /// dates, whose first token is the date itself).
    fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        let (op, date) = match trimmed.split_once(' ') {
            Some((head, rest)) if Operator::parse(head).is_some() => {
                // The guard just matched, so the token parses.
                (Operator::parse(head).unwrap_or(Operator::Eq), rest.trim())
            }
            _ => (Operator::Eq, trimmed),
        };

        let reference = parse_reference(date);
        if reference.is_none() {
            warn!(condition = %raw, "Unparseable expiration condition never matches");
        }
        Self { op, reference }
    }

    fn matches(self, candidate: i64) -> bool {
        self.reference
            .is_some_and(|reference| self.op.matches(candidate, reference))
    }
}

/// Parse a condition date as UTC unix seconds.
fn parse_reference(date: &str) -> Option<i64> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(date, EXPIRES_FORMAT) {
        return Some(dt.and_utc().timestamp());
    }
    NaiveDate::parse_from_str(date, EXPIRES_DATE_FORMAT)
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp())
}

fn conditions_match(conditions: &[Condition], mode: CombineMode, candidate: i64) -> bool {
    match mode {
        CombineMode::Or => conditions.iter().any(|c| c.matches(candidate)),
        CombineMode::And => conditions.iter().all(|c| c.matches(candidate)),
    }
}

/// Which fields [`FileCache::find`] populates in each result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fields {
    /// Populate [`FoundEntry::name`].
    pub name: bool,
    /// Populate [`FoundEntry::expires`].
    pub expires: bool,
    /// Populate [`FoundEntry::data`].
    pub data: bool,
    /// Populate [`FoundEntry::size`].
    pub size: bool,
}

impl Fields {
    /// Every field populated.
    pub const ALL: Self = Self {
        name: true,
        expires: true,
        data: true,
        size: true,
    };

    /// Metadata only: everything except the value bytes.
    pub const METADATA: Self = Self {
        name: true,
        expires: true,
        data: false,
        size: true,
    };
}

impl Default for Fields {
    fn default() -> Self {
        Self::ALL
    }
}

/// Filters and projection for [`FileCache::find`].
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    /// Exact names and/or trailing-wildcard patterns (`"foo*"`). Empty
    /// means no name constraint.
    pub names: Vec<String>,
    /// Expiration conditions, `"<operator> <date>"` with the operator
    /// defaulting to `=`. Empty means no expiration constraint.
    pub expires: Vec<String>,
    /// How [`FindOptions::expires`] conditions combine.
    pub expires_mode: CombineMode,
    /// Which fields to populate in each result.
    pub get: Fields,
}

/// One query result; fields not requested via [`Fields`] are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FoundEntry {
    /// Sanitized entry name.
    pub name: Option<String>,
    /// Expiration as an absolute date-time string (UTC).
    pub expires: Option<String>,
    /// The stored value bytes.
    pub data: Option<Vec<u8>>,
    /// Value size in bytes.
    pub size: Option<u64>,
}

impl FileCache {
    /// Find stored entries by name and/or expiration.
    ///
    /// Name patterns ending in `*` match by prefix (the pattern is
    /// right-trimmed of `*`); this is deliberately not full glob matching.
    /// All other names require exact equality and are probed directly at
    /// their resolved location instead of scanning: when every name is
    /// exact, the directory scan is skipped entirely. A criterion with no
    /// filters supplied always matches.
    ///
    /// Entries that fail to read mid-query are skipped, matching sweep
    /// semantics; only a failure to enumerate the root is an error.
    pub fn find(&self, options: &FindOptions) -> Result<Vec<FoundEntry>> {
        let conditions: Vec<Condition> =
            options.expires.iter().map(|s| Condition::parse(s)).collect();
        let has_conditions = !conditions.is_empty();

        // Exact names are a set: each is checked once, then dropped from
        // further consideration even if it did not match the filters.
        let mut exact: Vec<String> = Vec::new();
        let mut checked: HashSet<String> = HashSet::new();
        let mut prefixes: Vec<String> = Vec::new();
        for raw in &options.names {
            if raw.contains('*') {
                // Already-safe prefixes compare verbatim (a trailing "." or
                // "_" is meaningful); unsafe ones are normalized the same
                // way stored names were.
                let stripped = raw.trim_end_matches('*');
                prefixes.push(if is_safe(stripped) {
                    stripped.to_string()
                } else {
                    sanitize_name(stripped)
                });
            } else {
                let safe = sanitize_name(raw);
                if checked.insert(safe.clone()) {
                    exact.push(safe);
                }
            }
        }

        let mut results = Vec::new();

        // Direct O(1) lookups for exact names.
        for safe in &exact {
            let path = self.entry_path(safe);
            if !self.fs_ref().file_exists(&path) {
                continue;
            }
            let Ok(meta) = self.fs_ref().metadata(&path) else {
                continue;
            };
            let mtime = unix_secs_of(meta.modified);
            if has_conditions && !conditions_match(&conditions, options.expires_mode, mtime) {
                continue;
            }
            match self.build_entry(safe, &path, mtime, meta.size, options.get) {
                Ok(entry) => results.push(entry),
                Err(e) => debug!(entry = %safe, error = %e, "Skipping unreadable cache entry"),
            }
        }

        // Every requested name was exact and has been resolved directly;
        // no scan needed.
        if !options.names.is_empty() && prefixes.is_empty() {
            return Ok(results);
        }

        for entry in self.entries()? {
            let Some(stem) = entry_stem(&entry.name) else {
                continue;
            };
            if checked.contains(stem) {
                continue;
            }
            if !options.names.is_empty()
                && !prefixes.iter().any(|p| stem.starts_with(p.as_str()))
            {
                continue;
            }
            let mtime = unix_secs_of(entry.modified);
            if has_conditions && !conditions_match(&conditions, options.expires_mode, mtime) {
                continue;
            }
            let path = self.root().join(&entry.name);
            match self.build_entry(stem, &path, mtime, entry.size, options.get) {
                Ok(found) => results.push(found),
                Err(e) => debug!(entry = %stem, error = %e, "Skipping unreadable cache entry"),
            }
        }

        Ok(results)
    }

    fn build_entry(
        &self,
        name: &str,
        path: &Path,
        mtime_secs: i64,
        size: u64,
        get: Fields,
    ) -> Result<FoundEntry> {
        let data = if get.data {
            Some(self.read(path)?)
        } else {
            None
        };
        Ok(FoundEntry {
            name: get.name.then(|| name.to_string()),
            expires: get.expires.then(|| format_expires(mtime_secs)),
            data,
            size: get.size.then_some(size),
        })
    }
}

/// Format unix seconds as an absolute UTC date-time string.
fn format_expires(secs: i64) -> String {
    DateTime::<Utc>::from_timestamp(secs, 0)
        .map(|dt| dt.format(EXPIRES_FORMAT).to_string())
        .unwrap_or_default()
}
