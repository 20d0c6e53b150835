//! Cache name sanitization.
//!
//! Logical cache names are arbitrary Unicode chosen by the caller; storage
//! locations are single filesystem segments. [`sanitize_name`] bridges the
//! two: it is deterministic, idempotent on already-safe input, and its
//! output contains only characters safe for one path segment, is at most
//! [`MAX_NAME_LEN`] characters long, and never starts or ends with `.`,
//! `-`, or `_`. Unsafe names are always normalized, never rejected.

use tracing::debug;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use crate::constants::MAX_NAME_LEN;

/// Convert an arbitrary logical cache name into a safe filesystem segment.
///
/// Directory-escape sequences (`..`) are collapsed away before anything
/// else, path separators become `_`, and names that already consist only
/// of ASCII alphanumerics plus `-`, `_`, `.` skip the transliteration
/// fallback entirely.
///
/// # Examples
///
/// ```
/// use fscache::sanitize_name;
///
/// // Already-safe names pass through.
/// assert_eq!(sanitize_name("sessions.user42"), "sessions.user42");
///
/// // Traversal sequences and separators are neutralized.
/// assert_eq!(sanitize_name("../etc/passwd"), "etc_passwd");
///
/// // Everything else is folded to a readable ASCII form.
/// assert_eq!(sanitize_name("café menu"), "cafe_menu");
/// ```
pub fn sanitize_name(raw: &str) -> String {
    // Collapse every run of ".." until none remains, then neutralize
    // separators so the name can't address a sub-path.
    let mut name = raw.to_string();
    while name.contains("..") {
        name = name.replace("..", ".");
    }
    name = name.replace('/', "_");

    let mut name = if is_safe(&name) {
        // Fast path: nothing to transliterate, only the cap applies.
        truncate_ascii(name)
    } else {
        debug!(name = %raw, "Cache name required transliteration");
        let mut folded = truncate_ascii(fold_to_ascii(&name));
        // Dropped combining marks can leave two dots adjacent again.
        while folded.contains("..") {
            folded = folded.replace("..", ".");
        }
        folded
    };

    name = name
        .trim_matches(|c: char| matches!(c, '.' | '-' | '_'))
        .to_string();
    name
}

/// Whether the name consists only of ASCII alphanumerics plus `-`, `_`, `.`.
pub(crate) fn is_safe(name: &str) -> bool {
    name.chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// Cap at [`MAX_NAME_LEN`]. Callers only pass all-ASCII strings, so the
/// byte cut is always a character boundary.
fn truncate_ascii(mut name: String) -> String {
    name.truncate(MAX_NAME_LEN);
    name
}

/// Transliterate to the safe ASCII set: diacritics folded via NFD,
/// everything outside alphanumerics plus `-` and `.` replaced with `_`,
/// replacement runs collapsed to a single `_`.
fn fold_to_ascii(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.nfd() {
        if is_combining_mark(c) {
            continue;
        }
        let mapped = if c.is_ascii_alphanumeric() || matches!(c, '-' | '.') {
            c
        } else {
            '_'
        };
        if mapped == '_' && out.ends_with('_') {
            continue;
        }
        out.push(mapped);
    }
    out
}


#[cfg(test)]
mod property_tests {
    //! Property-based invariants of the sanitizer: the output is always a
    //! safe single path segment, and sanitizing twice changes nothing.

    use proptest::prelude::*;

    use super::*;

    proptest! {
        /// Invariant: output never contains a directory-escape sequence.
        #[test]
        fn never_contains_dot_dot(raw in any::<String>()) {
            prop_assert!(!sanitize_name(&raw).contains(".."));
        }

        /// Invariant: output never contains a path separator.
        #[test]
        fn never_contains_separator(raw in any::<String>()) {
            let out = sanitize_name(&raw);
            prop_assert!(!out.contains('/'));
            prop_assert!(!out.contains('\\'));
        }

        /// Invariant: output length is bounded.
        #[test]
        fn length_bounded(raw in any::<String>()) {
            prop_assert!(sanitize_name(&raw).chars().count() <= MAX_NAME_LEN);
        }

        /// Invariant: output stays within the safe character set.
        #[test]
        fn output_is_safe(raw in any::<String>()) {
            let out = sanitize_name(&raw);
            let all_safe = out.chars().all(|c| {
                c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')
            });
            prop_assert!(all_safe);
        }

        /// Invariant: sanitization is idempotent.
        #[test]
        fn idempotent(raw in any::<String>()) {
            let once = sanitize_name(&raw);
            prop_assert_eq!(sanitize_name(&once), once);
        }

        /// Invariant: output never starts or ends with `.`, `-`, `_`.
        #[test]
        fn edges_trimmed(raw in any::<String>()) {
            let out = sanitize_name(&raw);
            if let Some(first) = out.chars().next() {
                prop_assert!(!matches!(first, '.' | '-' | '_'));
            }
            if let Some(last) = out.chars().last() {
                prop_assert!(!matches!(last, '.' | '-' | '_'));
            }
        }
    }
}
