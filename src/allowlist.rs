//! Emoji allowlisting.
//!
//! An [`Allowlist`] stores each permitted emoji in a normalized form so that
//! visually identical sequences compare equal regardless of variation
//! selectors, joiners, or other invisible code points.

use crate::detector::DetectionResult;
use std::collections::HashSet;
use unicode_general_category::{GeneralCategory, get_general_category};

/// Invisible code points stripped during normalization in addition to the
/// general-category filter.
const INVISIBLE_SEPARATORS: &[char] = &[
    '\u{00AD}', // soft hyphen
    '\u{034F}', // combining grapheme joiner
    '\u{061C}', // arabic letter mark
    '\u{115F}', // hangul choseong filler
    '\u{1160}', // hangul jungseong filler
    '\u{17B4}',
    '\u{17B5}',
    '\u{180E}', // mongolian vowel separator
    '\u{2060}', // word joiner
    '\u{2061}',
    '\u{2062}',
    '\u{2063}',
    '\u{2064}',
    '\u{3164}', // hangul filler
    '\u{FEFF}', // byte order mark
    '\u{FFA0}', // halfwidth hangul filler
];

/// A normalized set of emoji strings that are exempt from removal.
#[derive(Debug, Clone, Default)]
pub struct Allowlist {
    normalized: HashSet<String>,
    original: Vec<String>,
}

/// Strips invisible and combining code points, then trims whitespace.
pub fn normalize(s: &str) -> String {
    s.chars()
        .filter(|&c| !is_invisible(c))
        .collect::<String>()
        .trim()
        .to_string()
}

fn is_invisible(c: char) -> bool {
    match c {
        '\u{FE0F}' | '\u{FE0E}' | '\u{200D}' | '\u{200C}' => true,
        _ if INVISIBLE_SEPARATORS.contains(&c) => true,
        _ => matches!(
            get_general_category(c),
            GeneralCategory::Format
                | GeneralCategory::NonspacingMark
                | GeneralCategory::EnclosingMark
        ),
    }
}

impl Allowlist {
    /// Builds an allowlist. Duplicates (after normalization) collapse silently.
    pub fn build<S: AsRef<str>>(patterns: &[S]) -> Self {
        let mut normalized = HashSet::with_capacity(patterns.len());
        let mut original = Vec::with_capacity(patterns.len());

        for p in patterns {
            let p = p.as_ref();
            original.push(p.to_string());
            let n = normalize(p);
            if !n.is_empty() {
                normalized.insert(n);
            }
        }

        Self {
            normalized,
            original,
        }
    }

    /// Returns `true` if `emoji` is permitted. The empty string never is.
    pub fn is_allowed(&self, emoji: &str) -> bool {
        if emoji.is_empty() {
            return false;
        }
        self.normalized.contains(&normalize(emoji))
    }

    /// The patterns as supplied, before normalization.
    pub fn original_patterns(&self) -> &[String] {
        &self.original
    }

    /// Number of distinct normalized entries.
    pub fn len(&self) -> usize {
        self.normalized.len()
    }

    pub fn is_empty(&self) -> bool {
        self.normalized.is_empty()
    }

    /// Union of two allowlists, rebuilt so normalization and dedup reapply.
    ///
    /// A missing operand acts as the identity.
    pub fn merge(a: Option<&Allowlist>, b: Option<&Allowlist>) -> Option<Allowlist> {
        match (a, b) {
            (None, None) => None,
            (Some(a), None) => Some(a.clone()),
            (None, Some(b)) => Some(b.clone()),
            (Some(a), Some(b)) => {
                let combined: Vec<&String> = a.original.iter().chain(b.original.iter()).collect();
                Some(Allowlist::build(combined.as_slice()))
            }
        }
    }
}

/// Drops every allowed match and recomputes the counts.
///
/// Metadata (`processed_bytes`, `duration`, `success`) is carried through.
/// Without an allowlist the input is returned unchanged.
pub fn apply_allowlist(detection: DetectionResult, allowlist: Option<&Allowlist>) -> DetectionResult {
    let Some(allowlist) = allowlist else {
        return detection;
    };

    let success = detection.success;
    let mut filtered = DetectionResult {
        matches: detection
            .matches
            .into_iter()
            .filter(|m| !allowlist.is_allowed(&m.emoji))
            .collect(),
        processed_bytes: detection.processed_bytes,
        duration: detection.duration,
        ..DetectionResult::default()
    };
    filtered.finalize();
    filtered.success = success;
    filtered
}
