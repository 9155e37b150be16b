//! Byte-level emoji detection.
//!
//! [`detect`] walks a buffer once as Unicode scalar values, collecting runs of
//! pictographs (absorbing skin tones, joiners and variation selectors into the
//! preceding emoji), then searches independently for emoticon and custom
//! literals. The three lists are merged, sorted by byte offset, and overlaps
//! are resolved so the earliest match wins.
//!
//! Detection is total: it never fails, and invalid UTF-8 is decoded as
//! U+FFFD and treated as ordinary text.

use crate::patterns::PatternSet;
use memchr::memmem::Finder;
use serde::{Serialize, Serializer};
use std::collections::HashSet;
use std::time::{Duration, Instant};

/// Skin-tone modifiers, Fitzpatrick types 1-2 through 6.
const SKIN_TONE_START: u32 = 0x1F3FB;
const SKIN_TONE_END: u32 = 0x1F3FF;
const ZERO_WIDTH_JOINER: char = '\u{200D}';
const VARIATION_SELECTOR_16: char = '\u{FE0F}';
const MAX_UTF8_LEN: usize = 4;

/// Which pattern family produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EmojiCategory {
    Unicode,
    Emoticon,
    Custom,
}

impl std::fmt::Display for EmojiCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EmojiCategory::Unicode => "unicode",
            EmojiCategory::Emoticon => "emoticon",
            EmojiCategory::Custom => "custom",
        };
        f.write_str(name)
    }
}

/// One detected occurrence of emoji-like text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmojiMatch {
    /// The matched text.
    pub emoji: String,
    /// Byte offset of the first byte.
    pub start: usize,
    /// Byte offset one past the last byte.
    pub end: usize,
    /// 1-based line number.
    pub line: usize,
    /// 1-based column, counted in scalar values.
    pub column: usize,
    pub category: EmojiCategory,
}

impl EmojiMatch {
    /// Length of the match in bytes.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }
}

/// The finalized output of one scan over one buffer.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DetectionResult {
    /// Matches sorted by `start`, pairwise non-overlapping.
    pub matches: Vec<EmojiMatch>,
    pub total_count: usize,
    /// Number of distinct `emoji` strings in `matches`.
    pub unique_count: usize,
    pub processed_bytes: usize,
    #[serde(serialize_with = "serialize_duration")]
    pub duration: Duration,
    pub success: bool,
}

// Durations are reported as fractional seconds.
fn serialize_duration<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_f64(duration.as_secs_f64())
}

impl DetectionResult {
    /// Creates an empty, not yet finalized result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a match. Callers are responsible for ordering.
    pub fn add_emoji(&mut self, m: EmojiMatch) {
        self.matches.push(m);
        self.total_count = self.matches.len();
    }

    /// Seals the result: recomputes counts and marks it successful.
    pub fn finalize(&mut self) {
        self.total_count = self.matches.len();
        self.unique_count = self
            .matches
            .iter()
            .map(|m| m.emoji.as_str())
            .collect::<HashSet<_>>()
            .len();
        self.success = true;
    }

    pub fn has_matches(&self) -> bool {
        !self.matches.is_empty()
    }
}

/// Scans `content` for everything described by `patterns`.
///
/// Empty content produces an empty, successful result.
pub fn detect(content: &[u8], patterns: &PatternSet) -> DetectionResult {
    let started = Instant::now();
    let mut result = DetectionResult::new();

    if !content.is_empty() {
        let mut found = find_unicode(content, patterns);
        for literal in patterns.emoticon_literals.iter().filter(|l| !l.is_empty()) {
            find_literal(content, literal, EmojiCategory::Emoticon, &mut found);
        }
        for literal in patterns.custom_literals.iter().filter(|l| !l.is_empty()) {
            find_literal(content, literal, EmojiCategory::Custom, &mut found);
        }

        // Stable, so among equal starts the earlier family keeps precedence.
        found.sort_by_key(|m| m.start);

        let mut last_end = 0;
        for m in found {
            if m.start >= last_end {
                last_end = m.end;
                result.add_emoji(m);
            }
        }
        assign_positions(content, &mut result.matches);
    }

    result.processed_bytes = content.len();
    result.duration = started.elapsed();
    result.finalize();
    result
}

/// Removes every match from `content`, substituting `replacement`.
///
/// Matches are applied from the highest offset down so earlier offsets stay
/// valid while splicing.
pub fn remove_emojis(content: &[u8], detection: &DetectionResult, replacement: &str) -> Vec<u8> {
    let mut ordered: Vec<&EmojiMatch> = detection.matches.iter().collect();
    ordered.sort_by(|a, b| b.start.cmp(&a.start));

    let mut out = content.to_vec();
    for m in ordered {
        if m.end <= out.len() && m.start < m.end {
            out.splice(m.start..m.end, replacement.bytes());
        }
    }
    out
}

#[inline]
fn is_modifier(c: char) -> bool {
    let cp = c as u32;
    (SKIN_TONE_START..=SKIN_TONE_END).contains(&cp)
        || c == ZERO_WIDTH_JOINER
        || c == VARIATION_SELECTOR_16
}

/// Collects pictograph runs. Positions are filled in later.
///
/// An invalid sequence always ends a chunk, so a run never spans chunks.
fn find_unicode(content: &[u8], patterns: &PatternSet) -> Vec<EmojiMatch> {
    let mut found = Vec::new();
    let mut base = 0;

    for chunk in content.utf8_chunks() {
        let valid = chunk.valid();
        let mut chars = valid.char_indices().peekable();

        while let Some((i, ch)) = chars.next() {
            if !patterns.is_emoji_char(ch) {
                continue;
            }

            let mut end = i + ch.len_utf8();
            while let Some(&(j, next)) = chars.peek() {
                if !is_modifier(next) {
                    break;
                }
                end = j + next.len_utf8();
                chars.next();
            }

            found.push(EmojiMatch {
                emoji: valid[i..end].to_string(),
                start: base + i,
                end: base + end,
                line: 0,
                column: 0,
                category: EmojiCategory::Unicode,
            });
        }

        base += valid.len() + chunk.invalid().len();
    }

    found
}

fn find_literal(content: &[u8], literal: &str, category: EmojiCategory, found: &mut Vec<EmojiMatch>) {
    let finder = Finder::new(literal.as_bytes());
    let mut pos = 0;

    while pos < content.len() {
        let Some(offset) = finder.find(&content[pos..]) else {
            break;
        };
        let start = pos + offset;
        let end = start + literal.len();

        if category == EmojiCategory::Emoticon && !on_word_boundary(content, start, end) {
            pos = start + 1;
            continue;
        }

        found.push(EmojiMatch {
            emoji: literal.to_string(),
            start,
            end,
            line: 0,
            column: 0,
            category,
        });
        pos = end;
    }
}

/// Rejects a candidate whose neighbors on either side are alphanumeric.
fn on_word_boundary(content: &[u8], start: usize, end: usize) -> bool {
    !char_before(content, start).is_some_and(char::is_alphanumeric)
        && !char_after(content, end).is_some_and(char::is_alphanumeric)
}

/// The scalar ending at byte `at`. Invalid bytes decode as U+FFFD.
fn char_before(content: &[u8], at: usize) -> Option<char> {
    let window = &content[at.saturating_sub(MAX_UTF8_LEN)..at];
    let mut last = None;
    for chunk in window.utf8_chunks() {
        if let Some(ch) = chunk.valid().chars().next_back() {
            last = Some(ch);
        }
        if !chunk.invalid().is_empty() {
            last = Some(char::REPLACEMENT_CHARACTER);
        }
    }
    last
}

/// The scalar starting at byte `at`. Invalid bytes decode as U+FFFD.
fn char_after(content: &[u8], at: usize) -> Option<char> {
    let window = &content[at..content.len().min(at + MAX_UTF8_LEN)];
    let chunk = window.utf8_chunks().next()?;
    chunk.valid().chars().next().or(Some(char::REPLACEMENT_CHARACTER))
}

/// Fills in line and column for `matches`, which must be sorted by start.
///
/// One forward pass over `content`; columns count scalar values and each
/// invalid sequence counts as one.
fn assign_positions(content: &[u8], matches: &mut [EmojiMatch]) {
    let mut next = 0;
    let mut offset = 0;
    let mut line = 1;
    let mut column = 1;

    for chunk in content.utf8_chunks() {
        for ch in chunk.valid().chars() {
            settle(matches, &mut next, offset, line, column);
            if next == matches.len() {
                return;
            }
            offset += ch.len_utf8();
            if ch == '\n' {
                line += 1;
                column = 1;
            } else {
                column += 1;
            }
        }

        let invalid = chunk.invalid();
        if !invalid.is_empty() {
            settle(matches, &mut next, offset, line, column);
            offset += invalid.len();
            column += 1;
        }
    }
}

fn settle(matches: &mut [EmojiMatch], next: &mut usize, offset: usize, line: usize, column: usize) {
    while let Some(m) = matches.get_mut(*next) {
        if m.start > offset {
            break;
        }
        m.line = line;
        m.column = column;
        *next += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_well_formed(result: &DetectionResult) {
        for pair in result.matches.windows(2) {
            assert!(pair[0].start < pair[1].start);
            assert!(pair[0].end <= pair[1].start);
        }
        for m in &result.matches {
            assert!(m.end > m.start);
        }
        assert!(result.unique_count <= result.total_count);
        assert_eq!(result.total_count, result.matches.len());
    }

    #[test]
    fn test_mixed_unicode_and_emoticon() {
        let result = detect("Hello 😀 world! :)".as_bytes(), &PatternSet::default());

        assert!(result.success);
        assert_eq!(result.total_count, 2);
        assert_eq!(result.matches[0].emoji, "😀");
        assert_eq!((result.matches[0].start, result.matches[0].end), (6, 10));
        assert_eq!(result.matches[0].category, EmojiCategory::Unicode);
        assert_eq!(result.matches[1].emoji, ":)");
        assert_eq!((result.matches[1].start, result.matches[1].end), (18, 20));
        assert_eq!(result.matches[1].category, EmojiCategory::Emoticon);
        assert_well_formed(&result);
    }

    #[test]
    fn test_skin_tone_is_absorbed() {
        let content = "👍🏽".as_bytes();
        assert_eq!(content.len(), 8);

        let result = detect(content, &PatternSet::default());
        assert_eq!(result.total_count, 1);
        assert_eq!((result.matches[0].start, result.matches[0].end), (0, 8));
        assert_eq!(result.matches[0].category, EmojiCategory::Unicode);
    }

    #[test]
    fn test_variation_selector_and_zwj_are_absorbed() {
        let result = detect("❤️ ok".as_bytes(), &PatternSet::default());
        assert_eq!(result.total_count, 1);
        assert_eq!(result.matches[0].emoji, "❤️");

        let result = detect("👨\u{200D}x".as_bytes(), &PatternSet::default());
        assert_eq!(result.total_count, 1);
        assert_eq!(result.matches[0].end, "👨\u{200D}".len());
    }

    #[test]
    fn test_empty_content() {
        let result = detect(b"", &PatternSet::default());
        assert!(result.success);
        assert_eq!(result.total_count, 0);
        assert_eq!(result.unique_count, 0);
        assert_eq!(result.processed_bytes, 0);
    }

    #[test]
    fn test_emoticon_word_boundary() {
        let patterns = PatternSet::default();

        assert_eq!(detect(b"smiley:)x", &patterns).total_count, 0);
        assert_eq!(detect(b"see https://example.com", &patterns).total_count, 0);
        assert_eq!(detect(b"nice :) job", &patterns).total_count, 1);
        assert_eq!(detect(b"(:))", &patterns).total_count, 1);
    }

    #[test]
    fn test_custom_literals_have_no_boundary_guard() {
        let result = detect(b"launch:rocket:now", &PatternSet::default());
        assert_eq!(result.total_count, 1);
        assert_eq!(result.matches[0].emoji, ":rocket:");
        assert_eq!(result.matches[0].category, EmojiCategory::Custom);
        assert_eq!(result.matches[0].start, 6);
    }

    #[test]
    fn test_empty_literals_are_skipped() {
        let patterns = PatternSet::new(vec![], vec![String::new()], vec![String::new()]);
        let result = detect(b"anything at all", &patterns);
        assert!(result.success);
        assert_eq!(result.total_count, 0);
    }

    #[test]
    fn test_overlap_first_found_wins() {
        // "x:)" overlaps ":x:" and starts later, so it is dropped.
        let patterns = PatternSet::new(vec![], vec![":)".into()], vec![":x:".into(), "x:)".into()]);
        let result = detect(b" :x:) ", &patterns);
        assert_eq!(result.total_count, 1);
        assert_eq!(result.matches[0].emoji, ":x:");
        assert_well_formed(&result);
    }

    #[test]
    fn test_line_and_column() {
        let result = detect("a\nbc 😀\n:)".as_bytes(), &PatternSet::default());
        assert_eq!(result.total_count, 2);
        assert_eq!((result.matches[0].line, result.matches[0].column), (2, 4));
        assert_eq!((result.matches[1].line, result.matches[1].column), (3, 1));
    }

    #[test]
    fn test_columns_count_invalid_sequences() {
        let mut content = b"\xFF\xFE :)\nab\xF0\x9F ".to_vec();
        content.extend_from_slice("🎉".as_bytes());
        let result = detect(&content, &PatternSet::default());

        assert_eq!(result.total_count, 2);
        assert_eq!((result.matches[0].line, result.matches[0].column), (1, 4));
        assert_eq!(result.matches[1].emoji, "🎉");
        assert_eq!((result.matches[1].line, result.matches[1].column), (2, 5));
    }

    #[test]
    fn test_boundary_checks_multibyte_neighbors() {
        let patterns = PatternSet::default();

        assert_eq!(detect("é:)".as_bytes(), &patterns).total_count, 0);
        assert_eq!(detect(":)日本".as_bytes(), &patterns).total_count, 0);
        assert_eq!(detect("«:)»".as_bytes(), &patterns).total_count, 1);
        assert_eq!(detect(b"\xFF:)\xC3", &patterns).total_count, 1);
    }

    #[test]
    fn test_positions_deep_into_large_buffer() {
        let mut content = "x\n".repeat(200_000);
        content.push_str("ok :) 😀");
        let result = detect(content.as_bytes(), &PatternSet::default());

        assert_eq!(result.total_count, 2);
        assert_eq!((result.matches[0].line, result.matches[0].column), (200_001, 4));
        assert_eq!(result.matches[0].start, 400_003);
        assert_eq!((result.matches[1].line, result.matches[1].column), (200_001, 7));
    }

    #[test]
    fn test_invalid_utf8_is_not_flagged() {
        let mut content = b"ok \xF0\x9F hi ".to_vec();
        content.extend_from_slice("🚀".as_bytes());
        let result = detect(&content, &PatternSet::default());

        assert_eq!(result.total_count, 1);
        assert_eq!(result.matches[0].emoji, "🚀");
        assert_eq!(result.matches[0].start, content.len() - 4);
        assert_eq!(result.processed_bytes, content.len());
    }

    #[test]
    fn test_unique_count() {
        let result = detect("😀 😀 🎉 :) :)".as_bytes(), &PatternSet::default());
        assert_eq!(result.total_count, 5);
        assert_eq!(result.unique_count, 3);

        let distinct = detect("😀 🎉 :)".as_bytes(), &PatternSet::default());
        assert_eq!(distinct.unique_count, distinct.total_count);
    }

    #[test]
    fn test_remove_then_detect_is_clean() {
        let patterns = PatternSet::default();
        let samples = [
            "Hello 😀 world! :)",
            "👍🏽 ship it :rocket: <3",
            "🇺🇸 flags ❤️ and ✅ checks :-D",
            "nothing to see here",
        ];
        for sample in samples {
            let detection = detect(sample.as_bytes(), &patterns);
            let cleaned = remove_emojis(sample.as_bytes(), &detection, "");
            let again = detect(&cleaned, &patterns);
            assert_eq!(again.total_count, 0, "leftovers in {sample:?}");
        }
    }

    #[test]
    fn test_remove_with_replacement() {
        let content = "a 😀 b :) c".as_bytes();
        let detection = detect(content, &PatternSet::default());
        let cleaned = remove_emojis(content, &detection, "[e]");
        assert_eq!(String::from_utf8(cleaned).unwrap(), "a [e] b [e] c");
    }

    #[test]
    fn test_matches_sorted_and_disjoint_on_dense_input() {
        let content = ":):(:D<3😀:rocket:👍🏽:x:;)XD".repeat(5);
        let result = detect(content.as_bytes(), &PatternSet::default());
        assert!(result.total_count > 0);
        assert_well_formed(&result);
    }
}
