/// An inclusive range of Unicode code points treated as emoji.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnicodeRange {
    /// First code point in the range.
    pub start: u32,
    /// Last code point in the range (inclusive).
    pub end: u32,
    /// Human-readable block name.
    pub name: String,
}

impl UnicodeRange {
    pub fn new(start: u32, end: u32, name: &str) -> Self {
        Self {
            start,
            end,
            name: name.to_string(),
        }
    }

    /// Returns `true` if `c` falls inside this range.
    #[inline]
    pub fn contains(&self, c: char) -> bool {
        let cp = c as u32;
        cp >= self.start && cp <= self.end
    }
}

/// Everything the detector considers an emoji.
///
/// A `PatternSet` is immutable once built. `PatternSet::default()` yields the
/// built-in ranges and literals, which callers may extend with
/// [`PatternSet::with_extra`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternSet {
    /// Code-point ranges matched as `EmojiCategory::Unicode`.
    pub unicode_ranges: Vec<UnicodeRange>,
    /// ASCII emoticons matched with a word-boundary guard.
    pub emoticon_literals: Vec<String>,
    /// Custom tokens (such as `:rocket:`) matched verbatim.
    pub custom_literals: Vec<String>,
}

const DEFAULT_RANGES: &[(u32, u32, &str)] = &[
    (0x1F600, 0x1F64F, "Emoticons"),
    (0x1F300, 0x1F5FF, "Misc Symbols and Pictographs"),
    (0x1F680, 0x1F6FF, "Transport and Map"),
    (0x1F1E0, 0x1F1FF, "Regional Indicators"),
    (0x1F900, 0x1F9FF, "Supplemental Symbols"),
    (0x1FA70, 0x1FAFF, "Extended Symbols-A"),
    (0x2600, 0x26FF, "Misc Symbols"),
    (0x2700, 0x27BF, "Dingbats"),
];

const DEFAULT_EMOTICONS: &[&str] = &[
    ":)", ":-)", ":(", ":-(", ":D", ":-D", ";)", ";-)", ":P", ":-P", ":p", ":-p", ":O", ":-O",
    ":o", ":-o", ":|", ":-|", ":/", ":-/", ":\\", ":-\\", ":*", ":-*", "<3", "</3", "XD", "xD",
    "8)", "8-)", "B)", "B-)",
];

const DEFAULT_CUSTOM: &[&str] = &[
    ":smile:",
    ":heart:",
    ":thumbsup:",
    ":thumbsdown:",
    ":fire:",
    ":rocket:",
    ":star:",
    ":check:",
    ":x:",
    ":warning:",
    ":tada:",
    ":sparkles:",
    ":bug:",
    ":zap:",
    ":lock:",
    ":key:",
    ":memo:",
    ":bulb:",
    ":eyes:",
    ":wave:",
];

impl Default for PatternSet {
    fn default() -> Self {
        Self {
            unicode_ranges: DEFAULT_RANGES
                .iter()
                .map(|&(start, end, name)| UnicodeRange::new(start, end, name))
                .collect(),
            emoticon_literals: DEFAULT_EMOTICONS.iter().map(|s| s.to_string()).collect(),
            custom_literals: DEFAULT_CUSTOM.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl PatternSet {
    /// Creates a pattern set from explicit parts.
    pub fn new(
        unicode_ranges: Vec<UnicodeRange>,
        emoticon_literals: Vec<String>,
        custom_literals: Vec<String>,
    ) -> Self {
        Self {
            unicode_ranges,
            emoticon_literals,
            custom_literals,
        }
    }

    /// Returns a copy with extra emoticon and custom literals appended.
    ///
    /// Literals already present are not added twice.
    pub fn with_extra(&self, emoticons: &[String], custom: &[String]) -> Self {
        let mut out = self.clone();
        for e in emoticons {
            if !out.emoticon_literals.contains(e) {
                out.emoticon_literals.push(e.clone());
            }
        }
        for c in custom {
            if !out.custom_literals.contains(c) {
                out.custom_literals.push(c.clone());
            }
        }
        out
    }

    /// Returns `true` if `c` lies inside any configured Unicode range.
    #[inline]
    pub fn is_emoji_char(&self, c: char) -> bool {
        self.unicode_ranges.iter().any(|r| r.contains(c))
    }
}
