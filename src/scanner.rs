use crate::allowlist::{Allowlist, apply_allowlist};
use crate::detector::{DetectionResult, detect};
use crate::errors::{Error, Result};
use crate::patterns::PatternSet;
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Files above this size are rejected unless the caller overrides it.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// How many leading bytes the binary heuristic inspects.
const BINARY_SAMPLE_LEN: usize = 8192;

/// Share of control characters above which a sample counts as binary.
const CONTROL_CHAR_THRESHOLD: f64 = 0.30;

/// The outcome of scanning a single file.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessResult {
    pub file_path: PathBuf,
    pub success: bool,
    /// Present when the file was read and scanned.
    pub detection: Option<DetectionResult>,
    /// Why a readable file was not scanned (for example, binary content).
    pub skipped_reason: Option<String>,
    pub error: Option<String>,
}

impl ProcessResult {
    fn failed(path: &Path, err: &Error) -> Self {
        Self {
            file_path: path.to_path_buf(),
            success: false,
            detection: None,
            skipped_reason: None,
            error: Some(err.to_string()),
        }
    }

    /// Number of emoji found, zero when the file was skipped or failed.
    pub fn emoji_count(&self) -> usize {
        self.detection.as_ref().map_or(0, |d| d.total_count)
    }
}

/// A file that passed the existence and size checks.
pub(crate) enum Candidate {
    Text {
        content: Vec<u8>,
        metadata: fs::Metadata,
    },
    Binary,
}

/// Reads `path` if it exists, is a regular file, and fits under the size
/// limit, classifying the content as text or binary.
pub(crate) fn load_candidate(path: &Path, max_file_size: Option<u64>) -> Result<Candidate> {
    let metadata = match fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(Error::NotFound(path.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };

    if !metadata.is_file() {
        return Err(format!("Not a regular file: {}", path.display()).into());
    }

    if let Some(limit) = max_file_size {
        if metadata.len() > limit {
            return Err(Error::FileTooLarge {
                path: path.to_path_buf(),
                size: metadata.len(),
                limit,
            });
        }
    }

    let content = fs::read(path)?;
    if is_binary(&content[..content.len().min(BINARY_SAMPLE_LEN)]) {
        return Ok(Candidate::Binary);
    }

    Ok(Candidate::Text { content, metadata })
}

/// Heuristic binary detection over a leading sample of a file.
///
/// A sample is binary if it contains a NUL byte, is not valid UTF-8, or more
/// than 30% of its characters are control characters other than tab,
/// newline and carriage return. A multi-byte sequence cut off at the end of
/// the sample is not held against it.
pub fn is_binary(sample: &[u8]) -> bool {
    if sample.contains(&0) {
        return true;
    }

    let text = match std::str::from_utf8(sample) {
        Ok(t) => t,
        Err(e) if e.error_len().is_none() => match std::str::from_utf8(&sample[..e.valid_up_to()]) {
            Ok(t) => t,
            Err(_) => return true,
        },
        Err(_) => return true,
    };

    let mut total = 0usize;
    let mut control = 0usize;
    for c in text.chars() {
        total += 1;
        if c.is_control() && !matches!(c, '\t' | '\n' | '\r') {
            control += 1;
        }
    }

    total > 0 && (control as f64 / total as f64) > CONTROL_CHAR_THRESHOLD
}

/// Scans files for emoji.
///
/// A `Scanner` is immutable and cheap to share across worker threads behind
/// an `Arc`.
pub struct Scanner {
    patterns: Arc<PatternSet>,
    allowlist: Option<Arc<Allowlist>>,
    max_file_size: Option<u64>,
}

impl Scanner {
    /// Creates a new `Scanner`. Matches permitted by `allowlist` are not counted.
    pub fn new(patterns: Arc<PatternSet>, allowlist: Option<Arc<Allowlist>>) -> Self {
        Self {
            patterns,
            allowlist,
            max_file_size: Some(DEFAULT_MAX_FILE_SIZE),
        }
    }

    /// Overrides the size limit. `None` disables it.
    pub fn with_max_file_size(mut self, limit: Option<u64>) -> Self {
        self.max_file_size = limit;
        self
    }

    pub fn patterns(&self) -> &PatternSet {
        &self.patterns
    }

    /// Scans an in-memory buffer.
    pub fn scan_bytes(&self, content: &[u8]) -> DetectionResult {
        apply_allowlist(detect(content, &self.patterns), self.allowlist.as_deref())
    }

    /// Scans a single file. Never fails: problems are reported in the result.
    pub fn scan_file(&self, path: &Path) -> ProcessResult {
        match load_candidate(path, self.max_file_size) {
            Ok(Candidate::Binary) => {
                debug!(path = %path.display(), "skipping binary file");
                ProcessResult {
                    file_path: path.to_path_buf(),
                    success: true,
                    detection: None,
                    skipped_reason: Some("binary file".to_string()),
                    error: None,
                }
            }
            Ok(Candidate::Text { content, .. }) => {
                let detection = self.scan_bytes(&content);
                debug!(
                    path = %path.display(),
                    found = detection.total_count,
                    "scanned file"
                );
                ProcessResult {
                    file_path: path.to_path_buf(),
                    success: true,
                    detection: Some(detection),
                    skipped_reason: None,
                    error: None,
                }
            }
            Err(e) => ProcessResult::failed(path, &e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn scanner() -> Scanner {
        Scanner::new(Arc::new(PatternSet::default()), None)
    }

    #[test]
    fn test_is_binary() {
        assert!(!is_binary(b""));
        assert!(!is_binary("plain text with tabs\tand\r\nnewlines 😀".as_bytes()));
        assert!(is_binary(b"abc\0def"));
        assert!(is_binary(b"\xFF\xFEabc"));
        assert!(is_binary(b"\x01\x02\x03\x04abc"));
        assert!(!is_binary(b"\x01abcdefghij"));
    }

    #[test]
    fn test_truncated_sequence_at_sample_end_is_text() {
        let sample = "hello 😀".as_bytes();
        assert!(!is_binary(&sample[..sample.len() - 1]));
    }

    #[test]
    fn test_scan_file() {
        let temp_dir = TempDir::new().unwrap();
        let test_file = temp_dir.path().join("notes.md");
        fs::write(&test_file, "# Notes 🚀\nship it :) \n").unwrap();

        let result = scanner().scan_file(&test_file);

        assert!(result.success);
        assert!(result.error.is_none());
        assert_eq!(result.emoji_count(), 2);
        let detection = result.detection.unwrap();
        assert_eq!(detection.matches[0].line, 1);
        assert_eq!(detection.matches[1].line, 2);
    }

    #[test]
    fn test_missing_file_is_reported_not_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let result = scanner().scan_file(&temp_dir.path().join("nope.txt"));

        assert!(!result.success);
        assert!(result.error.unwrap().contains("not found"));
    }

    #[test]
    fn test_binary_file_is_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let test_file = temp_dir.path().join("blob.bin");
        fs::write(&test_file, b"\x00\x01\x02 \xF0\x9F\x98\x80").unwrap();

        let result = scanner().scan_file(&test_file);
        assert!(result.success);
        assert!(result.detection.is_none());
        assert_eq!(result.skipped_reason.as_deref(), Some("binary file"));
    }

    #[test]
    fn test_oversized_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let test_file = temp_dir.path().join("big.txt");
        fs::write(&test_file, "😀".repeat(16)).unwrap();

        let result = scanner().with_max_file_size(Some(8)).scan_file(&test_file);
        assert!(!result.success);
        assert!(result.error.unwrap().contains("too large"));
    }

    #[test]
    fn test_allowlisted_emoji_are_not_counted() {
        let allow = Allowlist::build(&["✅"]);
        let scanner = Scanner::new(Arc::new(PatternSet::default()), Some(Arc::new(allow)));
        let detection = scanner.scan_bytes("✅ ok, 😀 not ok".as_bytes());
        assert_eq!(detection.total_count, 1);
        assert_eq!(detection.matches[0].emoji, "😀");
    }
}
