use crate::allowlist::{Allowlist, apply_allowlist};
use crate::backup::write_backup;
use crate::detector::{detect, remove_emojis};
use crate::errors::{Error, Result};
use crate::patterns::PatternSet;
use crate::scanner::{Candidate, DEFAULT_MAX_FILE_SIZE, load_candidate};
use serde::Serialize;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Mode used for files written without an original to copy permissions from.
pub const DEFAULT_FILE_MODE: u32 = 0o644;

const TEMP_PREFIX: &str = ".demoji-";
const TEMP_SUFFIX: &str = ".tmp";

/// Options for cleaning a file.
#[derive(Debug, Clone)]
pub struct ModifyConfig {
    /// Text substituted for every removed emoji.
    pub replacement: String,
    /// If `true`, a timestamped backup is written before the file is changed.
    pub create_backup: bool,
    /// If `true`, allowlisted emoji are left in place.
    pub respect_allowlist: bool,
    /// If `true`, the rewritten file keeps the original permission bits.
    pub preserve_permissions: bool,
    /// If `true`, changes are calculated but nothing is written.
    pub dry_run: bool,
    /// Files above this size are reported as errors. `None` disables the check.
    pub max_file_size: Option<u64>,
}

impl Default for ModifyConfig {
    fn default() -> Self {
        Self {
            replacement: String::new(),
            create_backup: true,
            respect_allowlist: true,
            preserve_permissions: true,
            dry_run: false,
            max_file_size: Some(DEFAULT_MAX_FILE_SIZE),
        }
    }
}

/// The result of cleaning a single file.
#[derive(Debug, Clone, Serialize)]
pub struct ModifyResult {
    pub file_path: PathBuf,
    pub success: bool,
    /// `true` if the file on disk was rewritten.
    pub modified: bool,
    /// Emoji removed, or that would be removed in a dry run.
    pub emojis_removed: usize,
    pub backup_path: Option<PathBuf>,
    pub skipped_reason: Option<String>,
    pub error: Option<String>,
}

impl ModifyResult {
    fn new(path: &Path) -> Self {
        Self {
            file_path: path.to_path_buf(),
            success: false,
            modified: false,
            emojis_removed: 0,
            backup_path: None,
            skipped_reason: None,
            error: None,
        }
    }
}

/// Removes emoji from files on disk.
///
/// Each call to [`FileModifier::modify_file`] is independent; the modifier
/// itself is read-only and is shared across worker threads behind an `Arc`.
pub struct FileModifier {
    patterns: Arc<PatternSet>,
    allowlist: Option<Arc<Allowlist>>,
    config: ModifyConfig,
}

impl FileModifier {
    pub fn new(patterns: Arc<PatternSet>, allowlist: Option<Arc<Allowlist>>, config: ModifyConfig) -> Self {
        Self {
            patterns,
            allowlist,
            config,
        }
    }

    pub fn config(&self) -> &ModifyConfig {
        &self.config
    }

    /// Cleans a single file.
    ///
    /// The process is as follows:
    /// 1. Missing, oversized and unreadable files are reported as errors.
    /// 2. Binary files are skipped and reported as unmodified successes.
    /// 3. Emoji are detected and, if configured, allowlisted ones are dropped.
    /// 4. A backup is written, matches are removed from the end backwards,
    ///    and the new content replaces the file atomically.
    ///
    /// On any failure the original file is left byte-for-byte untouched.
    pub fn modify_file(&self, path: &Path) -> ModifyResult {
        let mut result = ModifyResult::new(path);
        match self.try_modify(path, &mut result) {
            Ok(()) => result.success = true,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to clean file");
                result.success = false;
                result.modified = false;
                result.error = Some(e.to_string());
            }
        }
        result
    }

    fn try_modify(&self, path: &Path, result: &mut ModifyResult) -> Result<()> {
        let (content, metadata) = match load_candidate(path, self.config.max_file_size)? {
            Candidate::Binary => {
                debug!(path = %path.display(), "skipping binary file");
                result.skipped_reason = Some("binary file".to_string());
                return Ok(());
            }
            Candidate::Text { content, metadata } => (content, metadata),
        };

        let mut detection = detect(&content, &self.patterns);
        if self.config.respect_allowlist {
            detection = apply_allowlist(detection, self.allowlist.as_deref());
        }
        if detection.total_count == 0 {
            return Ok(());
        }

        let removed = detection.total_count;
        let new_content = remove_emojis(&content, &detection, &self.config.replacement);

        if self.config.dry_run {
            debug!(path = %path.display(), removed, "dry run, not writing");
            result.emojis_removed = removed;
            return Ok(());
        }

        let permissions = if self.config.preserve_permissions {
            Some(metadata.permissions())
        } else {
            mode_permissions(DEFAULT_FILE_MODE)
        };

        if self.config.create_backup {
            result.backup_path = Some(write_backup(path, &content, Some(metadata.permissions()))?);
        }

        atomic_write(path, &new_content, permissions)?;

        result.modified = true;
        result.emojis_removed = removed;
        debug!(path = %path.display(), removed, "cleaned file");
        Ok(())
    }
}

/// Builds permissions from a Unix mode. Elsewhere there is nothing to build.
pub fn mode_permissions(mode: u32) -> Option<fs::Permissions> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        Some(fs::Permissions::from_mode(mode))
    }
    #[cfg(not(unix))]
    {
        let _ = mode;
        None
    }
}

/// Replaces `path` with `data` so that no partial write is ever observable.
///
/// The data goes to a temp file in the same directory, is flushed and
/// `fsync`ed, gets its permissions set, and is renamed over `path`.
/// Permissions come from `permissions`, falling back to those of the existing
/// file, then to [`DEFAULT_FILE_MODE`]. The temp file is removed on every
/// error path.
pub fn atomic_write(path: &Path, data: &[u8], permissions: Option<fs::Permissions>) -> Result<()> {
    let wrap = |source: io::Error| Error::AtomicWrite {
        path: path.to_path_buf(),
        source,
    };

    let permissions = permissions.or_else(|| match fs::metadata(path) {
        Ok(m) => Some(m.permissions()),
        Err(_) => mode_permissions(DEFAULT_FILE_MODE),
    });

    let temp_file = stage_temp(parent_dir(path), data, permissions).map_err(wrap)?;
    temp_file.persist(path).map_err(|e| wrap(e.error))?;
    Ok(())
}

/// The directory `path` lives in, `.` for a bare file name.
pub(crate) fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

/// Writes `data` to a synced `.demoji-*.tmp` file in `dir`, ready to persist.
///
/// The temp file is deleted when the handle is dropped without persisting.
pub(crate) fn stage_temp(dir: &Path, data: &[u8], permissions: Option<fs::Permissions>) -> io::Result<NamedTempFile> {
    let mut temp_file = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .suffix(TEMP_SUFFIX)
        .tempfile_in(dir)?;
    temp_file.write_all(data)?;
    temp_file.flush()?;
    temp_file.as_file().sync_all()?;

    if let Some(perms) = permissions {
        temp_file.as_file().set_permissions(perms)?;
    }
    Ok(temp_file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn modifier(config: ModifyConfig, allow: Option<&[&str]>) -> FileModifier {
        FileModifier::new(
            Arc::new(PatternSet::default()),
            allow.map(|a| Arc::new(Allowlist::build(a))),
            config,
        )
    }

    fn no_backup() -> ModifyConfig {
        ModifyConfig {
            create_backup: false,
            ..ModifyConfig::default()
        }
    }

    #[test]
    fn test_respects_allowlist() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("status.txt");
        fs::write(&path, "Status: ✅ done, 😀 happy, ❌ failed").unwrap();

        let result = modifier(no_backup(), Some(&["✅", "❌"])).modify_file(&path);

        assert!(result.success, "{:?}", result.error);
        assert!(result.modified);
        assert_eq!(result.emojis_removed, 1);
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "Status: ✅ done,  happy, ❌ failed"
        );
    }

    #[test]
    fn test_allowlist_ignored_when_not_respected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("status.txt");
        fs::write(&path, "✅ 😀").unwrap();

        let config = ModifyConfig {
            respect_allowlist: false,
            ..no_backup()
        };
        let result = modifier(config, Some(&["✅"])).modify_file(&path);

        assert_eq!(result.emojis_removed, 2);
        assert_eq!(fs::read_to_string(&path).unwrap(), " ");
    }

    #[test]
    fn test_replacement_and_backup() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("readme.md");
        let original = "Launch 🚀 today :rocket:\n";
        fs::write(&path, original).unwrap();

        let config = ModifyConfig {
            replacement: "*".to_string(),
            ..ModifyConfig::default()
        };
        let result = modifier(config, None).modify_file(&path);

        assert!(result.success);
        assert_eq!(result.emojis_removed, 2);
        assert_eq!(fs::read_to_string(&path).unwrap(), "Launch * today *\n");

        let backup = result.backup_path.expect("backup written");
        assert_eq!(fs::read_to_string(&backup).unwrap(), original);
        let name = backup.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("readme.backup."));
        assert!(name.ends_with(".md"));
    }

    #[test]
    fn test_dry_run_touches_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("a.txt");
        fs::write(&path, "hi 😀 :)").unwrap();

        let config = ModifyConfig {
            dry_run: true,
            ..ModifyConfig::default()
        };
        let result = modifier(config, None).modify_file(&path);

        assert!(result.success);
        assert!(!result.modified);
        assert_eq!(result.emojis_removed, 2);
        assert!(result.backup_path.is_none());
        assert_eq!(fs::read_to_string(&path).unwrap(), "hi 😀 :)");
        assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_clean_file_is_untouched() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("plain.txt");
        fs::write(&path, "nothing here").unwrap();

        let result = modifier(ModifyConfig::default(), None).modify_file(&path);
        assert!(result.success);
        assert!(!result.modified);
        assert_eq!(result.emojis_removed, 0);
        assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_missing_and_binary_files() {
        let temp_dir = TempDir::new().unwrap();
        let m = modifier(no_backup(), None);

        let missing = m.modify_file(&temp_dir.path().join("gone.txt"));
        assert!(!missing.success);
        assert!(missing.error.is_some());

        let bin = temp_dir.path().join("image.bin");
        let bytes = [0u8, 1, 2, 0xF0, 0x9F, 0x98, 0x80];
        fs::write(&bin, bytes).unwrap();
        let skipped = m.modify_file(&bin);
        assert!(skipped.success);
        assert!(!skipped.modified);
        assert_eq!(fs::read(&bin).unwrap(), bytes);
    }

    #[cfg(unix)]
    #[test]
    fn test_permissions_preserved() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("script.sh");
        fs::write(&path, "echo 🎉\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o750)).unwrap();

        let result = modifier(ModifyConfig::default(), None).modify_file(&path);
        assert!(result.modified);

        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o750);
        let backup_mode = fs::metadata(result.backup_path.unwrap()).unwrap().permissions().mode() & 0o777;
        assert_eq!(backup_mode, 0o750);
    }

    #[test]
    fn test_atomic_write_creates_new_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("fresh.txt");
        atomic_write(&path, b"hello", None).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"hello");
        assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_failed_atomic_write_leaves_target_and_no_temp() {
        let temp_dir = TempDir::new().unwrap();
        // Renaming a file over a non-empty directory fails.
        let target = temp_dir.path().join("target");
        fs::create_dir(&target).unwrap();
        fs::write(target.join("inner.txt"), "keep me").unwrap();

        let err = atomic_write(&target, b"new content", None).unwrap_err();
        assert!(matches!(err, Error::AtomicWrite { .. }));

        assert_eq!(fs::read_to_string(target.join("inner.txt")).unwrap(), "keep me");
        let leftovers: Vec<_> = fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from("target")]);
    }

    fn staged_temps(dir: &Path) -> Vec<String> {
        fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.starts_with(TEMP_PREFIX) && name.ends_with(TEMP_SUFFIX))
            .collect()
    }

    #[test]
    fn test_backup_collision_leaves_file_untouched() {
        use crate::backup::backup_path_for;
        use chrono::{Local, TimeDelta};

        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("keep.txt");
        fs::write(&path, "original 😀").unwrap();

        // Occupy every backup name the clean below could pick.
        let now = Local::now();
        let taken: Vec<PathBuf> = (0..3)
            .map(|s| backup_path_for(&path, now + TimeDelta::seconds(s)))
            .collect();
        for backup in &taken {
            fs::write(backup, "earlier backup").unwrap();
        }

        let result = modifier(ModifyConfig::default(), None).modify_file(&path);

        assert!(!result.success);
        assert!(!result.modified);
        assert!(result.error.as_deref().unwrap().starts_with("Backup failed"));
        assert_eq!(fs::read_to_string(&path).unwrap(), "original 😀");
        for backup in &taken {
            assert_eq!(fs::read_to_string(backup).unwrap(), "earlier backup");
        }
        assert!(staged_temps(temp_dir.path()).is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_read_only_directory_leaves_file_untouched() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("locked");
        fs::create_dir(&dir).unwrap();
        let path = dir.join("keep.txt");
        fs::write(&path, "original 😀").unwrap();
        fs::set_permissions(&dir, fs::Permissions::from_mode(0o555)).unwrap();

        // Permission bits do not bind a privileged user.
        let writable = fs::write(dir.join("writable-check"), "").is_ok();
        if writable {
            let _ = fs::remove_file(dir.join("writable-check"));
            fs::set_permissions(&dir, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let result = modifier(no_backup(), None).modify_file(&path);

        let leftovers = staged_temps(&dir);
        fs::set_permissions(&dir, fs::Permissions::from_mode(0o755)).unwrap();

        assert!(!result.success);
        assert!(!result.modified);
        assert!(result.error.as_deref().unwrap().starts_with("Atomic write failed"));
        assert_eq!(fs::read_to_string(&path).unwrap(), "original 😀");
        assert!(leftovers.is_empty());
    }
}
