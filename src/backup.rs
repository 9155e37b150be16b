//! Backup files written before a file is cleaned, plus restore and cleanup.
//!
//! A backup of `dir/name.ext` is written next to it as
//! `dir/name.backup.<YYYYMMDDHHMMSS>.ext` with the original's permissions.

use crate::errors::{Error, Result};
use crate::modifier::{atomic_write, parent_dir, stage_temp};
use chrono::{DateTime, Local};
use ignore::WalkBuilder;
use rayon::prelude::*;
use regex::Regex;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info, warn};

const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

// stem, timestamp, optional extension (with its dot)
static BACKUP_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.+)\.backup\.(\d{14})(\.[^.]+)?$").expect("backup name pattern is valid")
});

/// Computes the backup path for `path` at `timestamp`.
pub fn backup_path_for(path: &Path, timestamp: DateTime<Local>) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let name = format!("{stem}.backup.{}{ext}", timestamp.format(TIMESTAMP_FORMAT));
    path.with_file_name(name)
}

/// Splits a backup file name into the original file name and its timestamp.
pub fn parse_backup_name(file_name: &str) -> Option<(String, String)> {
    let caps = BACKUP_NAME.captures(file_name)?;
    let stem = caps.get(1)?.as_str();
    let timestamp = caps.get(2)?.as_str().to_string();
    let ext = caps.get(3).map_or("", |m| m.as_str());
    Some((format!("{stem}{ext}"), timestamp))
}

/// Returns `true` if `path` looks like a backup written by this tool.
pub fn is_backup_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| parse_backup_name(n).is_some())
}

/// Writes `content` to a fresh backup of `path` using the given permissions.
///
/// An existing file at the backup path is never replaced. A second clean of
/// the same file within one second therefore fails with [`Error::Backup`]
/// and leaves both the file and the earlier backup untouched.
pub fn write_backup(path: &Path, content: &[u8], permissions: Option<fs::Permissions>) -> Result<PathBuf> {
    write_backup_at(path, content, permissions, Local::now())
}

fn write_backup_at(
    path: &Path,
    content: &[u8],
    permissions: Option<fs::Permissions>,
    timestamp: DateTime<Local>,
) -> Result<PathBuf> {
    let backup_path = backup_path_for(path, timestamp);
    let wrap = |source: std::io::Error| Error::Backup {
        path: backup_path.clone(),
        source,
    };

    let temp_file = stage_temp(parent_dir(&backup_path), content, permissions).map_err(wrap)?;
    temp_file.persist_noclobber(&backup_path).map_err(|e| wrap(e.error))?;

    debug!(backup = %backup_path.display(), "wrote backup");
    Ok(backup_path)
}

/// Statistics from a restore operation.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RestoreStats {
    /// The number of backup files found.
    pub found: usize,
    /// The number of files successfully restored from backups.
    pub restored: usize,
    /// The number of restores that failed.
    pub failed: usize,
}

/// Statistics from a backup cleanup.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanupStats {
    pub found: usize,
    pub removed: usize,
    pub total_bytes: u64,
}

/// Collects every backup under `dir`, ignoring `.gitignore` rules so that
/// ignored files' backups are found too.
pub fn find_backups(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut backups = Vec::new();
    let mut walker = WalkBuilder::new(dir);
    walker.standard_filters(false).hidden(false);

    for entry in walker.build() {
        let entry = entry?;
        let path = entry.path();
        if path.is_file() && is_backup_file(path) {
            backups.push(path.to_path_buf());
        }
    }
    Ok(backups)
}

/// Restores each original under `dir` from its newest backup.
///
/// # Arguments
///
/// * `dir` - The directory to scan for backup files.
/// * `keep_backups` - If `false`, every backup of a restored file is deleted.
pub fn restore_backups(dir: &Path, keep_backups: bool, workers: Option<usize>) -> Result<RestoreStats> {
    let backups = find_backups(dir)?;
    let found = backups.len();

    // original path -> (timestamp, backup path) for every backup of it
    let mut grouped: HashMap<PathBuf, Vec<(String, PathBuf)>> = HashMap::new();
    for backup in backups {
        let Some(name) = backup.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if let Some((original_name, timestamp)) = parse_backup_name(name) {
            let original = backup.with_file_name(original_name);
            grouped.entry(original).or_default().push((timestamp, backup));
        }
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.unwrap_or_else(num_cpus::get))
        .build()?;

    let restored = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);

    pool.install(|| {
        grouped.par_iter_mut().for_each(|(original, versions)| {
            versions.sort();
            let Some((_, newest)) = versions.last() else {
                return;
            };
            match restore_one(newest, original) {
                Ok(()) => {
                    restored.fetch_add(1, Ordering::Relaxed);
                    info!(file = %original.display(), from = %newest.display(), "restored");
                    if !keep_backups {
                        for (_, backup) in versions.iter() {
                            if let Err(e) = fs::remove_file(backup) {
                                warn!(backup = %backup.display(), error = %e, "failed to remove backup");
                            }
                        }
                    }
                }
                Err(e) => {
                    failed.fetch_add(1, Ordering::Relaxed);
                    warn!(file = %original.display(), error = %e, "restore failed");
                }
            }
        });
    });

    Ok(RestoreStats {
        found,
        restored: restored.load(Ordering::Relaxed),
        failed: failed.load(Ordering::Relaxed),
    })
}

fn restore_one(backup: &Path, original: &Path) -> Result<()> {
    let content = fs::read(backup)?;
    let permissions = fs::metadata(backup)?.permissions();
    atomic_write(original, &content, Some(permissions))
}

/// Removes (or with `dry_run`, only counts) every backup under `dir`.
pub fn clean_backups(dir: &Path, dry_run: bool) -> Result<CleanupStats> {
    let mut stats = CleanupStats::default();

    for path in find_backups(dir)? {
        stats.found += 1;
        if let Ok(metadata) = path.metadata() {
            stats.total_bytes += metadata.len();
        }

        if dry_run {
            debug!(backup = %path.display(), "would remove");
            continue;
        }
        match fs::remove_file(&path) {
            Ok(()) => stats.removed += 1,
            Err(e) => warn!(backup = %path.display(), error = %e, "failed to remove backup"),
        }
    }

    Ok(stats)
}
