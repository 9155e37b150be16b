use crate::backup::is_backup_file;
use crate::errors::Result;
use ignore::WalkBuilder;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Lower-cases extensions and strips any leading dot.
pub fn normalize_extensions(extensions: &[String]) -> Vec<String> {
    extensions
        .iter()
        .map(|e| e.trim().trim_start_matches('.').to_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}

/// Expands `inputs` into the list of files to process.
///
/// Files are passed through as given, even if missing, so the caller gets a
/// per-file error for them. Directories are walked with `.gitignore`
/// awareness; only regular files with a matching extension and no excluded
/// path component are kept. Backups written by this tool are never returned.
pub fn discover_files(inputs: &[PathBuf], extensions: &[String], exclude: &[String]) -> Result<Vec<PathBuf>> {
    let exts = normalize_extensions(extensions);
    let mut seen = HashSet::new();
    let mut files = Vec::new();

    for input in inputs {
        if !input.is_dir() {
            if seen.insert(input.clone()) {
                files.push(input.clone());
            }
            continue;
        }

        let mut walker = WalkBuilder::new(input);
        walker.standard_filters(true); // Respect .gitignore

        for entry in walker.build() {
            let entry = entry?;
            let path = entry.path();

            if !path.is_file()
                || is_excluded(path, exclude)
                || !should_process_file(path, &exts)
                || is_backup_file(path)
            {
                continue;
            }
            if seen.insert(path.to_path_buf()) {
                files.push(path.to_path_buf());
            }
        }
    }

    debug!(count = files.len(), "discovered files");
    Ok(files)
}

fn is_excluded(path: &Path, exclude: &[String]) -> bool {
    exclude
        .iter()
        .any(|ex| path.components().any(|c| c.as_os_str() == ex.as_str()))
}

/// A helper function to determine if a file should be processed based on its extension.
fn should_process_file(path: &Path, extensions: &[String]) -> bool {
    if extensions.is_empty() {
        return true;
    }

    path.extension()
        .and_then(|os| os.to_str())
        .map(|s| extensions.contains(&s.to_lowercase()))
        .unwrap_or(false)
}
