//! Entry points behind each subcommand.
//!
//! Flags given on the command line override values from the config file;
//! list-valued settings (excludes, allowlist) are combined instead.

use crate::allowlist::Allowlist;
use crate::backup::{clean_backups, restore_backups};
use crate::config::{ConfigLoader, EmojiConfig};
use crate::discovery::discover_files;
use crate::errors::Result;
use crate::modifier::{FileModifier, ModifyConfig, ModifyResult};
use crate::output_formatter::{OutputFormat, OutputFormatter};
use crate::pipeline::Pipeline;
use crate::scanner::{DEFAULT_MAX_FILE_SIZE, Scanner};
use indicatif::{ProgressBar, ProgressStyle};
use std::env;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Settings shared by `scan` and `clean`.
#[derive(Debug, Clone, Default)]
pub struct InputOptions {
    pub config: Option<PathBuf>,
    pub extensions: Vec<String>,
    pub exclude: Vec<String>,
    pub workers: Option<usize>,
    pub inputs: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub input: InputOptions,
    pub format: OutputFormat,
    pub output: Option<PathBuf>,
    pub include_summary: bool,
}

#[derive(Debug, Clone, Default)]
pub struct CleanOptions {
    pub input: InputOptions,
    pub replacement: Option<String>,
    pub no_backup: bool,
    pub dry_run: bool,
    pub no_allowlist: bool,
    pub allow: Vec<String>,
    pub verbose: bool,
}

/// The fully resolved inputs of a batch.
struct Batch {
    config: EmojiConfig,
    files: Vec<PathBuf>,
    workers: usize,
    max_file_size: Option<u64>,
}

fn prepare(input: &InputOptions) -> Result<Batch> {
    let working_dir = working_dir_for(&input.inputs)?;
    let (config, source) = ConfigLoader::resolve(input.config.as_deref(), &working_dir)?;
    if let Some(source) = &source {
        info!(config = %source.display(), "loaded configuration");
    }

    let extensions = if input.extensions.is_empty() {
        config.extensions.clone()
    } else {
        input.extensions.clone()
    };
    let mut exclude = config.exclude.clone();
    exclude.extend(input.exclude.iter().cloned());

    let files = discover_files(&input.inputs, &extensions, &exclude)?;
    let workers = input.workers.or(config.workers).unwrap_or(0);
    let max_file_size = match config.max_file_size {
        Some(0) => None,
        Some(limit) => Some(limit),
        None => Some(DEFAULT_MAX_FILE_SIZE),
    };

    Ok(Batch {
        config,
        files,
        workers,
        max_file_size,
    })
}

/// Config files are looked up relative to the first input.
fn working_dir_for(inputs: &[PathBuf]) -> Result<PathBuf> {
    match inputs.first() {
        Some(first) if first.is_dir() => Ok(first.clone()),
        Some(first) => match first.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => Ok(parent.to_path_buf()),
            _ => Ok(env::current_dir()?),
        },
        None => Ok(env::current_dir()?),
    }
}

/// The main entry point for the `scan` command.
///
/// Returns `true` if any emoji was reported.
pub fn run_scan(options: ScanOptions) -> Result<bool> {
    let batch = prepare(&options.input)?;

    let allowlist = match batch.config.respect_allowlist {
        Some(false) => None,
        _ => batch.config.allowlist().map(Arc::new),
    };
    let scanner = Scanner::new(Arc::new(batch.config.pattern_set()), allowlist)
        .with_max_file_size(batch.max_file_size);

    let results = Pipeline::new(batch.workers).scan_files(Arc::new(scanner), &batch.files);
    for r in results.iter().filter(|r| !r.success) {
        warn!(file = %r.file_path.display(), error = r.error.as_deref().unwrap_or(""), "scan failed");
    }

    let mut writer: Box<dyn Write> = match &options.output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(std::io::stdout().lock()),
    };
    OutputFormatter::new(options.format, options.include_summary).write_output(&mut writer, &results)?;

    Ok(results.iter().any(|r| r.emoji_count() > 0))
}

/// The main entry point for the `clean` command.
pub fn run_clean(options: CleanOptions) -> Result<Vec<ModifyResult>> {
    let batch = prepare(&options.input)?;
    let config = &batch.config;

    let cli_allowlist = (!options.allow.is_empty()).then(|| Allowlist::build(options.allow.as_slice()));
    let allowlist = Allowlist::merge(config.allowlist().as_ref(), cli_allowlist.as_ref());

    let modify_config = ModifyConfig {
        replacement: options
            .replacement
            .clone()
            .or_else(|| config.replacement.clone())
            .unwrap_or_default(),
        create_backup: !options.no_backup && config.backup.unwrap_or(true),
        respect_allowlist: !options.no_allowlist && config.respect_allowlist.unwrap_or(true),
        dry_run: options.dry_run,
        max_file_size: batch.max_file_size,
        ..ModifyConfig::default()
    };
    let modifier = FileModifier::new(Arc::new(config.pattern_set()), allowlist.map(Arc::new), modify_config);

    let pb = ProgressBar::new(batch.files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-"),
    );

    let verbose = options.verbose || options.dry_run;
    let results = Pipeline::new(batch.workers).clean_files_with(Arc::new(modifier), &batch.files, |r| {
        pb.inc(1);
        if let Some(error) = &r.error {
            pb.suspend(|| warn!(file = %r.file_path.display(), error = error.as_str(), "clean failed"));
        } else if verbose && r.emojis_removed > 0 {
            pb.suspend(|| report_change(&r.file_path, r, options.dry_run));
        }
    });
    pb.finish_and_clear();

    let changed = results.iter().filter(|r| r.modified).count();
    let removed: usize = results.iter().map(|r| r.emojis_removed).sum();
    let failed = results.iter().filter(|r| !r.success).count();

    println!("\n{}", "-".repeat(50));
    println!("Files processed : {}", results.len());
    if options.dry_run {
        println!("Would change    : {}", results.iter().filter(|r| r.emojis_removed > 0).count());
        println!("Would remove    : {removed}");
    } else {
        println!("Files changed   : {changed}");
        println!("Emoji removed   : {removed}");
    }
    println!("Failed          : {failed}");

    Ok(results)
}

fn report_change(path: &Path, result: &ModifyResult, dry_run: bool) {
    if dry_run {
        println!("DRY Modified {} ({} emoji)", path.display(), result.emojis_removed);
    } else {
        println!("Modified {} ({} emoji)", path.display(), result.emojis_removed);
    }
}

/// The main entry point for the `restore` command.
pub fn run_restore(dir: PathBuf, keep_backups: bool) -> Result<()> {
    let stats = restore_backups(&dir, keep_backups, None)?;
    println!(
        "Restored {} file(s) from {} backup(s) in {}",
        stats.restored,
        stats.found,
        dir.display()
    );
    if stats.failed > 0 {
        println!("Failed to restore {} file(s)", stats.failed);
    }
    Ok(())
}

/// The main entry point for the `clean-backups` command.
pub fn run_clean_backups(dir: PathBuf, dry_run: bool) -> Result<()> {
    println!("Searching for backup files in {}...\n", dir.display());
    let stats = clean_backups(&dir, dry_run)?;

    println!("{}", "-".repeat(50));
    println!("Backup files found: {}", stats.found);
    if dry_run {
        println!("Total size: {:.2} MB", stats.total_bytes as f64 / 1_048_576.0);
        println!("\nRun without --dry-run to remove these files");
    } else {
        println!("Backup files removed: {}", stats.removed);
        println!("Space freed: {:.2} MB", stats.total_bytes as f64 / 1_048_576.0);
    }
    Ok(())
}
