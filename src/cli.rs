use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Finds and strips emoji from source trees.
///
/// `demoji` scans text files for emoji, emoticons and custom markers, and can
/// remove them in place with automatic backups.
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Find and remove emoji from text files",
    long_about = "demoji - scan for and remove emoji, emoticons and custom markers.

QUICK EXAMPLES:
  demoji scan .                          # Report every emoji under the current dir
  demoji scan -f json src/ > report.json # Machine-readable report
  demoji clean --dry-run .               # Preview what would be removed
  demoji clean -a '✅,❌' docs/           # Remove all but the allowed emoji
  demoji restore -d .                    # Undo a clean from its backups

For detailed help on any command, use: demoji <command> --help"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,
}

/// Report formats for `scan`.
#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    Text,
    Json,
    Csv,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Report emoji found in files
    ///
    /// EXAMPLES:
    ///   demoji scan .                        # Scan the current dir
    ///   demoji scan -x md,txt docs/          # Only Markdown and text files
    ///   demoji scan --fail-on-found src/     # Non-zero exit if anything is found
    Scan {
        /// Path to a YAML configuration file. Defaults to `.demoji.yaml` if present.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// A comma-separated list of file extensions to include.
        #[arg(short = 'x', long = "ext", value_delimiter = ',')]
        extensions: Vec<String>,

        /// A comma-separated list of path components to exclude.
        #[arg(short = 'e', long = "exclude", value_delimiter = ',')]
        exclude: Vec<String>,

        /// The number of worker threads, `0` for one per logical CPU.
        #[arg(short = 'w', long = "workers", env = "DEMOJI_WORKERS")]
        workers: Option<usize>,

        /// The report format.
        #[arg(short = 'f', long = "format", value_enum, default_value = "text")]
        format: Format,

        /// Path to the output file. If omitted, the report goes to standard output.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Append a summary of totals to the report.
        #[arg(long = "summary")]
        include_summary: bool,

        /// Exit with status 1 if any emoji is found.
        #[arg(long)]
        fail_on_found: bool,

        /// Log each file as it is processed.
        #[arg(short, long)]
        verbose: bool,

        /// The input files or directories to scan.
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },

    /// Remove emoji from files (with automatic backups)
    ///
    /// EXAMPLES:
    ///   demoji clean .                       # Remove emoji, keeping backups
    ///   demoji clean -r '[x]' --no-backup .  # Replace instead of delete, no backups
    ///   demoji clean --dry-run .             # Count without touching files
    Clean {
        /// Path to a YAML configuration file. Defaults to `.demoji.yaml` if present.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// A comma-separated list of file extensions to include.
        #[arg(short = 'x', long = "ext", value_delimiter = ',')]
        extensions: Vec<String>,

        /// A comma-separated list of path components to exclude.
        #[arg(short = 'e', long = "exclude", value_delimiter = ',')]
        exclude: Vec<String>,

        /// The number of worker threads, `0` for one per logical CPU.
        #[arg(short = 'w', long = "workers", env = "DEMOJI_WORKERS")]
        workers: Option<usize>,

        /// Text written in place of each removed emoji.
        #[arg(short, long)]
        replacement: Option<String>,

        /// Do not write backup files.
        #[arg(long)]
        no_backup: bool,

        /// Count what would be removed without modifying any files.
        #[arg(long)]
        dry_run: bool,

        /// Remove allowlisted emoji too.
        #[arg(long)]
        no_allowlist: bool,

        /// A comma-separated list of emoji to keep, added to the configured allowlist.
        #[arg(short = 'a', long = "allow", value_delimiter = ',')]
        allow: Vec<String>,

        /// Print each modified file.
        #[arg(short, long)]
        verbose: bool,

        /// The input files or directories to clean.
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },

    /// Restore files from their newest backups
    ///
    /// EXAMPLES:
    ///   demoji restore -d .                  # Restore and delete backups
    ///   demoji restore -d src/ --keep-backups
    Restore {
        /// The directory where `clean` was run.
        #[arg(short, long, required = true)]
        dir: PathBuf,

        /// Keep the backup files after restoring.
        #[arg(long)]
        keep_backups: bool,
    },

    /// Remove backup files without restoring
    ///
    /// EXAMPLES:
    ///   demoji clean-backups -d . --dry-run  # Preview what would be deleted
    ///   demoji clean-backups -d .
    CleanBackups {
        /// The directory to clear of backup files.
        #[arg(short, long, required = true)]
        dir: PathBuf,

        /// Report which backups would be removed without deleting them.
        #[arg(long)]
        dry_run: bool,
    },
}

/// Parses command-line arguments and returns the populated `Args` struct.
pub fn parse_args() -> Args {
    Args::parse()
}
