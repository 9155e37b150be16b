//! The main entry point for the `demoji` command-line application.
//!
//! Parses arguments, installs logging and dispatches to the handlers in
//! `demoji::commands`.

use anyhow::Context;
use demoji::cli::{self, Commands};
use demoji::commands::{self, CleanOptions, InputOptions, ScanOptions};
use std::process;
use tracing::Level;

fn init_logging(verbose: bool) {
    tracing_subscriber::fmt()
        .with_max_level(if verbose { Level::DEBUG } else { Level::WARN })
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let args = cli::parse_args();

    match args.command {
        Commands::Scan {
            config,
            extensions,
            exclude,
            workers,
            format,
            output,
            include_summary,
            fail_on_found,
            verbose,
            inputs,
        } => {
            init_logging(verbose);
            let found = commands::run_scan(ScanOptions {
                input: InputOptions {
                    config,
                    extensions,
                    exclude,
                    workers,
                    inputs,
                },
                format: format.into(),
                output,
                include_summary,
            })
            .context("scan failed")?;

            if found && fail_on_found {
                process::exit(1);
            }
        }
        Commands::Clean {
            config,
            extensions,
            exclude,
            workers,
            replacement,
            no_backup,
            dry_run,
            no_allowlist,
            allow,
            verbose,
            inputs,
        } => {
            init_logging(verbose);
            let results = commands::run_clean(CleanOptions {
                input: InputOptions {
                    config,
                    extensions,
                    exclude,
                    workers,
                    inputs,
                },
                replacement,
                no_backup,
                dry_run,
                no_allowlist,
                allow,
                verbose,
            })
            .context("clean failed")?;

            if results.iter().any(|r| !r.success) {
                process::exit(2);
            }
        }
        Commands::Restore { dir, keep_backups } => {
            init_logging(false);
            commands::run_restore(dir, keep_backups).context("restore failed")?;
        }
        Commands::CleanBackups { dir, dry_run } => {
            init_logging(false);
            commands::run_clean_backups(dir, dry_run).context("clean-backups failed")?;
        }
    }

    Ok(())
}
