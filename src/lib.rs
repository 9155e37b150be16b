//! `demoji` is a library for finding and removing emoji in text files.
//!
//! It provides the core logic for the `demoji` command-line tool but can also
//! be used on its own. The main components are:
//!
//! - `detector`: locates Unicode emoji, emoticons and custom markers in a
//!   byte buffer, with line/column positions.
//! - `allowlist`: normalized sets of emoji that are never reported or removed.
//! - `scanner` and `modifier`: per-file scanning and in-place cleaning with
//!   backups and atomic writes.
//! - `worker_pool` and `pipeline`: a bounded, cancellable thread pool and the
//!   batch runner built on it.
//! - `backup`: naming, restoring and cleaning up backup files.
//! - `config`: loading settings from YAML files.
//!
//! Detection never fails; everything that can go wrong for a single file is
//! reported in that file's result.

pub mod allowlist;
pub mod backup;
pub mod cli;
pub mod commands;
pub mod config;
pub mod detector;
pub mod discovery;
pub mod errors;
pub mod modifier;
pub mod output_formatter;
pub mod patterns;
pub mod pipeline;
pub mod scanner;
pub mod worker_pool;

// Re-export main types for easier access by library users.
pub use allowlist::Allowlist;
pub use detector::{DetectionResult, EmojiCategory, EmojiMatch, detect, remove_emojis};
pub use errors::{Error, Result};
pub use modifier::{FileModifier, ModifyConfig, ModifyResult};
pub use output_formatter::{OutputFormat, OutputFormatter};
pub use patterns::PatternSet;
pub use pipeline::Pipeline;
pub use scanner::{ProcessResult, Scanner};
pub use worker_pool::{CancelToken, WorkerPool};
