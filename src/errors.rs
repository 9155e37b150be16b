use std::path::PathBuf;
use thiserror::Error;

/// The primary error type for all operations in `demoji`.
///
/// Detection itself never fails. Everything here is either a per-file
/// problem (captured into that file's result by the pipeline) or a
/// setup/lifecycle problem that is returned to the caller directly.
#[derive(Error, Debug)]
pub enum Error {
    /// An error related to file system I/O.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The input file does not exist.
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The input file exceeds the configured size limit.
    #[error("File too large: {} ({size} bytes, limit {limit})", path.display())]
    FileTooLarge { path: PathBuf, size: u64, limit: u64 },

    /// Writing the backup copy failed. The original is untouched.
    #[error("Backup failed for {}: {source}", path.display())]
    Backup {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The temp-file-then-rename write failed. The original is untouched.
    #[error("Atomic write failed for {}: {source}", path.display())]
    AtomicWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    /// `WorkerPool::start` was called on a pool that already ran.
    #[error("Worker pool is already running")]
    AlreadyRunning,

    /// A job was submitted to a pool that is not accepting work.
    #[error("Worker pool is not accepting jobs")]
    PoolStopped,

    /// A general configuration-related error.
    #[error("Config error: {0}")]
    Config(String),

    /// An error that occurred while parsing a YAML configuration file.
    #[error("Config parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// An error related to JSON serialization.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An error related to CSV serialization.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// An error from the `ignore` crate, which is used for directory traversal.
    #[error("Walk error: {0}")]
    Walk(#[from] ignore::Error),

    /// An error that occurred while building the Rayon thread pool.
    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// A convenient type alias for `Result<T, demoji::errors::Error>`.
pub type Result<T> = std::result::Result<T, Error>;

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Config(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Config(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_path() {
        let err = Error::FileTooLarge {
            path: PathBuf::from("big.txt"),
            size: 20,
            limit: 10,
        };
        let msg = err.to_string();
        assert!(msg.contains("big.txt"));
        assert!(msg.contains("limit 10"));
    }

    #[test]
    fn test_backup_error_names_backup_path() {
        let err = Error::Backup {
            path: PathBuf::from("notes.backup.20240601120000.txt"),
            source: std::io::Error::from(std::io::ErrorKind::AlreadyExists),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("Backup failed for notes.backup.20240601120000.txt"));
    }

    #[test]
    fn test_string_converts_to_config_error() {
        let err: Error = "bad value".into();
        assert!(matches!(err, Error::Config(ref s) if s == "bad value"));
    }
}
