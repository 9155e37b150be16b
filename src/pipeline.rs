//! Fans a list of files out to a [`WorkerPool`] and collects one result per
//! file.
//!
//! Small batches (fewer files than workers) and batches whose pool cannot be
//! started run sequentially on the calling thread instead. Results come back
//! in completion order, not input order.

use crate::modifier::{FileModifier, ModifyResult};
use crate::scanner::{ProcessResult, Scanner};
use crate::worker_pool::{CancelToken, Job, WorkerPool, resolve_worker_count};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing::{info, warn};

/// A per-file outcome that can also describe a failure the pipeline itself
/// observed, such as a worker job that panicked.
pub trait FileOutcome: Send + 'static {
    fn from_failure(path: &Path, error: String) -> Self;
    fn succeeded(&self) -> bool;
}

impl FileOutcome for ProcessResult {
    fn from_failure(path: &Path, error: String) -> Self {
        ProcessResult {
            file_path: path.to_path_buf(),
            success: false,
            detection: None,
            skipped_reason: None,
            error: Some(error),
        }
    }

    fn succeeded(&self) -> bool {
        self.success
    }
}

impl FileOutcome for ModifyResult {
    fn from_failure(path: &Path, error: String) -> Self {
        ModifyResult {
            file_path: path.to_path_buf(),
            success: false,
            modified: false,
            emojis_removed: 0,
            backup_path: None,
            skipped_reason: None,
            error: Some(error),
        }
    }

    fn succeeded(&self) -> bool {
        self.success
    }
}

/// Runs scans and cleans over many files.
pub struct Pipeline {
    workers: usize,
    cancel: CancelToken,
}

impl Pipeline {
    /// Creates a pipeline. `workers == 0` means one per logical CPU.
    pub fn new(workers: usize) -> Self {
        Self {
            workers: resolve_worker_count(workers),
            cancel: CancelToken::new(),
        }
    }

    /// Uses `cancel` for every pool this pipeline starts.
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn worker_count(&self) -> usize {
        self.workers
    }

    /// Scans every path.
    pub fn scan_files(&self, scanner: Arc<Scanner>, paths: &[PathBuf]) -> Vec<ProcessResult> {
        self.scan_files_with(scanner, paths, |_| {})
    }

    /// Scans every path, calling `observe` as each result arrives.
    pub fn scan_files_with(
        &self,
        scanner: Arc<Scanner>,
        paths: &[PathBuf],
        observe: impl FnMut(&ProcessResult),
    ) -> Vec<ProcessResult> {
        self.run("scan", paths, move |path: &Path| scanner.scan_file(path), observe)
    }

    /// Cleans every path.
    pub fn clean_files(&self, modifier: Arc<FileModifier>, paths: &[PathBuf]) -> Vec<ModifyResult> {
        self.clean_files_with(modifier, paths, |_| {})
    }

    /// Cleans every path, calling `observe` as each result arrives.
    pub fn clean_files_with(
        &self,
        modifier: Arc<FileModifier>,
        paths: &[PathBuf],
        observe: impl FnMut(&ModifyResult),
    ) -> Vec<ModifyResult> {
        self.run("clean", paths, move |path: &Path| modifier.modify_file(path), observe)
    }

    fn run<R, F>(&self, op: &str, paths: &[PathBuf], process: F, mut observe: impl FnMut(&R)) -> Vec<R>
    where
        R: FileOutcome,
        F: Fn(&Path) -> R + Send + Sync + 'static,
    {
        let started = Instant::now();
        let process = Arc::new(process);

        let results = if paths.len() < self.workers {
            run_sequential(paths, process.as_ref(), &mut observe)
        } else {
            match self.run_pooled(paths, Arc::clone(&process), &mut observe) {
                Some(results) => results,
                None => run_sequential(paths, process.as_ref(), &mut observe),
            }
        };

        let failed = results.iter().filter(|r| !r.succeeded()).count();
        info!(
            op,
            files = paths.len(),
            results = results.len(),
            failed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "batch finished"
        );
        results
    }

    /// Returns `None` if the pool could not be started; nothing has been
    /// processed in that case.
    fn run_pooled<R, F>(&self, paths: &[PathBuf], process: Arc<F>, observe: &mut impl FnMut(&R)) -> Option<Vec<R>>
    where
        R: FileOutcome,
        F: Fn(&Path) -> R + Send + Sync + 'static,
    {
        let mut pool = WorkerPool::new(self.workers, move |path: PathBuf| Ok((*process)(&path)));
        if let Err(e) = pool.start(self.cancel.clone()) {
            warn!(error = %e, "worker pool failed to start, running sequentially");
            return None;
        }
        let submitter = match pool.submitter() {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "worker pool rejected submissions, running sequentially");
                pool.wait();
                return None;
            }
        };
        pool.close();

        let mut results = Vec::with_capacity(paths.len());
        thread::scope(|s| {
            s.spawn(move || {
                for (idx, path) in paths.iter().enumerate() {
                    if submitter.submit(Job::new(idx.to_string(), path.clone())).is_err() {
                        break;
                    }
                }
            });

            for job in pool.results() {
                let outcome = match job.data {
                    Some(outcome) => outcome,
                    None => {
                        let path = job
                            .job_id
                            .parse::<usize>()
                            .ok()
                            .and_then(|i| paths.get(i))
                            .map(PathBuf::as_path)
                            .unwrap_or_else(|| Path::new(""));
                        R::from_failure(path, job.error.unwrap_or_else(|| "job failed".to_string()))
                    }
                };
                observe(&outcome);
                results.push(outcome);
            }
        });
        pool.wait();

        Some(results)
    }
}

fn run_sequential<R, F>(paths: &[PathBuf], process: &F, observe: &mut impl FnMut(&R)) -> Vec<R>
where
    F: Fn(&Path) -> R,
{
    paths
        .iter()
        .map(|path| {
            let outcome = process(path);
            observe(&outcome);
            outcome
        })
        .collect()
}
