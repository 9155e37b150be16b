//! A bounded pool of OS-thread workers.
//!
//! Jobs flow through a shared `crossbeam_channel::bounded` queue of capacity
//! `2 * size` and results come back through a second queue of the same
//! capacity, so a slow consumer eventually blocks the submitter. The pool
//! knows nothing about files or emoji; it runs a caller-supplied closure.
//!
//! Lifecycle: `Created -> Running -> Stopped`. A pool can be started once.
//!
//! ```ignore
//! let mut pool = WorkerPool::new(4, |n: u64| Ok(n * 2));
//! pool.start(CancelToken::new())?;
//! let submitter = pool.submitter()?;
//! pool.close();
//! std::thread::scope(|s| {
//!     s.spawn(move || for i in 0..10 { let _ = submitter.submit(Job::new(i.to_string(), i)); });
//!     for result in pool.results() { /* completion order */ }
//! });
//! pool.wait();
//! ```

use crate::errors::{Error, Result};
use crossbeam_channel::{Receiver, Sender, bounded, select};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

/// Upper bound on the number of workers in one pool.
pub const MAX_WORKERS: usize = 64;

/// A unit of work tagged with a caller-chosen id.
#[derive(Debug, Clone)]
pub struct Job<T> {
    pub id: String,
    pub data: T,
}

impl<T> Job<T> {
    pub fn new(id: impl Into<String>, data: T) -> Self {
        Self { id: id.into(), data }
    }
}

/// The outcome of one job.
#[derive(Debug, Clone)]
pub struct JobResult<R> {
    pub job_id: String,
    pub success: bool,
    pub data: Option<R>,
    pub error: Option<String>,
}

impl<R> JobResult<R> {
    fn ok(job_id: String, data: R) -> Self {
        Self {
            job_id,
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn failed(job_id: String, error: String) -> Self {
        Self {
            job_id,
            success: false,
            data: None,
            error: Some(error),
        }
    }
}

/// A clonable cancellation handle shared by the caller and every worker.
///
/// Cancelling drops the only sender of an internal signal channel, which
/// wakes every `select!` waiting on it.
#[derive(Clone)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    trigger: Arc<Mutex<Option<Sender<()>>>>,
    signal: Receiver<()>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, rx) = bounded(0);
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            trigger: Arc::new(Mutex::new(Some(tx))),
            signal: rx,
        }
    }

    /// Signals cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
        if let Ok(mut guard) = self.trigger.lock() {
            guard.take();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Becomes ready (disconnected) once the token is cancelled.
    fn signal(&self) -> &Receiver<()> {
        &self.signal
    }
}

/// Lifecycle state of a [`WorkerPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    Created,
    Running,
    Stopped,
}

impl PoolState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => PoolState::Created,
            1 => PoolState::Running,
            _ => PoolState::Stopped,
        }
    }
}

#[derive(Default)]
struct Counters {
    active_workers: AtomicUsize,
    processed_jobs: AtomicU64,
    queue_depth: AtomicUsize,
}

/// A point-in-time copy of the pool counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolMetrics {
    pub active_workers: usize,
    pub processed_jobs: u64,
    pub queue_depth: usize,
}

type ProcessFn<T, R> = Arc<dyn Fn(T) -> Result<R> + Send + Sync>;

/// A fixed-size set of worker threads draining a shared job queue.
pub struct WorkerPool<T, R> {
    size: usize,
    state: Arc<AtomicU8>,
    counters: Arc<Counters>,
    process: ProcessFn<T, R>,
    job_tx: Option<Sender<Job<T>>>,
    result_rx: Option<Receiver<JobResult<R>>>,
    cancel: Option<CancelToken>,
    collector: Option<JoinHandle<()>>,
}

/// Resolves a requested worker count: `0` means one per logical CPU, and the
/// result is clamped to `1..=MAX_WORKERS`.
pub fn resolve_worker_count(requested: usize) -> usize {
    let n = if requested == 0 {
        num_cpus::get()
    } else {
        requested
    };
    n.clamp(1, MAX_WORKERS)
}

impl<T, R> WorkerPool<T, R>
where
    T: Send + 'static,
    R: Send + 'static,
{
    /// Creates a pool that will run `process` for every submitted job.
    pub fn new<F>(size: usize, process: F) -> Self
    where
        F: Fn(T) -> Result<R> + Send + Sync + 'static,
    {
        Self {
            size: resolve_worker_count(size),
            state: Arc::new(AtomicU8::new(0)),
            counters: Arc::new(Counters::default()),
            process: Arc::new(process),
            job_tx: None,
            result_rx: None,
            cancel: None,
            collector: None,
        }
    }

    /// Number of worker threads this pool runs.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn state(&self) -> PoolState {
        PoolState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Spawns the workers and the collector.
    ///
    /// Fails with [`Error::AlreadyRunning`] on any call after the first.
    pub fn start(&mut self, cancel: CancelToken) -> Result<()> {
        if self
            .state
            .compare_exchange(0, 1, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(Error::AlreadyRunning);
        }

        let capacity = self.size * 2;
        let (job_tx, job_rx) = bounded::<Job<T>>(capacity);
        let (result_tx, result_rx) = bounded::<JobResult<R>>(capacity);

        let mut handles = Vec::with_capacity(self.size);
        for id in 0..self.size {
            let worker = Worker {
                id,
                jobs: job_rx.clone(),
                results: result_tx.clone(),
                cancel: cancel.clone(),
                counters: Arc::clone(&self.counters),
                process: Arc::clone(&self.process),
            };
            self.counters.active_workers.fetch_add(1, Ordering::SeqCst);
            let spawned = thread::Builder::new()
                .name(format!("demoji-worker-{id}"))
                .spawn(move || worker.run());
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    // Already-spawned workers exit once `job_tx` drops here.
                    self.counters.active_workers.fetch_sub(1, Ordering::SeqCst);
                    self.state.store(2, Ordering::SeqCst);
                    warn!(error = %e, "failed to spawn worker thread");
                    return Err(Error::Io(e));
                }
            }
        }
        drop(result_tx);

        let state = Arc::clone(&self.state);
        let collector_cancel = cancel.clone();
        let collector = thread::Builder::new()
            .name("demoji-collector".to_string())
            .spawn(move || {
                for handle in handles {
                    if collector_cancel.is_cancelled() {
                        break;
                    }
                    let _ = handle.join();
                }
                state.store(2, Ordering::SeqCst);
            });
        match collector {
            Ok(handle) => self.collector = Some(handle),
            Err(e) => {
                self.state.store(2, Ordering::SeqCst);
                return Err(Error::Io(e));
            }
        }

        debug!(workers = self.size, capacity, "worker pool started");
        self.job_tx = Some(job_tx);
        self.result_rx = Some(result_rx);
        self.cancel = Some(cancel);
        Ok(())
    }

    /// Returns a handle that can submit jobs from another thread.
    pub fn submitter(&self) -> Result<Submitter<T>> {
        match (&self.job_tx, &self.cancel) {
            (Some(tx), Some(cancel)) if self.state() == PoolState::Running => Ok(Submitter {
                tx: tx.clone(),
                cancel: cancel.clone(),
                counters: Arc::clone(&self.counters),
            }),
            _ => Err(Error::PoolStopped),
        }
    }

    /// Submits one job, blocking while the queue is full.
    pub fn submit(&self, job: Job<T>) -> Result<()> {
        self.submitter()?.submit(job)
    }

    /// Drops the pool's own job sender. The queue closes once every
    /// [`Submitter`] has been dropped as well.
    pub fn close(&mut self) {
        self.job_tx.take();
    }

    /// Iterates results in completion order until every worker has exited
    /// or the cancel token fires.
    pub fn results(&self) -> Results<'_, R> {
        Results {
            rx: self.result_rx.as_ref(),
            cancel: self.cancel.as_ref().map(|c| c.signal()),
        }
    }

    /// Closes the queue and waits for the collector to finish.
    pub fn wait(&mut self) {
        self.close();
        if let Some(handle) = self.collector.take() {
            let _ = handle.join();
        }
    }

    pub fn metrics(&self) -> PoolMetrics {
        PoolMetrics {
            active_workers: self.counters.active_workers.load(Ordering::SeqCst),
            processed_jobs: self.counters.processed_jobs.load(Ordering::SeqCst),
            queue_depth: self.counters.queue_depth.load(Ordering::SeqCst),
        }
    }
}

/// A clonable job-submission handle.
pub struct Submitter<T> {
    tx: Sender<Job<T>>,
    cancel: CancelToken,
    counters: Arc<Counters>,
}

impl<T> Clone for Submitter<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            cancel: self.cancel.clone(),
            counters: Arc::clone(&self.counters),
        }
    }
}

impl<T> Submitter<T> {
    /// Blocks while the queue is full. Fails once the pool is cancelled or
    /// every worker is gone.
    pub fn submit(&self, job: Job<T>) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::PoolStopped);
        }
        self.counters.queue_depth.fetch_add(1, Ordering::SeqCst);
        let sent = select! {
            send(self.tx, job) -> res => res.is_ok(),
            recv(self.cancel.signal()) -> _ => false,
        };
        if sent {
            Ok(())
        } else {
            self.counters.queue_depth.fetch_sub(1, Ordering::SeqCst);
            Err(Error::PoolStopped)
        }
    }
}

/// Iterator over job results, see [`WorkerPool::results`].
pub struct Results<'a, R> {
    rx: Option<&'a Receiver<JobResult<R>>>,
    cancel: Option<&'a Receiver<()>>,
}

impl<R> Iterator for Results<'_, R> {
    type Item = JobResult<R>;

    fn next(&mut self) -> Option<Self::Item> {
        let rx = self.rx?;
        match self.cancel {
            Some(cancel) => select! {
                recv(rx) -> msg => msg.ok(),
                recv(cancel) -> _ => None,
            },
            None => rx.recv().ok(),
        }
    }
}

struct Worker<T, R> {
    id: usize,
    jobs: Receiver<Job<T>>,
    results: Sender<JobResult<R>>,
    cancel: CancelToken,
    counters: Arc<Counters>,
    process: ProcessFn<T, R>,
}

impl<T, R> Worker<T, R> {
    fn run(self) {
        loop {
            if self.cancel.is_cancelled() {
                break;
            }
            let job = select! {
                recv(self.jobs) -> msg => match msg {
                    Ok(job) => job,
                    Err(_) => break,
                },
                recv(self.cancel.signal()) -> _ => break,
            };
            self.counters.queue_depth.fetch_sub(1, Ordering::SeqCst);

            let result = self.execute(job);
            self.counters.processed_jobs.fetch_add(1, Ordering::SeqCst);

            let delivered = select! {
                send(self.results, result) -> res => res.is_ok(),
                recv(self.cancel.signal()) -> _ => false,
            };
            if !delivered {
                break;
            }
        }
        if self.cancel.is_cancelled() {
            self.discard_queued();
        }
        self.counters.active_workers.fetch_sub(1, Ordering::SeqCst);
        debug!(worker = self.id, "worker exited");
    }

    /// Drops jobs that will never run so `queue_depth` settles at zero.
    fn discard_queued(&self) {
        let mut discarded = 0;
        while self.jobs.try_recv().is_ok() {
            self.counters.queue_depth.fetch_sub(1, Ordering::SeqCst);
            discarded += 1;
        }
        if discarded > 0 {
            debug!(worker = self.id, discarded, "discarded queued jobs after cancel");
        }
    }

    fn execute(&self, job: Job<T>) -> JobResult<R> {
        let Job { id, data } = job;
        let process = self.process.as_ref();
        match panic::catch_unwind(AssertUnwindSafe(|| process(data))) {
            Ok(Ok(value)) => JobResult::ok(id, value),
            Ok(Err(e)) => JobResult::failed(id, e.to_string()),
            Err(payload) => {
                let msg = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "job panicked".to_string());
                warn!(job = %id, "job panicked: {msg}");
                JobResult::failed(id, format!("job panicked: {msg}"))
            }
        }
    }
}
