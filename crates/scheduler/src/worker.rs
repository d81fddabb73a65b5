//! Raster worker pool.
//!
//! A fixed set of threads pulls boxed jobs from a shared channel. Jobs are
//! responsible for checking their own cancellation token; the pool only
//! guarantees that every submitted job is either executed or dropped on
//! shutdown. A job that panics is dropped mid-run and its worker moves on to
//! the next job.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    mpsc::{self, Receiver, RecvTimeoutError, Sender},
    Arc, Mutex,
};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// A unit of work executed on a pool thread.
pub type PoolJob = Box<dyn FnOnce() + Send + 'static>;

/// Returned by [`WorkerPool::submit`] once the pool has been shut down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolClosed;

impl std::fmt::Display for PoolClosed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "worker pool is shut down")
    }
}

impl std::error::Error for PoolClosed {}

/// Configuration for the raster worker pool.
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    /// Number of worker threads to spawn.
    /// Default: number of logical CPU cores.
    pub num_workers: usize,

    /// How long an idle worker waits before re-checking for shutdown.
    /// Default: 100ms.
    pub poll_interval: Duration,

    /// Prefix for worker thread names.
    pub thread_name: String,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self::new(num_cpus())
    }
}

impl WorkerPoolConfig {
    /// Create a configuration with a fixed number of workers.
    pub fn new(num_workers: usize) -> Self {
        Self {
            num_workers: num_workers.max(1),
            poll_interval: Duration::from_millis(100),
            thread_name: "raster-worker".to_string(),
        }
    }

    /// Set the idle poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the worker thread name prefix.
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }
}

/// Fixed-size pool of raster threads.
pub struct WorkerPool {
    sender: Option<Sender<PoolJob>>,
    workers: Vec<Worker>,
    shutdown: Arc<AtomicBool>,
    executed: Arc<AtomicU64>,
}

impl WorkerPool {
    /// Spawn the worker threads.
    pub fn new(config: WorkerPoolConfig) -> std::io::Result<Self> {
        let (sender, receiver) = mpsc::channel::<PoolJob>();
        let receiver = Arc::new(Mutex::new(receiver));
        let shutdown = Arc::new(AtomicBool::new(false));
        let executed = Arc::new(AtomicU64::new(0));

        let mut workers = Vec::with_capacity(config.num_workers);
        for id in 0..config.num_workers.max(1) {
            workers.push(Worker::spawn(
                format!("{}-{}", config.thread_name, id),
                receiver.clone(),
                shutdown.clone(),
                executed.clone(),
                config.poll_interval,
            )?);
        }

        log::debug!("started worker pool with {} threads", workers.len());

        Ok(Self { sender: Some(sender), workers, shutdown, executed })
    }

    /// Queue a job for execution.
    pub fn submit(&self, job: PoolJob) -> Result<(), PoolClosed> {
        if self.shutdown.load(Ordering::Acquire) {
            return Err(PoolClosed);
        }

        match &self.sender {
            Some(sender) => sender.send(job).map_err(|_| PoolClosed),
            None => Err(PoolClosed),
        }
    }

    /// Number of worker threads.
    pub fn num_workers(&self) -> usize {
        self.workers.len()
    }

    /// Number of jobs that have run to completion.
    pub fn executed(&self) -> u64 {
        self.executed.load(Ordering::Acquire)
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Stop accepting jobs and wait for the workers to exit.
    ///
    /// Jobs still queued when the channel closes are dropped unexecuted.
    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        self.sender.take();

        for worker in self.workers.drain(..) {
            worker.join();
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

struct Worker {
    name: String,
    thread: Option<JoinHandle<()>>,
}

impl Worker {
    fn spawn(
        name: String,
        receiver: Arc<Mutex<Receiver<PoolJob>>>,
        shutdown: Arc<AtomicBool>,
        executed: Arc<AtomicU64>,
        poll_interval: Duration,
    ) -> std::io::Result<Self> {
        let thread = thread::Builder::new()
            .name(name.clone())
            .spawn(move || Self::run(receiver, shutdown, executed, poll_interval))?;

        Ok(Self { name, thread: Some(thread) })
    }

    fn run(
        receiver: Arc<Mutex<Receiver<PoolJob>>>,
        shutdown: Arc<AtomicBool>,
        executed: Arc<AtomicU64>,
        poll_interval: Duration,
    ) {
        loop {
            if shutdown.load(Ordering::Acquire) {
                break;
            }

            let next = {
                let guard = match receiver.lock() {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
                guard.recv_timeout(poll_interval)
            };

            match next {
                Ok(job) => match panic::catch_unwind(AssertUnwindSafe(job)) {
                    Ok(()) => {
                        executed.fetch_add(1, Ordering::AcqRel);
                    }
                    Err(_) => {
                        let name = thread::current().name().unwrap_or("worker").to_owned();
                        log::warn!("job panicked on {name}; worker keeps running");
                    }
                },
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
    }

    fn join(mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::warn!("worker thread {} panicked", self.name);
            }
        }
    }
}

fn num_cpus() -> usize {
    thread::available_parallelism().map(|n| n.get()).unwrap_or(4)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CancellationToken;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn config_defaults() {
        let config = WorkerPoolConfig::default();
        assert!(config.num_workers > 0);
        assert_eq!(config.poll_interval, Duration::from_millis(100));
        assert_eq!(config.thread_name, "raster-worker");
    }

    #[test]
    fn config_never_allows_zero_workers() {
        assert_eq!(WorkerPoolConfig::new(0).num_workers, 1);
    }

    #[test]
    fn executes_submitted_jobs() {
        let pool = WorkerPool::new(WorkerPoolConfig::new(2)).unwrap();
        let (tx, rx) = mpsc::channel();

        for i in 0..5 {
            let tx = tx.clone();
            pool.submit(Box::new(move || {
                tx.send(i).unwrap();
            }))
            .unwrap();
        }

        let mut seen: Vec<i32> = (0..5).map(|_| rx.recv().unwrap()).collect();
        seen.sort();
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);

        pool.shutdown();
    }

    #[test]
    fn jobs_observe_cancellation() {
        let pool = WorkerPool::new(WorkerPoolConfig::new(1)).unwrap();
        let ran = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = mpsc::channel();

        let token = CancellationToken::new();
        token.cancel();

        let worker_token = token.clone();
        let worker_ran = ran.clone();
        pool.submit(Box::new(move || {
            if !worker_token.is_cancelled() {
                worker_ran.fetch_add(1, Ordering::SeqCst);
            }
            tx.send(()).unwrap();
        }))
        .unwrap();

        rx.recv().unwrap();
        assert_eq!(ran.load(Ordering::SeqCst), 0);

        pool.shutdown();
    }

    #[test]
    fn counts_executed_jobs() {
        let pool = WorkerPool::new(WorkerPoolConfig::new(1)).unwrap();
        let (tx, rx) = mpsc::channel();

        pool.submit(Box::new(move || tx.send(()).unwrap())).unwrap();
        rx.recv().unwrap();

        // The counter is bumped right after the job returns.
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while pool.executed() < 1 && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(pool.executed(), 1);
    }

    #[test]
    fn panicking_job_does_not_kill_worker() {
        let pool = WorkerPool::new(WorkerPoolConfig::new(1)).unwrap();
        let (tx, rx) = mpsc::channel();

        pool.submit(Box::new(|| panic!("raster blew up"))).unwrap();
        pool.submit(Box::new(move || tx.send(()).unwrap())).unwrap();

        assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());
        assert_eq!(pool.num_workers(), 1);
        pool.shutdown();
    }

    #[test]
    fn shutdown_joins_workers() {
        let pool = WorkerPool::new(
            WorkerPoolConfig::new(2).with_poll_interval(Duration::from_millis(10)),
        )
        .unwrap();
        assert_eq!(pool.num_workers(), 2);
        assert!(!pool.is_shutting_down());

        pool.shutdown();
    }
}
