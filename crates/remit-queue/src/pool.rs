//! Worker pool manager: owns worker lifecycles and aggregates statistics

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::backend::JobQueue;
use crate::processor::JobProcessor;
use crate::worker::{Worker, WorkerConfig, WorkerStats, WorkerStatsSnapshot};

#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub worker: WorkerConfig,
    /// Periodic aggregate stats logging; `None` disables the reporter
    pub stats_interval: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            worker: WorkerConfig::default(),
            stats_interval: Some(Duration::from_secs(30)),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("worker pool has not been started")]
    NotStarted,
}

/// Aggregate view across all current workers
#[derive(Debug, Clone, Serialize)]
pub struct PoolStats {
    pub workers: Vec<WorkerStatsSnapshot>,
    pub total_processed: u64,
    pub total_failed: u64,
    pub active_workers: usize,
}

struct WorkerHandle {
    id: u64,
    stats: Arc<WorkerStats>,
    stop: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

/// Owns the set of workers. Explicitly constructed; no global registry.
pub struct WorkerPool {
    queue: Arc<dyn JobQueue>,
    processor: Arc<JobProcessor>,
    config: PoolConfig,
    started: Arc<AtomicBool>,
    next_id: AtomicU64,
    workers: Arc<Mutex<Vec<WorkerHandle>>>,
    reporter: Mutex<Option<JoinHandle<()>>>,
}

impl WorkerPool {
    pub fn new(queue: Arc<dyn JobQueue>, processor: Arc<JobProcessor>, config: PoolConfig) -> Self {
        Self {
            queue,
            processor,
            config,
            started: Arc::new(AtomicBool::new(false)),
            next_id: AtomicU64::new(1),
            workers: Arc::new(Mutex::new(Vec::new())),
            reporter: Mutex::new(None),
        }
    }

    /// Start `count` workers. A second start on a running pool is a no-op.
    pub async fn start(&self, count: usize) {
        if self
            .started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("worker pool already started, ignoring start request");
            return;
        }

        {
            let mut workers = self.workers.lock().await;
            workers.clear();
            for _ in 0..count {
                self.spawn_worker(&mut workers);
            }
            info!(count = workers.len(), "worker pool started");
        }

        if let Some(interval) = self.config.stats_interval {
            let mut reporter = self.reporter.lock().await;
            *reporter = Some(self.spawn_reporter(interval));
        }
    }

    /// Add `n` workers to a running pool
    pub async fn scale_up(&self, n: usize) -> Result<(), PoolError> {
        if !self.started.load(Ordering::SeqCst) {
            return Err(PoolError::NotStarted);
        }
        let mut workers = self.workers.lock().await;
        for _ in 0..n {
            self.spawn_worker(&mut workers);
        }
        info!(added = n, total = workers.len(), "scaled worker pool up");
        Ok(())
    }

    /// Signal every worker to stop and wait up to `timeout` for the
    /// loops to exit; workers still running after the deadline are
    /// force-aborted with a warning rather than blocking forever.
    pub async fn stop(&self, timeout: Duration) {
        if self
            .started
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        if let Some(reporter) = self.reporter.lock().await.take() {
            reporter.abort();
        }

        let mut workers = self.workers.lock().await;
        for handle in workers.iter() {
            handle.stop.store(true, Ordering::SeqCst);
        }

        let deadline = tokio::time::Instant::now() + timeout;
        for handle in workers.iter_mut() {
            let Some(mut join) = handle.join.take() else {
                continue;
            };
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            match tokio::time::timeout(remaining, &mut join).await {
                Ok(_) => {}
                Err(_) => {
                    warn!(worker_id = handle.id, "worker did not stop in time, force aborting");
                    join.abort();
                }
            }
        }
        info!("worker pool stopped");
    }

    /// Aggregate statistics; safe to call while workers are running
    pub async fn stats(&self) -> PoolStats {
        let workers = self.workers.lock().await;
        let snapshots: Vec<WorkerStatsSnapshot> = workers
            .iter()
            .map(|handle| handle.stats.snapshot(handle.id))
            .collect();

        let total_processed = snapshots.iter().map(|s| s.processed).sum();
        let total_failed = snapshots.iter().map(|s| s.failed).sum();
        let active_workers = snapshots.iter().filter(|s| s.running).count();

        PoolStats {
            workers: snapshots,
            total_processed,
            total_failed,
            active_workers,
        }
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub async fn worker_count(&self) -> usize {
        self.workers.lock().await.len()
    }

    fn spawn_worker(&self, workers: &mut Vec<WorkerHandle>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let worker = Worker::new(
            id,
            self.queue.clone(),
            self.processor.clone(),
            self.config.worker,
        );
        let stop = worker.stop_flag();
        let stats = worker.stats_handle();
        let join = tokio::spawn(worker.run());
        workers.push(WorkerHandle {
            id,
            stats,
            stop,
            join: Some(join),
        });
    }

    fn spawn_reporter(&self, interval: Duration) -> JoinHandle<()> {
        let started = self.started.clone();
        let workers = self.workers.clone();
        let queue = self.queue.clone();

        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                if !started.load(Ordering::SeqCst) {
                    break;
                }

                let workers = workers.lock().await;
                let mut processed = 0u64;
                let mut failed = 0u64;
                let mut active = 0usize;
                for handle in workers.iter() {
                    let snapshot = handle.stats.snapshot(handle.id);
                    processed += snapshot.processed;
                    failed += snapshot.failed;
                    if snapshot.running {
                        active += 1;
                    }
                }
                drop(workers);

                let queue_size = queue.size().await;
                info!(active, processed, failed, queue_size, "worker pool stats");
            }
        })
    }
}
