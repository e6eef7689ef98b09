//! Worker: dequeue -> process -> update statistics loop

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::backend::JobQueue;
use crate::job::JobOutcome;
use crate::processor::JobProcessor;

/// Per-worker tuning knobs
#[derive(Debug, Clone, Copy)]
pub struct WorkerConfig {
    /// Sleep between polls when the queue is empty or a job is deferred
    pub poll_interval: Duration,
    /// Sleep after a transient backing-store error
    pub error_backoff: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            error_backoff: Duration::from_secs(2),
        }
    }
}

/// Counters owned exclusively by one worker; the pool only ever reads
/// them through an atomic snapshot.
#[derive(Debug)]
pub(crate) struct WorkerStats {
    running: AtomicBool,
    processed: AtomicU64,
    failed: AtomicU64,
    empty_polls: AtomicU64,
    total_time_ms: AtomicU64,
    min_time_ms: AtomicU64,
    max_time_ms: AtomicU64,
}

impl WorkerStats {
    fn new() -> Self {
        Self {
            running: AtomicBool::new(false),
            processed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            empty_polls: AtomicU64::new(0),
            total_time_ms: AtomicU64::new(0),
            min_time_ms: AtomicU64::new(u64::MAX),
            max_time_ms: AtomicU64::new(0),
        }
    }

    fn record_timing(&self, elapsed_ms: u64) {
        self.total_time_ms.fetch_add(elapsed_ms, Ordering::Relaxed);
        self.min_time_ms.fetch_min(elapsed_ms, Ordering::Relaxed);
        self.max_time_ms.fetch_max(elapsed_ms, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, worker_id: u64) -> WorkerStatsSnapshot {
        let processed = self.processed.load(Ordering::Relaxed);
        let failed = self.failed.load(Ordering::Relaxed);
        let total_jobs = processed + failed;
        let total_time = self.total_time_ms.load(Ordering::Relaxed);
        let min = self.min_time_ms.load(Ordering::Relaxed);

        WorkerStatsSnapshot {
            worker_id,
            running: self.running.load(Ordering::Relaxed),
            processed,
            failed,
            empty_polls: self.empty_polls.load(Ordering::Relaxed),
            avg_time_ms: if total_jobs > 0 { total_time / total_jobs } else { 0 },
            min_time_ms: if min == u64::MAX { 0 } else { min },
            max_time_ms: self.max_time_ms.load(Ordering::Relaxed),
        }
    }
}

/// Read-only view of one worker's counters
#[derive(Debug, Clone, Serialize)]
pub struct WorkerStatsSnapshot {
    pub worker_id: u64,
    pub running: bool,
    pub processed: u64,
    pub failed: u64,
    pub empty_polls: u64,
    pub avg_time_ms: u64,
    pub min_time_ms: u64,
    pub max_time_ms: u64,
}

/// One polling worker.
///
/// The loop is cooperative: the stop flag is checked at loop top, so an
/// in-flight job is always finished, never abandoned.
pub struct Worker {
    id: u64,
    queue: Arc<dyn JobQueue>,
    processor: Arc<JobProcessor>,
    config: WorkerConfig,
    stop: Arc<AtomicBool>,
    stats: Arc<WorkerStats>,
}

impl Worker {
    pub fn new(
        id: u64,
        queue: Arc<dyn JobQueue>,
        processor: Arc<JobProcessor>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            id,
            queue,
            processor,
            config,
            stop: Arc::new(AtomicBool::new(false)),
            stats: Arc::new(WorkerStats::new()),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn stats(&self) -> WorkerStatsSnapshot {
        self.stats.snapshot(self.id)
    }

    pub(crate) fn stop_flag(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    pub(crate) fn stats_handle(&self) -> Arc<WorkerStats> {
        self.stats.clone()
    }

    /// Request a cooperative stop; the current job still completes
    pub fn shutdown(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub async fn run(self) {
        self.stats.running.store(true, Ordering::SeqCst);
        info!(
            worker_id = self.id,
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            "worker started"
        );

        while !self.stop.load(Ordering::SeqCst) {
            match self.queue.dequeue().await {
                Ok(Some(job)) => {
                    if !job.is_due() {
                        self.defer(job).await;
                        continue;
                    }
                    self.process_job(job).await;
                }
                Ok(None) => {
                    self.stats.empty_polls.fetch_add(1, Ordering::Relaxed);
                    tokio::time::sleep(self.config.poll_interval).await;
                }
                Err(e) => {
                    warn!(worker_id = self.id, error = %e, "queue poll failed, backing off");
                    tokio::time::sleep(self.config.error_backoff).await;
                }
            }
        }

        self.stats.running.store(false, Ordering::SeqCst);
        let final_stats = self.stats.snapshot(self.id);
        info!(
            worker_id = self.id,
            processed = final_stats.processed,
            failed = final_stats.failed,
            empty_polls = final_stats.empty_polls,
            "worker stopped"
        );
    }

    /// Push a not-yet-due job back and wait a poll interval so a lone
    /// deferred job cannot spin the loop
    async fn defer(&self, job: crate::job::PaymentJob) {
        debug!(
            worker_id = self.id,
            job_id = %job.job_id,
            due_at = %job.scheduled_for,
            "job not due yet, re-deferring"
        );
        if let Err(e) = self.queue.enqueue_with_retry(job.clone()).await {
            let serialized = serde_json::to_string(&job).unwrap_or_else(|_| job.job_id.clone());
            error!(
                worker_id = self.id,
                error = %e,
                job = %serialized,
                "failed to re-defer job; retained in log"
            );
        }
        tokio::time::sleep(self.config.poll_interval).await;
    }

    async fn process_job(&self, job: crate::job::PaymentJob) {
        let job_id = job.job_id.clone();
        let started = Instant::now();

        let outcome = AssertUnwindSafe(self.processor.process(job))
            .catch_unwind()
            .await;

        let elapsed_ms = started.elapsed().as_millis() as u64;
        self.stats.record_timing(elapsed_ms);

        match outcome {
            Ok(JobOutcome::Completed) => {
                self.stats.processed.fetch_add(1, Ordering::Relaxed);
                debug!(worker_id = self.id, job_id = %job_id, elapsed_ms, "job completed");
            }
            Ok(outcome) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                debug!(worker_id = self.id, job_id = %job_id, ?outcome, elapsed_ms, "job failed");
            }
            Err(_) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                error!(worker_id = self.id, job_id = %job_id, "panic while processing job");
            }
        }
    }
}
