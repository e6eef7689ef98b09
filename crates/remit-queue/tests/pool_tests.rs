//! Worker pool lifecycle tests: start, scale, stop, panic containment

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use remit_core::{
    MemoryPaymentStore, Payment, PaymentError, PaymentGateway, PaymentMethod, PaymentStatus,
    PaymentStore,
};
use remit_queue::{
    ExponentialBackoff, JobProcessor, JobQueue, MemoryDeadLetter, MemoryFailureSink,
    MemoryJobQueue, PaymentJob, PoolConfig, PoolError, ProcessorConfig, WorkerConfig, WorkerPool,
};

struct InstantGateway {
    calls: AtomicU32,
    delay: Duration,
}

impl InstantGateway {
    fn new() -> Self {
        Self {
            calls: AtomicU32::new(0),
            delay: Duration::ZERO,
        }
    }

    fn slow(delay: Duration) -> Self {
        Self {
            calls: AtomicU32::new(0),
            delay,
        }
    }
}

#[async_trait]
impl PaymentGateway for InstantGateway {
    async fn execute(&self, _payment_ref: Uuid) -> Result<String, PaymentError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(format!("TXN{call}"))
    }
}

/// Gateway used to prove the worker loop survives a panicking job
struct PanicGateway;

#[async_trait]
impl PaymentGateway for PanicGateway {
    async fn execute(&self, _payment_ref: Uuid) -> Result<String, PaymentError> {
        panic!("gateway blew up");
    }
}

struct Harness {
    queue: Arc<MemoryJobQueue>,
    payments: Arc<MemoryPaymentStore>,
    pool: WorkerPool,
}

fn harness_with(gateway: Arc<dyn PaymentGateway>, config: PoolConfig) -> Harness {
    let queue = Arc::new(MemoryJobQueue::new());
    let payments = Arc::new(MemoryPaymentStore::new());

    let processor = Arc::new(JobProcessor::new(
        queue.clone(),
        Arc::new(MemoryDeadLetter::new()),
        payments.clone(),
        gateway,
        Arc::new(MemoryFailureSink::new()),
        ProcessorConfig {
            backoff: ExponentialBackoff::new(
                Duration::from_millis(1),
                2.0,
                Duration::from_millis(1),
            ),
            fast_path_timeout: Duration::from_secs(2),
        },
    ));

    let pool = WorkerPool::new(queue.clone(), processor, config);
    Harness {
        queue,
        payments,
        pool,
    }
}

fn fast_pool_config() -> PoolConfig {
    PoolConfig {
        worker: WorkerConfig {
            poll_interval: Duration::from_millis(5),
            error_backoff: Duration::from_millis(5),
        },
        stats_interval: None,
    }
}

async fn seed_jobs(harness: &Harness, count: usize) {
    for _ in 0..count {
        let payment_ref = harness
            .payments
            .insert(Payment::new(1_000, "INR", PaymentMethod::Card))
            .await;
        harness
            .queue
            .enqueue(PaymentJob::new(payment_ref, 1_000))
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn pool_drains_queue_and_counts_every_job() {
    let harness = harness_with(Arc::new(InstantGateway::new()), fast_pool_config());
    seed_jobs(&harness, 5).await;

    harness.pool.start(3).await;
    assert!(harness.pool.is_started());
    assert_eq!(harness.pool.worker_count().await, 3);

    for _ in 0..100 {
        if harness.queue.size().await == 0 && harness.pool.stats().await.total_processed == 5 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let stats = harness.pool.stats().await;
    assert_eq!(stats.total_processed, 5);
    assert_eq!(stats.total_failed, 0);
    assert_eq!(stats.active_workers, 3);
    assert_eq!(harness.queue.size().await, 0);

    harness.pool.stop(Duration::from_secs(1)).await;
    assert!(!harness.pool.is_started());
    assert_eq!(harness.pool.stats().await.active_workers, 0);
}

#[tokio::test]
async fn second_start_is_a_no_op() {
    let harness = harness_with(Arc::new(InstantGateway::new()), fast_pool_config());

    harness.pool.start(2).await;
    harness.pool.start(5).await;
    assert_eq!(harness.pool.worker_count().await, 2);

    harness.pool.stop(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn scale_up_requires_a_started_pool() {
    let harness = harness_with(Arc::new(InstantGateway::new()), fast_pool_config());

    let err = harness.pool.scale_up(2).await.unwrap_err();
    assert!(matches!(err, PoolError::NotStarted));

    harness.pool.start(1).await;
    harness.pool.scale_up(2).await.unwrap();
    assert_eq!(harness.pool.worker_count().await, 3);
    assert_eq!(harness.pool.stats().await.workers.len(), 3);

    harness.pool.stop(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn graceful_stop_finishes_the_in_flight_job() {
    let harness = harness_with(
        Arc::new(InstantGateway::slow(Duration::from_millis(100))),
        fast_pool_config(),
    );
    seed_jobs(&harness, 1).await;

    harness.pool.start(1).await;
    // Let the worker pick the job up, then stop mid-flight
    tokio::time::sleep(Duration::from_millis(30)).await;
    harness.pool.stop(Duration::from_secs(1)).await;

    let stats = harness.pool.stats().await;
    assert_eq!(stats.total_processed, 1, "in-flight job must complete");
    assert_eq!(harness.queue.size().await, 0);
}

#[tokio::test]
async fn stop_deadline_force_aborts_stuck_workers() {
    // Long poll sleep keeps the worker from noticing the stop flag
    let config = PoolConfig {
        worker: WorkerConfig {
            poll_interval: Duration::from_secs(30),
            error_backoff: Duration::from_secs(30),
        },
        stats_interval: None,
    };
    let harness = harness_with(Arc::new(InstantGateway::new()), config);

    harness.pool.start(2).await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    let started = tokio::time::Instant::now();
    harness.pool.stop(Duration::from_millis(50)).await;
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(!harness.pool.is_started());
}

#[tokio::test]
async fn deferred_job_is_picked_up_when_due() {
    let harness = harness_with(Arc::new(InstantGateway::new()), fast_pool_config());

    let payment_ref = harness
        .payments
        .insert(Payment::new(1_000, "INR", PaymentMethod::Upi))
        .await;
    let mut job = PaymentJob::new(payment_ref, 1_000);
    job.scheduled_for = chrono::Utc::now() + chrono::Duration::milliseconds(100);
    harness.queue.enqueue(job).await.unwrap();

    harness.pool.start(1).await;

    for _ in 0..100 {
        if harness.pool.stats().await.total_processed == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(harness.pool.stats().await.total_processed, 1);
    let payment = harness
        .payments
        .find(payment_ref)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Succeeded);

    harness.pool.stop(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn worker_survives_a_panicking_job() {
    let harness = harness_with(Arc::new(PanicGateway), fast_pool_config());
    seed_jobs(&harness, 1).await;

    harness.pool.start(1).await;

    for _ in 0..100 {
        if harness.pool.stats().await.total_failed >= 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let stats = harness.pool.stats().await;
    assert!(stats.total_failed >= 1);
    assert_eq!(stats.active_workers, 1, "worker loop must survive the panic");

    harness.pool.stop(Duration::from_secs(1)).await;
    assert_eq!(harness.pool.stats().await.active_workers, 0);
}

#[tokio::test]
async fn idle_workers_record_empty_polls() {
    let harness = harness_with(Arc::new(InstantGateway::new()), fast_pool_config());

    harness.pool.start(1).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    harness.pool.stop(Duration::from_secs(1)).await;

    let stats = harness.pool.stats().await;
    assert!(stats.workers[0].empty_polls > 0);
    assert_eq!(stats.total_processed, 0);
}
