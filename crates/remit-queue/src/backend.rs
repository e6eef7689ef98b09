//! Queue and dead-letter store traits

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::job::PaymentJob;

/// Enqueue attempts against a transiently unavailable backing store
pub const ENQUEUE_ATTEMPTS: u32 = 3;
/// Linear backoff step between enqueue attempts
pub const ENQUEUE_BACKOFF_STEP: Duration = Duration::from_millis(100);

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// Backing store unreachable after bounded retry; the job is NOT queued
    #[error("queue unavailable: {0}")]
    Unavailable(String),
    #[error("backend error: {0}")]
    Backend(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Shared, concurrent-safe store of pending jobs ordered by priority.
///
/// Jobs whose `scheduled_for` lies in the future are still visible to
/// `dequeue`; the queue has no native delay primitive and the worker
/// re-defers them.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Insert a job under its priority score
    async fn enqueue(&self, job: PaymentJob) -> Result<(), QueueError>;

    /// Atomically remove and return the lowest-score entry.
    ///
    /// `None` means "try again later": the queue may be empty or the
    /// backing store transiently unreachable.
    async fn dequeue(&self) -> Result<Option<PaymentJob>, QueueError>;

    /// Best-effort count; 0 when the backing store is unreachable
    async fn size(&self) -> usize;

    /// Enqueue with bounded retry against transient store failures.
    ///
    /// Three attempts with linear backoff; on exhaustion the caller
    /// gets [`QueueError::Unavailable`] and must not assume the job
    /// is queued.
    async fn enqueue_with_retry(&self, job: PaymentJob) -> Result<(), QueueError> {
        let mut last_error = String::new();
        for attempt in 1..=ENQUEUE_ATTEMPTS {
            match self.enqueue(job.clone()).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!(
                        job_id = %job.job_id,
                        attempt,
                        error = %e,
                        "enqueue attempt failed"
                    );
                    last_error = e.to_string();
                    if attempt < ENQUEUE_ATTEMPTS {
                        tokio::time::sleep(ENQUEUE_BACKOFF_STEP * attempt).await;
                    }
                }
            }
        }
        Err(QueueError::Unavailable(last_error))
    }
}

/// Metadata kept alongside each dead-lettered job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetterMetadata {
    pub job_id: String,
    pub reason: String,
    pub failed_at: DateTime<Utc>,
    pub payment_ref: Uuid,
    pub retry_count: u32,
}

impl DeadLetterMetadata {
    pub fn new(job: &PaymentJob, reason: &str) -> Self {
        Self {
            job_id: job.job_id.clone(),
            reason: reason.to_string(),
            failed_at: Utc::now(),
            payment_ref: job.payment_ref,
            retry_count: job.retry_count,
        }
    }
}

/// Durable store of permanently failed jobs plus failure metadata.
///
/// Administrative operations only promise eventual consistency with
/// recent adds.
#[async_trait]
pub trait DeadLetterStore: Send + Sync {
    /// Durably record the job and why it was parked
    async fn add(&self, job: &PaymentJob, reason: &str) -> Result<(), QueueError>;

    async fn list(&self) -> Result<Vec<PaymentJob>, QueueError>;

    /// Best-effort count; 0 when the backing store is unreachable
    async fn count(&self) -> usize;

    async fn metadata(&self, job_id: &str) -> Result<Option<DeadLetterMetadata>, QueueError>;

    /// Destructive administrative wipe
    async fn clear(&self) -> Result<(), QueueError>;
}
