//! In-memory queue and dead-letter store

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::backend::{DeadLetterMetadata, DeadLetterStore, JobQueue, QueueError};
use crate::job::PaymentJob;

/// Ordering key: priority score first, then enqueue sequence.
///
/// The sequence number gives deterministic FIFO within a priority
/// band; the backing-store-dependent tie order of the original design
/// is deliberately pinned down here.
type QueueKey = (u8, u64);

/// In-memory priority queue.
///
/// `pop_first` under the write lock is the atomic pop: two racing
/// workers can never receive the same entry.
#[derive(Debug, Default)]
pub struct MemoryJobQueue {
    entries: RwLock<BTreeMap<QueueKey, PaymentJob>>,
    seq: AtomicU64,
}

impl MemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobQueue for MemoryJobQueue {
    async fn enqueue(&self, job: PaymentJob) -> Result<(), QueueError> {
        let key = (job.priority_score(), self.seq.fetch_add(1, Ordering::Relaxed));
        self.entries.write().await.insert(key, job);
        Ok(())
    }

    async fn dequeue(&self) -> Result<Option<PaymentJob>, QueueError> {
        Ok(self.entries.write().await.pop_first().map(|(_, job)| job))
    }

    async fn size(&self) -> usize {
        self.entries.read().await.len()
    }
}

/// In-memory dead-letter store with a parallel metadata map
#[derive(Debug, Default)]
pub struct MemoryDeadLetter {
    inner: RwLock<DeadLetterState>,
}

#[derive(Debug, Default)]
struct DeadLetterState {
    jobs: Vec<PaymentJob>,
    metadata: HashMap<String, DeadLetterMetadata>,
}

impl MemoryDeadLetter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DeadLetterStore for MemoryDeadLetter {
    async fn add(&self, job: &PaymentJob, reason: &str) -> Result<(), QueueError> {
        let mut inner = self.inner.write().await;
        inner
            .metadata
            .insert(job.job_id.clone(), DeadLetterMetadata::new(job, reason));
        inner.jobs.push(job.clone());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<PaymentJob>, QueueError> {
        Ok(self.inner.read().await.jobs.clone())
    }

    async fn count(&self) -> usize {
        self.inner.read().await.jobs.len()
    }

    async fn metadata(&self, job_id: &str) -> Result<Option<DeadLetterMetadata>, QueueError> {
        Ok(self.inner.read().await.metadata.get(job_id).cloned())
    }

    async fn clear(&self) -> Result<(), QueueError> {
        let mut inner = self.inner.write().await;
        inner.jobs.clear();
        inner.metadata.clear();
        Ok(())
    }
}
