//! # Remit Queue
//!
//! Asynchronous payment job processing engine.
//!
//! Features:
//! - Priority job queue with pluggable backend (Memory, SQLite)
//! - Worker pool with per-worker statistics and dynamic scale-up
//! - Retry with exponential backoff and jitter
//! - Failure classification (retryable vs terminal)
//! - Dead-letter store for permanently failed jobs

pub mod backend;
pub mod backoff;
pub mod failure;
pub mod job;
pub mod memory;
pub mod pool;
pub mod processor;
pub mod worker;

pub use backend::{DeadLetterMetadata, DeadLetterStore, JobQueue, QueueError};
pub use backoff::{ExponentialBackoff, InvalidAttempt};
pub use failure::{FailureCategory, FailureRecord, FailureSink, MemoryFailureSink};
pub use job::{JobOutcome, JobPriority, PaymentJob};
pub use memory::{MemoryDeadLetter, MemoryJobQueue};
pub use pool::{PoolConfig, PoolError, PoolStats, WorkerPool};
pub use processor::{JobProcessor, ProcessorConfig, SubmitOutcome};
pub use worker::{Worker, WorkerConfig, WorkerStatsSnapshot};
