//! Payment job definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Amount above which a job is routed to the high-priority band
pub const HIGH_AMOUNT_THRESHOLD: i64 = 50_000;

/// Numeric score for high-priority entries; dequeue pops the lowest score
pub const HIGH_PRIORITY_SCORE: u8 = 0;
/// Numeric score for everything else
pub const LOW_PRIORITY_SCORE: u8 = 1;

/// Informational priority class.
///
/// Queue ordering is driven by the numeric score from
/// [`PaymentJob::priority_score`], not this label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobPriority {
    Low,
    Normal,
    High,
    Critical,
}

/// Outcome of one processing pass over a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobOutcome {
    /// Payment action succeeded, payment marked terminal-success
    Completed,
    /// Retryable failure, job re-enqueued with a backoff delay
    Retrying,
    /// Terminal failure, job moved to the dead-letter store
    DeadLettered,
}

/// The unit of asynchronous work: one payment-processing attempt chain.
///
/// Mutated only by the processor (`retry_count`, `scheduled_for`,
/// `last_error`); immutable once dead-lettered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentJob {
    /// Opaque unique id, generated at creation
    pub job_id: String,
    /// The payment this job acts on
    pub payment_ref: Uuid,
    /// Magnitude used only for priority routing
    pub amount: i64,
    /// Failed attempts so far; incremented exactly once per failure
    pub retry_count: u32,
    /// Retry ceiling, fixed at creation
    pub max_tries: u32,
    pub priority: JobPriority,
    pub created_at: DateTime<Utc>,
    /// Not eligible for processing before this time
    pub scheduled_for: DateTime<Utc>,
    /// Last failure message, overwritten each failed attempt
    pub last_error: Option<String>,
}

impl PaymentJob {
    /// Default retry ceiling: four failed attempts, then dead-letter
    pub const DEFAULT_MAX_TRIES: u32 = 4;

    pub fn new(payment_ref: Uuid, amount: i64) -> Self {
        let now = Utc::now();
        Self {
            job_id: Uuid::new_v4().to_string(),
            payment_ref,
            amount,
            retry_count: 0,
            max_tries: Self::DEFAULT_MAX_TRIES,
            priority: if amount > HIGH_AMOUNT_THRESHOLD {
                JobPriority::High
            } else {
                JobPriority::Normal
            },
            created_at: now,
            scheduled_for: now,
            last_error: None,
        }
    }

    pub fn with_max_tries(mut self, max_tries: u32) -> Self {
        self.max_tries = max_tries;
        self
    }

    /// Queue ordering score: high-amount jobs drain first
    pub fn priority_score(&self) -> u8 {
        if self.amount > HIGH_AMOUNT_THRESHOLD {
            HIGH_PRIORITY_SCORE
        } else {
            LOW_PRIORITY_SCORE
        }
    }

    /// Whether the retry ceiling still allows another attempt
    pub fn retries_remaining(&self) -> bool {
        self.retry_count < self.max_tries
    }

    /// Whether the job is eligible for processing now
    pub fn is_due(&self) -> bool {
        Utc::now() >= self.scheduled_for
    }
}
