//! Failure classification and tracking

use std::collections::HashMap;
use std::collections::VecDeque;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::backend::QueueError;
use crate::job::PaymentJob;

/// Longest error context kept on a failure record
const MAX_CONTEXT_LEN: usize = 500;

/// Records kept by the in-memory sink before old ones are dropped
const MAX_HISTORY: usize = 1000;

/// What went wrong, and whether replaying could help.
///
/// Validation and constraint failures will not succeed on replay;
/// transient infrastructure failures might.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureCategory {
    Gateway,
    Timeout,
    Validation,
    Network,
    Database,
    Unknown,
}

impl std::fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Gateway => "GATEWAY",
            Self::Timeout => "TIMEOUT",
            Self::Validation => "VALIDATION",
            Self::Network => "NETWORK",
            Self::Database => "DATABASE",
            Self::Unknown => "UNKNOWN",
        };
        f.write_str(name)
    }
}

const TIMEOUT_KEYWORDS: &[&str] = &["timeout", "timed out"];
const NETWORK_KEYWORDS: &[&str] = &["connection", "network", "socket", "host unreachable"];
const DATABASE_KEYWORDS: &[&str] = &["sql", "database", "constraint", "duplicate", "unique"];
const VALIDATION_KEYWORDS: &[&str] = &["validation", "invalid", "argument", "required", "must be"];
const GATEWAY_KEYWORDS: &[&str] = &["gateway", "payment", "declined", "insufficient", "card", "upi"];

impl FailureCategory {
    /// Classify an error by case-insensitive substring match.
    ///
    /// Categories are checked in fixed priority order; the first match
    /// wins. Order matters: a message may contain keywords from
    /// several categories ("connection timeout" is a timeout, not a
    /// network error).
    pub fn classify(error_text: &str) -> Self {
        let text = error_text.to_lowercase();
        let matches = |keywords: &[&str]| keywords.iter().any(|k| text.contains(k));

        if matches(TIMEOUT_KEYWORDS) {
            Self::Timeout
        } else if matches(NETWORK_KEYWORDS) {
            Self::Network
        } else if matches(DATABASE_KEYWORDS) {
            Self::Database
        } else if matches(VALIDATION_KEYWORDS) {
            Self::Validation
        } else if matches(GATEWAY_KEYWORDS) {
            Self::Gateway
        } else {
            Self::Unknown
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Gateway | Self::Timeout | Self::Network | Self::Unknown => true,
            Self::Validation | Self::Database => false,
        }
    }
}

/// One failed attempt, as forwarded to the failure-tracking sink
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureRecord {
    pub category: FailureCategory,
    pub retryable: bool,
    pub error: String,
    /// Truncated error context for diagnostics
    pub context: String,
    pub failed_at: DateTime<Utc>,
    pub attempt: u32,
}

impl FailureRecord {
    pub fn analyze(error: &dyn std::error::Error, attempt: u32) -> Self {
        let error_text = error.to_string();
        let category = FailureCategory::classify(&error_text);

        let mut context = format!("{error:?}");
        if context.len() > MAX_CONTEXT_LEN {
            let mut end = MAX_CONTEXT_LEN;
            while !context.is_char_boundary(end) {
                end -= 1;
            }
            context.truncate(end);
        }

        Self {
            category,
            retryable: category.is_retryable(),
            error: error_text,
            context,
            failed_at: Utc::now(),
            attempt,
        }
    }
}

/// Fire-and-forget failure tracking.
///
/// Unavailability of the sink must never affect a job's outcome; the
/// processor logs and drops any error returned here.
#[async_trait]
pub trait FailureSink: Send + Sync {
    async fn record(&self, job: &PaymentJob, record: &FailureRecord) -> Result<(), QueueError>;
}

/// Aggregate view over recorded failures
#[derive(Debug, Clone, Default, Serialize)]
pub struct FailureStats {
    pub total: u64,
    pub retryable: u64,
    pub non_retryable: u64,
    pub by_category: HashMap<String, u64>,
}

/// In-memory failure sink keeping bounded history and per-category counts
#[derive(Debug, Default)]
pub struct MemoryFailureSink {
    inner: RwLock<SinkState>,
}

#[derive(Debug, Default)]
struct SinkState {
    stats: FailureStats,
    history: VecDeque<FailureRecord>,
}

impl MemoryFailureSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn stats(&self) -> FailureStats {
        self.inner.read().await.stats.clone()
    }

    /// Most recent failures first
    pub async fn recent(&self, limit: usize) -> Vec<FailureRecord> {
        self.inner
            .read()
            .await
            .history
            .iter()
            .take(limit)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl FailureSink for MemoryFailureSink {
    async fn record(&self, _job: &PaymentJob, record: &FailureRecord) -> Result<(), QueueError> {
        let mut inner = self.inner.write().await;

        inner.stats.total += 1;
        if record.retryable {
            inner.stats.retryable += 1;
        } else {
            inner.stats.non_retryable += 1;
        }
        *inner
            .stats
            .by_category
            .entry(record.category.to_string())
            .or_insert(0) += 1;

        inner.history.push_front(record.clone());
        inner.history.truncate(MAX_HISTORY);

        Ok(())
    }
}
