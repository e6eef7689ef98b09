//! Durable dead-letter store on SQLite

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use tracing::warn;
use uuid::Uuid;

use remit_queue::{DeadLetterMetadata, DeadLetterStore, PaymentJob, QueueError};

/// SQLite-backed store of permanently failed jobs.
///
/// The full job payload and its failure metadata live in one row, so an
/// add is atomic and a job can never appear without its reason.
pub struct SqliteDeadLetterStore {
    pool: SqlitePool,
}

impl SqliteDeadLetterStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeadLetterStore for SqliteDeadLetterStore {
    async fn add(&self, job: &PaymentJob, reason: &str) -> Result<(), QueueError> {
        let payload = serde_json::to_string(job)?;
        sqlx::query(
            "INSERT OR REPLACE INTO dead_letter_jobs
                 (job_id, job, reason, failed_at, payment_ref, retry_count)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&job.job_id)
        .bind(payload)
        .bind(reason)
        .bind(Utc::now())
        .bind(job.payment_ref.to_string())
        .bind(job.retry_count as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| QueueError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<PaymentJob>, QueueError> {
        let rows = sqlx::query("SELECT job FROM dead_letter_jobs ORDER BY failed_at ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| QueueError::Backend(e.to_string()))?;

        let mut jobs = Vec::with_capacity(rows.len());
        for row in rows {
            let payload: String = row
                .try_get("job")
                .map_err(|e| QueueError::Backend(e.to_string()))?;
            jobs.push(serde_json::from_str(&payload)?);
        }
        Ok(jobs)
    }

    async fn count(&self) -> usize {
        let count: Result<i64, sqlx::Error> =
            sqlx::query_scalar("SELECT COUNT(*) FROM dead_letter_jobs")
                .fetch_one(&self.pool)
                .await;
        match count {
            Ok(count) => count as usize,
            Err(e) => {
                warn!(error = %e, "dead letter count query failed");
                0
            }
        }
    }

    async fn metadata(&self, job_id: &str) -> Result<Option<DeadLetterMetadata>, QueueError> {
        let row = sqlx::query(
            "SELECT reason, failed_at, payment_ref, retry_count
             FROM dead_letter_jobs WHERE job_id = ?",
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| QueueError::Backend(e.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let reason: String = row
            .try_get("reason")
            .map_err(|e| QueueError::Backend(e.to_string()))?;
        let failed_at: DateTime<Utc> = row
            .try_get("failed_at")
            .map_err(|e| QueueError::Backend(e.to_string()))?;
        let payment_ref: String = row
            .try_get("payment_ref")
            .map_err(|e| QueueError::Backend(e.to_string()))?;
        let payment_ref = Uuid::parse_str(&payment_ref)
            .map_err(|e| QueueError::Backend(e.to_string()))?;
        let retry_count: i64 = row
            .try_get("retry_count")
            .map_err(|e| QueueError::Backend(e.to_string()))?;

        Ok(Some(DeadLetterMetadata {
            job_id: job_id.to_string(),
            reason,
            failed_at,
            payment_ref,
            retry_count: retry_count as u32,
        }))
    }

    async fn clear(&self) -> Result<(), QueueError> {
        sqlx::query("DELETE FROM dead_letter_jobs")
            .execute(&self.pool)
            .await
            .map_err(|e| QueueError::Backend(e.to_string()))?;
        Ok(())
    }
}
