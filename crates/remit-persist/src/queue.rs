//! Durable priority job queue on SQLite

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use tracing::warn;

use remit_queue::{JobQueue, PaymentJob, QueueError};

/// SQLite-backed job queue.
///
/// Ordering is `(score ASC, seq ASC)`: lower score drains first, ties
/// drain in enqueue order. The dequeue is a single `DELETE ...
/// RETURNING` statement, so two racing workers can never claim the
/// same row.
pub struct SqliteJobQueue {
    pool: SqlitePool,
}

impl SqliteJobQueue {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobQueue for SqliteJobQueue {
    async fn enqueue(&self, job: PaymentJob) -> Result<(), QueueError> {
        let payload = serde_json::to_string(&job)?;
        sqlx::query("INSERT INTO queue_jobs (job_id, score, job) VALUES (?, ?, ?)")
            .bind(&job.job_id)
            .bind(job.priority_score() as i64)
            .bind(payload)
            .execute(&self.pool)
            .await
            .map_err(|e| QueueError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn dequeue(&self) -> Result<Option<PaymentJob>, QueueError> {
        let row = sqlx::query(
            "DELETE FROM queue_jobs
             WHERE seq = (
                 SELECT seq FROM queue_jobs ORDER BY score ASC, seq ASC LIMIT 1
             )
             RETURNING job",
        )
        .fetch_optional(&self.pool)
        .await;

        let row = match row {
            Ok(row) => row,
            Err(e) => {
                // Transient store trouble looks like an empty poll; the
                // worker retries on its normal interval
                warn!(error = %e, "dequeue failed, treating as empty");
                return Ok(None);
            }
        };

        match row {
            Some(row) => {
                let payload: String = row
                    .try_get("job")
                    .map_err(|e| QueueError::Backend(e.to_string()))?;
                Ok(Some(serde_json::from_str(&payload)?))
            }
            None => Ok(None),
        }
    }

    async fn size(&self) -> usize {
        let count: Result<i64, sqlx::Error> =
            sqlx::query_scalar("SELECT COUNT(*) FROM queue_jobs")
                .fetch_one(&self.pool)
                .await;
        match count {
            Ok(count) => count as usize,
            Err(e) => {
                warn!(error = %e, "queue size query failed");
                0
            }
        }
    }
}
