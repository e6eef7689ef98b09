//! Job processor: runs one payment attempt and decides the outcome

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info, warn};

use remit_core::{PaymentError, PaymentGateway, PaymentStatus, PaymentStore};

use crate::backend::{DeadLetterStore, JobQueue, QueueError};
use crate::backoff::ExponentialBackoff;
use crate::failure::{FailureRecord, FailureSink};
use crate::job::{JobOutcome, PaymentJob};

/// Processor tuning knobs
#[derive(Debug, Clone, Copy)]
pub struct ProcessorConfig {
    pub backoff: ExponentialBackoff,
    /// Bound on the synchronous pre-queue attempt in [`JobProcessor::submit`]
    pub fast_path_timeout: Duration,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            backoff: ExponentialBackoff::default(),
            fast_path_timeout: Duration::from_secs(2),
        }
    }
}

/// Where a submitted job ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Fast path succeeded; the payment is already terminal-success
    Completed,
    /// Fast path failed or timed out; the job is queued for the workers
    Queued,
}

/// Executes a job's payment action and converts every failure into an
/// outcome. Nothing escapes as an error to the worker: retryable
/// failures go back to the queue with a delay, terminal failures go to
/// the dead-letter store, and the payment's terminal status is written
/// exactly once either way.
pub struct JobProcessor {
    queue: Arc<dyn JobQueue>,
    dead_letter: Arc<dyn DeadLetterStore>,
    payments: Arc<dyn PaymentStore>,
    gateway: Arc<dyn PaymentGateway>,
    failures: Arc<dyn FailureSink>,
    config: ProcessorConfig,
}

impl JobProcessor {
    pub fn new(
        queue: Arc<dyn JobQueue>,
        dead_letter: Arc<dyn DeadLetterStore>,
        payments: Arc<dyn PaymentStore>,
        gateway: Arc<dyn PaymentGateway>,
        failures: Arc<dyn FailureSink>,
        config: ProcessorConfig,
    ) -> Self {
        Self {
            queue,
            dead_letter,
            payments,
            gateway,
            failures,
            config,
        }
    }

    /// Process one job to an outcome
    pub async fn process(&self, mut job: PaymentJob) -> JobOutcome {
        info!(
            job_id = %job.job_id,
            attempt = job.retry_count + 1,
            max_tries = job.max_tries,
            "processing payment job"
        );

        match self.attempt(&job).await {
            Ok(()) => {
                info!(job_id = %job.job_id, payment_ref = %job.payment_ref, "payment completed");
                JobOutcome::Completed
            }
            Err(err) => {
                warn!(job_id = %job.job_id, error = %err, "payment attempt failed");
                self.handle_failure(&mut job, err).await
            }
        }
    }

    /// Synchronous fast path: try the payment once under a bounded
    /// timeout and fall back to the queue on failure or timeout. A slow
    /// gateway call can therefore never stall the submitting caller.
    pub async fn submit(&self, job: PaymentJob) -> Result<SubmitOutcome, QueueError> {
        let fast = tokio::time::timeout(self.config.fast_path_timeout, self.attempt(&job)).await;
        match fast {
            Ok(Ok(())) => {
                info!(job_id = %job.job_id, "fast path completed payment");
                Ok(SubmitOutcome::Completed)
            }
            Ok(Err(_)) | Err(_) => {
                self.mark_processing(&job).await;
                self.queue.enqueue_with_retry(job).await?;
                Ok(SubmitOutcome::Queued)
            }
        }
    }

    /// One payment attempt: lookup, gateway action, terminal-success write
    async fn attempt(&self, job: &PaymentJob) -> Result<(), PaymentError> {
        let mut payment = self
            .payments
            .find(job.payment_ref)
            .await?
            .ok_or(PaymentError::NotFound(job.payment_ref))?;

        let txn_id = self.gateway.execute(job.payment_ref).await?;

        payment.complete(txn_id);
        self.payments.save(payment).await?;
        Ok(())
    }

    async fn handle_failure(&self, job: &mut PaymentJob, err: PaymentError) -> JobOutcome {
        let record = FailureRecord::analyze(&err, job.retry_count + 1);
        job.retry_count += 1;
        job.last_error = Some(err.to_string());

        if let Err(sink_err) = self.failures.record(job, &record).await {
            warn!(job_id = %job.job_id, error = %sink_err, "failure sink unavailable");
        }

        if record.retryable && job.retries_remaining() {
            match self.config.backoff.delay(job.retry_count) {
                Ok(delay) => {
                    job.scheduled_for =
                        Utc::now() + chrono::Duration::milliseconds(delay.as_millis() as i64);
                    info!(
                        job_id = %job.job_id,
                        retry = job.retry_count,
                        delay_ms = delay.as_millis() as u64,
                        category = %record.category,
                        "scheduling retry with backoff"
                    );

                    match self.queue.enqueue_with_retry(job.clone()).await {
                        Ok(()) => return JobOutcome::Retrying,
                        Err(requeue_err) => {
                            // Fail-safe: a job that cannot go back to the
                            // queue is parked, never silently dropped.
                            let reason = format!(
                                "Failed to requeue for retry: {requeue_err} | Category: {} | Retryable: {} | {}",
                                record.category, record.retryable, record.error
                            );
                            return self.dead_letter_job(job, &reason).await;
                        }
                    }
                }
                Err(invalid) => {
                    // Unreachable with retry_count >= 1; park rather than lose the job
                    let reason =
                        format!("Backoff computation failed: {invalid} | {}", record.error);
                    return self.dead_letter_job(job, &reason).await;
                }
            }
        }

        let reason = if record.retryable {
            format!(
                "Max retries exceeded ({}) | Category: {} | Retryable: true | {}",
                job.retry_count, record.category, record.error
            )
        } else {
            format!(
                "Non-retryable failure | Category: {} | Retryable: false | {}",
                record.category, record.error
            )
        };
        self.dead_letter_job(job, &reason).await
    }

    async fn dead_letter_job(&self, job: &PaymentJob, reason: &str) -> JobOutcome {
        if let Err(dl_err) = self.dead_letter.add(job, reason).await {
            // Bookkeeping failure must never crash or lose the job:
            // keep a verbatim serialized copy in the log instead.
            let serialized =
                serde_json::to_string(job).unwrap_or_else(|_| job.job_id.clone());
            error!(
                job_id = %job.job_id,
                error = %dl_err,
                job = %serialized,
                "dead letter write failed; job retained in log"
            );
        } else {
            info!(job_id = %job.job_id, reason, "job moved to dead letter store");
        }

        let message = job
            .last_error
            .clone()
            .unwrap_or_else(|| reason.to_string());
        self.mark_failed(job, &message).await;

        JobOutcome::DeadLettered
    }

    /// Terminal-failure write, best effort
    async fn mark_failed(&self, job: &PaymentJob, message: &str) {
        match self.payments.find(job.payment_ref).await {
            Ok(Some(mut payment)) => {
                payment.fail(message.to_string());
                if let Err(e) = self.payments.save(payment).await {
                    warn!(payment_ref = %job.payment_ref, error = %e, "failed to mark payment failed");
                }
            }
            Ok(None) => {
                warn!(payment_ref = %job.payment_ref, "payment missing while marking failed");
            }
            Err(e) => {
                warn!(payment_ref = %job.payment_ref, error = %e, "payment lookup failed while marking failed");
            }
        }
    }

    /// Flip a queued payment to Processing, best effort
    async fn mark_processing(&self, job: &PaymentJob) {
        if let Ok(Some(mut payment)) = self.payments.find(job.payment_ref).await {
            if !payment.status.is_terminal() {
                payment.status = PaymentStatus::Processing;
                if let Err(e) = self.payments.save(payment).await {
                    warn!(payment_ref = %job.payment_ref, error = %e, "failed to mark payment processing");
                }
            }
        }
    }
}
