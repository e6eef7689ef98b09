//! Retry backoff policy

use std::time::Duration;

use rand::Rng;

/// Attempt numbers start at 1; zero is a programming error
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("attempt number must be positive, got {0}")]
pub struct InvalidAttempt(pub u32);

/// Exponential backoff with uniform jitter.
///
/// `base = initial * factor^(attempt-1)`, capped at `max`, then scaled
/// by a uniform factor in `[0.5, 1.5)`. The jitter keeps a burst of
/// simultaneous failures from retrying in lockstep.
#[derive(Debug, Clone, Copy)]
pub struct ExponentialBackoff {
    initial: Duration,
    factor: f64,
    max: Duration,
}

impl Default for ExponentialBackoff {
    /// Nominal 1s/2s/4s/8s schedule
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            factor: 2.0,
            max: Duration::from_secs(8),
        }
    }
}

impl ExponentialBackoff {
    pub fn new(initial: Duration, factor: f64, max: Duration) -> Self {
        Self {
            initial,
            factor,
            max,
        }
    }

    /// Capped base delay for an attempt, before jitter
    pub fn base_delay(&self, attempt: u32) -> Result<Duration, InvalidAttempt> {
        if attempt == 0 {
            return Err(InvalidAttempt(attempt));
        }
        let base = self.initial.as_millis() as f64 * self.factor.powi(attempt as i32 - 1);
        let capped = base.min(self.max.as_millis() as f64);
        Ok(Duration::from_millis(capped as u64))
    }

    /// Jittered delay for an attempt
    pub fn delay(&self, attempt: u32) -> Result<Duration, InvalidAttempt> {
        let capped = self.base_delay(attempt)?;
        let jitter: f64 = rand::rng().random_range(0.5..1.5);
        Ok(Duration::from_millis((capped.as_millis() as f64 * jitter) as u64))
    }
}
