//! Payment record and status lifecycle

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Payment lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    /// Accepted, nothing attempted yet
    Pending,
    /// Queued or mid-attempt
    Processing,
    /// Terminal success
    Succeeded,
    /// Terminal failure
    Failed,
    /// Cancelled by the caller
    Cancelled,
}

impl PaymentStatus {
    /// Whether the payment has reached a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }
}

/// How the payment is funded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    Card,
    Upi,
}

/// A payment record as seen by the engine.
///
/// The engine flips `status` to a terminal value exactly once per job
/// outcome; everything else is owned by the surrounding application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    /// Integer minor units; the engine only uses this for priority routing
    pub amount: i64,
    pub currency: String,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub failure_reason: Option<String>,
    pub gateway_txn_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Payment {
    pub fn new(amount: i64, currency: &str, method: PaymentMethod) -> Self {
        Self {
            id: Uuid::new_v4(),
            amount,
            currency: currency.to_string(),
            method,
            status: PaymentStatus::Pending,
            failure_reason: None,
            gateway_txn_id: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Mark terminal success with the gateway transaction id
    pub fn complete(&mut self, txn_id: String) {
        self.status = PaymentStatus::Succeeded;
        self.gateway_txn_id = Some(txn_id);
        self.completed_at = Some(Utc::now());
    }

    /// Mark terminal failure with a reason
    pub fn fail(&mut self, reason: String) {
        self.status = PaymentStatus::Failed;
        self.failure_reason = Some(reason);
        self.completed_at = Some(Utc::now());
    }
}

/// Errors surfaced by the payment collaborators.
///
/// The `Gateway` and `Store` variants display the raw message so the
/// failure classifier downstream can match on the original error text.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PaymentError {
    #[error("payment not found for ref: {0}")]
    NotFound(Uuid),
    #[error("{0}")]
    Gateway(String),
    #[error("{0}")]
    Store(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_transitions() {
        let mut payment = Payment::new(2500, "INR", PaymentMethod::Card);
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert!(!payment.status.is_terminal());

        payment.complete("TXN42".to_string());
        assert_eq!(payment.status, PaymentStatus::Succeeded);
        assert_eq!(payment.gateway_txn_id.as_deref(), Some("TXN42"));
        assert!(payment.completed_at.is_some());
        assert!(payment.status.is_terminal());
    }

    #[test]
    fn failure_keeps_reason() {
        let mut payment = Payment::new(100, "INR", PaymentMethod::Upi);
        payment.fail("UPI app not responding".to_string());
        assert_eq!(payment.status, PaymentStatus::Failed);
        assert_eq!(
            payment.failure_reason.as_deref(),
            Some("UPI app not responding")
        );
    }

    #[test]
    fn error_display_is_raw_message() {
        let err = PaymentError::Gateway("Card declined or insufficient funds".into());
        assert_eq!(err.to_string(), "Card declined or insufficient funds");
    }
}
