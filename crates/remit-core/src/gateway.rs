//! Payment gateway trait and a simulated implementation

use async_trait::async_trait;
use rand::Rng;
use uuid::Uuid;

use crate::payment::{PaymentError, PaymentMethod};
use crate::store::PaymentStore;

/// External payment action.
///
/// No idempotency contract is assumed: a retried job may invoke
/// `execute` again for the same payment.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Run the payment action, returning the gateway transaction id
    async fn execute(&self, payment_ref: Uuid) -> Result<String, PaymentError>;
}

/// Simulated gateway that randomly succeeds or declines.
///
/// Decline messages follow the payment method so the failure
/// classifier downstream has realistic text to work with.
pub struct SimulatedGateway<S> {
    store: S,
}

impl<S: PaymentStore> SimulatedGateway<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S: PaymentStore> PaymentGateway for SimulatedGateway<S> {
    async fn execute(&self, payment_ref: Uuid) -> Result<String, PaymentError> {
        let payment = self
            .store
            .find(payment_ref)
            .await?
            .ok_or(PaymentError::NotFound(payment_ref))?;

        let success = rand::rng().random_bool(0.5);
        if success {
            Ok(format!("TXN{}", chrono::Utc::now().timestamp_millis()))
        } else {
            let reason = match payment.method {
                PaymentMethod::Card => "Card declined or insufficient funds",
                PaymentMethod::Upi => "UPI app not responding or invalid VPA",
            };
            Err(PaymentError::Gateway(reason.to_string()))
        }
    }
}
