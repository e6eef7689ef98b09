//! Payment store trait and in-memory implementation

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::payment::{Payment, PaymentError};

/// Persistent payment record store.
///
/// The engine treats an absent payment as a hard processing failure;
/// it never creates payments, only reads and updates them.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn find(&self, payment_ref: Uuid) -> Result<Option<Payment>, PaymentError>;

    async fn save(&self, payment: Payment) -> Result<(), PaymentError>;
}

/// In-memory payment store for tests and demos
#[derive(Debug, Default)]
pub struct MemoryPaymentStore {
    payments: RwLock<HashMap<Uuid, Payment>>,
}

impl MemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a payment directly, returning its id
    pub async fn insert(&self, payment: Payment) -> Uuid {
        let id = payment.id;
        self.payments.write().await.insert(id, payment);
        id
    }
}

#[async_trait]
impl PaymentStore for MemoryPaymentStore {
    async fn find(&self, payment_ref: Uuid) -> Result<Option<Payment>, PaymentError> {
        Ok(self.payments.read().await.get(&payment_ref).cloned())
    }

    async fn save(&self, payment: Payment) -> Result<(), PaymentError> {
        self.payments.write().await.insert(payment.id, payment);
        Ok(())
    }
}
