//! # Remit Core
//!
//! Payment domain boundary consumed by the job processing engine.
//!
//! The engine in `remit-queue` only ever touches payments through the
//! [`PaymentStore`] and [`PaymentGateway`] traits defined here; the
//! in-memory store and the simulated gateway exist for tests and demos.

pub mod gateway;
pub mod payment;
pub mod store;

pub use gateway::{PaymentGateway, SimulatedGateway};
pub use payment::{Payment, PaymentError, PaymentMethod, PaymentStatus};
pub use store::{MemoryPaymentStore, PaymentStore};
