//! # Remit Persist
//!
//! SQLite-backed implementations of the queue-engine storage traits:
//! a durable priority job queue and a durable dead-letter store. Both
//! share one connection pool created by [`sqlite::connect`].

pub mod dead_letter;
pub mod queue;
pub mod sqlite;

pub use dead_letter::SqliteDeadLetterStore;
pub use queue::SqliteJobQueue;
pub use sqlite::{connect, SqliteConfig};
