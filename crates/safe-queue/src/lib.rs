//! # Safe Queue
//!
//! Durable FIFO queue with at-least-once delivery over an atomic store.
//!
//! A plain queue supports `push` and `pop`. An acknowledged queue adds
//! `checkout`: the head message moves into a pending set under a delivery
//! token and stays invisible until it is acknowledged. If the consumer does
//! not acknowledge within the queue's ttl, the next checkout redelivers it
//! ahead of any fresh message. Payloads are opaque bytes.
//!
//! This library provides:
//! - Indivisible checkout, redelivery and rollback as single store operations
//! - Redis and in-memory store backends
//! - A client that retries checkout contention with exponential backoff
//! - Layered configuration from files and environment variables
//!
//! ## Module Organization
//!
//! - [`error`] - Error types for queue and store operations
//! - [`message`] - Queue names, delivery tokens, receipts and message handles
//! - [`store`] - The atomic store capability trait
//! - [`stores`] - Redis and in-memory store implementations
//! - [`queue`] - Plain and acknowledged queues
//! - [`client`] - Retrying client and factory
//! - [`retry`] - Retry policy with exponential backoff
//! - [`config`] - Configuration loading and validation
//! - [`clock`] - Time sources for the in-memory store

// Module declarations
pub mod client;
pub mod clock;
pub mod config;
pub mod error;
pub mod message;
pub mod queue;
pub mod retry;
pub mod store;
pub mod stores;

// Re-export commonly used types at crate root for convenience
pub use client::{QueueClient, QueueClientFactory, StandardQueueClient};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{QueueConfig, StoreConfig};
pub use error::{ConfigurationError, QueueError, StoreError, ValidationError};
pub use message::{AckableMessage, DeliveryToken, Message, QueueName, Receipt};
pub use queue::{AckQueue, PlainQueue, Queue, QueueStats};
pub use retry::RetryPolicy;
pub use store::{AtomicStore, StoreOperation, StoreValue};
pub use stores::{InMemoryStore, RedisStore};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
