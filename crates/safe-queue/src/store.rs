//! Capability interface for the atomic store backing a queue.
//!
//! Every [`StoreOperation`] is executed indivisibly by the backend: no other
//! caller can observe a popped-but-not-yet-pending message, a half-applied
//! redelivery, or a rollback in progress.

use crate::error::StoreError;
use crate::message::QueueName;
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;

/// Error codes a backend uses when an operation aborts deliberately
pub mod codes {
    /// A redelivery's in-place timestamp update added an entry instead
    pub const TIMESTAMP_UPDATE_FAILED: &str = "TSUPDATE";

    /// A checkout could not pick a free pending token and rolled back its pop
    pub const CHECKOUT_EOF: &str = "CHECKOUTEOF";
}

/// An indivisible operation against the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOperation {
    /// Append to the tail of a list. Replies `Integer(1)` or `Nil` if nothing
    /// was added.
    Push { queue: QueueName, payload: Bytes },

    /// Remove the head of a list. Replies the payload as `Text` or `Binary`,
    /// or `Nil` when empty.
    Pop { queue: QueueName },

    /// Redeliver the oldest overdue pending entry, or pop the head of the
    /// queue and record it as pending. Replies
    /// `Array([sequence, payload, Integer(timestamp)])` or `Nil`, where
    /// `timestamp` is the score the entry now carries.
    Checkout {
        queue: QueueName,
        pending: QueueName,
        ttl: Duration,
    },

    /// Remove a pending entry, but only while its score still equals
    /// `delivered_at`. Replies `Integer(1)`, or `Nil` when the member is
    /// missing or was restamped by a later redelivery.
    Acknowledge {
        pending: QueueName,
        member: Vec<u8>,
        delivered_at: i64,
    },

    /// Read list length and pending set size. Replies
    /// `Array([Integer, Integer])`; the second is 0 without a pending set.
    Stats {
        queue: QueueName,
        pending: Option<QueueName>,
    },
}

impl StoreOperation {
    /// Short operation name for logging
    pub fn name(&self) -> &'static str {
        match self {
            Self::Push { .. } => "push",
            Self::Pop { .. } => "pop",
            Self::Checkout { .. } => "checkout",
            Self::Acknowledge { .. } => "acknowledge",
            Self::Stats { .. } => "stats",
        }
    }
}

/// Reply shape returned by the store, decoded by the queue layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreValue {
    Nil,
    Integer(i64),
    Text(String),
    /// Raw bytes that are not valid UTF-8
    Binary(Vec<u8>),
    Array(Vec<StoreValue>),
}

impl StoreValue {
    /// Wrap raw bytes as `Text` when they are valid UTF-8, else `Binary`
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        match String::from_utf8(bytes) {
            Ok(text) => Self::Text(text),
            Err(e) => Self::Binary(e.into_bytes()),
        }
    }

    /// Name of the reply shape, used in decoding errors
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Nil => "nil",
            Self::Integer(_) => "integer",
            Self::Text(_) => "text",
            Self::Binary(_) => "binary",
            Self::Array(_) => "array",
        }
    }
}

/// Store capability consumed by the queues.
///
/// Implementations must run each operation atomically with respect to all
/// other operations on the same keys, and read time at most once per
/// operation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AtomicStore: Send + Sync {
    /// Execute one indivisible operation
    async fn execute(&self, operation: StoreOperation) -> Result<StoreValue, StoreError>;

    /// Delete keys, returning how many existed
    async fn delete(&self, keys: &[QueueName]) -> Result<u64, StoreError>;
}
