//! Plain and acknowledged queues over an [`AtomicStore`].
//!
//! [`PlainQueue`] is a FIFO list. [`AckQueue`] adds a pending set: a
//! checkout moves the head message into the pending set under a
//! [`DeliveryToken`], and the message stays there until acknowledged. Pending
//! entries older than the queue's ttl are handed out again by the next
//! checkout, before any fresh message.
//!
//! Each checkout stamps its pending entry with the store's time and hands the
//! stamp back inside a [`Receipt`]. Acknowledgment only succeeds while the
//! entry still carries that stamp, so a consumer whose ttl ran out cannot
//! remove a message that has since been handed to someone else.

use crate::error::{QueueError, StoreError};
use crate::message::{AckableMessage, DeliveryToken, Message, QueueName, Receipt};
use crate::store::{codes, AtomicStore, StoreOperation, StoreValue};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;

/// FIFO operations shared by every queue flavour
#[async_trait]
pub trait Queue: Send + Sync {
    /// Append a payload to the tail. Payloads are opaque bytes.
    async fn push(&self, payload: &[u8]) -> Result<(), QueueError>;

    /// Remove the head without acknowledgment tracking
    async fn pop(&self) -> Result<Option<Message>, QueueError>;
}

/// Queue lengths at one instant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueStats {
    /// Messages waiting in the main queue
    pub queued: u64,
    /// Messages checked out and not yet acknowledged
    pub pending: u64,
}

// ============================================================================
// Shared Store Calls
// ============================================================================

async fn push_payload(
    store: &dyn AtomicStore,
    queue: &QueueName,
    payload: &[u8],
) -> Result<(), QueueError> {
    let reply = store
        .execute(StoreOperation::Push {
            queue: queue.clone(),
            payload: Bytes::copy_from_slice(payload),
        })
        .await?;

    match reply {
        StoreValue::Integer(n) if n >= 1 => {
            debug!(queue = %queue, "Pushed message");
            Ok(())
        }
        StoreValue::Nil | StoreValue::Integer(_) => Err(QueueError::PushFailed {
            queue_name: queue.to_string(),
        }),
        other => Err(unexpected("integer", &other)),
    }
}

async fn pop_payload(
    store: &dyn AtomicStore,
    queue: &QueueName,
) -> Result<Option<Message>, QueueError> {
    let reply = store
        .execute(StoreOperation::Pop {
            queue: queue.clone(),
        })
        .await?;

    if let StoreValue::Nil = reply {
        return Ok(None);
    }
    let payload = into_payload(reply)?;
    debug!(queue = %queue, "Popped message");
    Ok(Some(Message::new(payload)))
}

async fn read_stats(
    store: &dyn AtomicStore,
    queue: &QueueName,
    pending: Option<&QueueName>,
) -> Result<QueueStats, QueueError> {
    let reply = store
        .execute(StoreOperation::Stats {
            queue: queue.clone(),
            pending: pending.cloned(),
        })
        .await?;

    match reply {
        StoreValue::Array(items) => match items.as_slice() {
            [StoreValue::Integer(queued), StoreValue::Integer(pending)] => Ok(QueueStats {
                queued: u64::try_from(*queued).unwrap_or(0),
                pending: u64::try_from(*pending).unwrap_or(0),
            }),
            _ => Err(QueueError::UnexpectedType {
                expected: "[integer, integer]",
                found: format!("array of {}", items.len()),
            }),
        },
        other => Err(unexpected("array", &other)),
    }
}

fn unexpected(expected: &'static str, found: &StoreValue) -> QueueError {
    QueueError::UnexpectedType {
        expected,
        found: found.kind().to_string(),
    }
}

/// Payload bytes from a `Text` or `Binary` reply
fn into_payload(reply: StoreValue) -> Result<Bytes, QueueError> {
    match reply {
        StoreValue::Text(text) => Ok(Bytes::from(text)),
        StoreValue::Binary(bytes) => Ok(Bytes::from(bytes)),
        other => Err(unexpected("text or binary", &other)),
    }
}

/// Decode a checkout reply of `[sequence, payload, timestamp]` or nil
fn decode_checkout(reply: StoreValue) -> Result<Option<Receipt>, QueueError> {
    const SHAPE: &str = "[text, text or binary, integer]";

    let items = match reply {
        StoreValue::Nil => return Ok(None),
        StoreValue::Array(items) => items,
        other => return Err(unexpected("array", &other)),
    };

    let [sequence, payload, stamp] = <[StoreValue; 3]>::try_from(items).map_err(|items| {
        QueueError::UnexpectedType {
            expected: SHAPE,
            found: format!("array of {}", items.len()),
        }
    })?;

    let (StoreValue::Text(sequence), StoreValue::Integer(delivered_at)) = (&sequence, &stamp)
    else {
        return Err(QueueError::UnexpectedType {
            expected: SHAPE,
            found: format!("[{}, {}, {}]", sequence.kind(), payload.kind(), stamp.kind()),
        });
    };

    let sequence = crate::message::parse_sequence(sequence).map_err(|_| {
        QueueError::UnexpectedType {
            expected: "decimal sequence",
            found: format!("'{}'", sequence),
        }
    })?;
    let token = DeliveryToken::new(sequence, into_payload(payload)?);
    Ok(Some(Receipt::new(token, *delivered_at)))
}

// ============================================================================
// PlainQueue
// ============================================================================

/// FIFO queue without acknowledgment
#[derive(Clone)]
pub struct PlainQueue {
    name: QueueName,
    store: Arc<dyn AtomicStore>,
}

impl PlainQueue {
    pub fn new(name: QueueName, store: Arc<dyn AtomicStore>) -> Self {
        Self { name, store }
    }

    pub fn name(&self) -> &QueueName {
        &self.name
    }

    pub async fn stats(&self) -> Result<QueueStats, QueueError> {
        read_stats(self.store.as_ref(), &self.name, None).await
    }

    /// Delete the queue and everything in it
    pub async fn purge(&self) -> Result<(), QueueError> {
        self.store.delete(&[self.name.clone()]).await?;
        info!(queue = %self.name, "Purged queue");
        Ok(())
    }
}

#[async_trait]
impl Queue for PlainQueue {
    async fn push(&self, payload: &[u8]) -> Result<(), QueueError> {
        push_payload(self.store.as_ref(), &self.name, payload).await
    }

    async fn pop(&self) -> Result<Option<Message>, QueueError> {
        pop_payload(self.store.as_ref(), &self.name).await
    }
}

impl std::fmt::Debug for PlainQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlainQueue")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// AckQueue
// ============================================================================

/// FIFO queue with checkout, acknowledgment and redelivery after `ttl`
#[derive(Clone)]
pub struct AckQueue {
    name: QueueName,
    pending_name: QueueName,
    ttl: Duration,
    store: Arc<dyn AtomicStore>,
}

impl AckQueue {
    /// Create an acknowledged queue.
    ///
    /// `pending_name` must differ from `name`; `ttl` is how long a checked
    /// out message stays invisible before it can be redelivered.
    pub fn new(
        name: QueueName,
        pending_name: QueueName,
        ttl: Duration,
        store: Arc<dyn AtomicStore>,
    ) -> Self {
        Self {
            name,
            pending_name,
            ttl,
            store,
        }
    }

    pub fn name(&self) -> &QueueName {
        &self.name
    }

    pub fn pending_name(&self) -> &QueueName {
        &self.pending_name
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Check out one message.
    ///
    /// Returns the oldest overdue pending message if there is one, otherwise
    /// the head of the queue, otherwise `None`. The whole decision runs as a
    /// single store operation.
    ///
    /// # Errors
    ///
    /// - [`QueueError::TimestampUpdateFailed`], [`QueueError::AckPopEof`] and
    ///   [`QueueError::AckPopFailed`] signal contention; a fresh attempt may
    ///   succeed. After `AckPopEof` the message is back at the queue head.
    /// - [`QueueError::UnexpectedType`] if the reply cannot be decoded.
    pub async fn checkout(&self) -> Result<Option<AckableMessage>, QueueError> {
        let reply = self
            .store
            .execute(StoreOperation::Checkout {
                queue: self.name.clone(),
                pending: self.pending_name.clone(),
                ttl: self.ttl,
            })
            .await
            .map_err(|e| self.map_checkout_error(e))?;

        let receipt = decode_checkout(reply)?;
        if let Some(ref receipt) = receipt {
            debug!(queue = %self.name, receipt = %receipt, "Checked out message");
        }
        Ok(receipt.map(|receipt| AckableMessage::new(receipt, self.clone())))
    }

    /// Remove the pending entry a checkout created.
    ///
    /// # Errors
    ///
    /// [`QueueError::AckFailed`] if the entry is gone or no longer carries
    /// the receipt's stamp: already acknowledged, redelivered to another
    /// consumer after the ttl ran out, or never checked out here.
    pub async fn acknowledge(&self, receipt: &Receipt) -> Result<(), QueueError> {
        let token = receipt.token();
        let reply = self
            .store
            .execute(StoreOperation::Acknowledge {
                pending: self.pending_name.clone(),
                member: token.to_member(),
                delivered_at: receipt.delivered_at(),
            })
            .await?;

        match reply {
            StoreValue::Integer(1) => {
                debug!(queue = %self.name, token = %token, "Acknowledged message");
                Ok(())
            }
            StoreValue::Nil | StoreValue::Integer(_) => Err(QueueError::AckFailed {
                token: token.to_string(),
            }),
            other => Err(unexpected("integer", &other)),
        }
    }

    /// Acknowledge a message handle.
    ///
    /// # Errors
    ///
    /// [`QueueError::AckNotAvailable`] for messages obtained from `pop`.
    pub async fn acknowledge_message(&self, message: &Message) -> Result<(), QueueError> {
        match message.receipt() {
            Some(receipt) => self.acknowledge(receipt).await,
            None => Err(QueueError::AckNotAvailable),
        }
    }

    pub async fn stats(&self) -> Result<QueueStats, QueueError> {
        read_stats(self.store.as_ref(), &self.name, Some(&self.pending_name)).await
    }

    /// Delete the queue and its pending set
    pub async fn purge(&self) -> Result<(), QueueError> {
        self.store
            .delete(&[self.name.clone(), self.pending_name.clone()])
            .await?;
        info!(queue = %self.name, pending = %self.pending_name, "Purged queue");
        Ok(())
    }

    fn map_checkout_error(&self, err: StoreError) -> QueueError {
        let queue_name = self.name.to_string();
        match err {
            StoreError::Rejected { code, .. } if code == codes::TIMESTAMP_UPDATE_FAILED => {
                QueueError::TimestampUpdateFailed { queue_name }
            }
            StoreError::Rejected { code, .. } if code == codes::CHECKOUT_EOF => {
                QueueError::AckPopEof { queue_name }
            }
            StoreError::Busy { message } => QueueError::AckPopFailed {
                queue_name,
                reason: message,
            },
            other => QueueError::Store(other),
        }
    }
}

#[async_trait]
impl Queue for AckQueue {
    async fn push(&self, payload: &[u8]) -> Result<(), QueueError> {
        push_payload(self.store.as_ref(), &self.name, payload).await
    }

    async fn pop(&self) -> Result<Option<Message>, QueueError> {
        pop_payload(self.store.as_ref(), &self.name).await
    }
}

impl std::fmt::Debug for AckQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AckQueue")
            .field("name", &self.name)
            .field("pending_name", &self.pending_name)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}
