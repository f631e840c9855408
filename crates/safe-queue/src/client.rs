//! Client interface for acknowledged queues.
//!
//! [`StandardQueueClient`] wraps an [`AckQueue`] and retries checkouts that
//! lose a race with another consumer. Only contention is retried; every other
//! failure reaches the caller on the first occurrence.

use crate::config::{QueueConfig, StoreConfig};
use crate::error::QueueError;
use crate::message::{AckableMessage, Message};
use crate::queue::{AckQueue, Queue, QueueStats};
use crate::retry::RetryPolicy;
use crate::store::AtomicStore;
use crate::stores::{InMemoryStore, RedisStore};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;

/// Main interface for queue operations
#[async_trait]
pub trait QueueClient: Send + Sync {
    /// Append a payload to the main queue
    async fn push(&self, payload: &[u8]) -> Result<(), QueueError>;

    /// Remove the head without acknowledgment tracking
    async fn pop(&self) -> Result<Option<Message>, QueueError>;

    /// Check out one message, retrying on contention.
    ///
    /// Returns `Ok(None)` when the queue is empty and when contention
    /// persists past the retry bound.
    async fn checkout(&self) -> Result<Option<AckableMessage>, QueueError>;

    /// Acknowledge a checked out message handle
    async fn acknowledge(&self, message: &Message) -> Result<(), QueueError>;

    /// Read queue and pending set sizes
    async fn stats(&self) -> Result<QueueStats, QueueError>;

    /// Delete the queue and its pending set
    async fn purge(&self) -> Result<(), QueueError>;
}

/// Factory for creating queue clients with appropriate stores
pub struct QueueClientFactory;

impl QueueClientFactory {
    /// Create queue client from configuration
    pub async fn create_client(config: &QueueConfig) -> Result<Box<dyn QueueClient>, QueueError> {
        config.validate()?;

        let store: Arc<dyn AtomicStore> = match &config.store {
            StoreConfig::Redis { url } => Arc::new(RedisStore::connect(url).await?),
            StoreConfig::InMemory => {
                info!("Using in-memory store; messages do not outlive the process");
                Arc::new(InMemoryStore::new())
            }
        };

        let queue = AckQueue::new(
            config.queue_name()?,
            config.pending_name()?,
            config.ttl(),
            store,
        );
        Ok(Box::new(StandardQueueClient::new(
            queue,
            config.retry_policy(),
        )))
    }

    /// Create test client with in-memory store and default settings
    pub fn create_test_client() -> Result<Box<dyn QueueClient>, QueueError> {
        let config = QueueConfig {
            store: StoreConfig::InMemory,
            ..QueueConfig::default()
        };
        let queue = AckQueue::new(
            config.queue_name()?,
            config.pending_name()?,
            config.ttl(),
            Arc::new(InMemoryStore::new()),
        );
        Ok(Box::new(StandardQueueClient::new(
            queue,
            RetryPolicy::immediate(config.queue.retry.max_attempts),
        )))
    }
}

/// Standard queue client implementation
#[derive(Debug, Clone)]
pub struct StandardQueueClient {
    queue: AckQueue,
    policy: RetryPolicy,
}

impl StandardQueueClient {
    pub fn new(queue: AckQueue, policy: RetryPolicy) -> Self {
        Self { queue, policy }
    }

    pub fn queue(&self) -> &AckQueue {
        &self.queue
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl QueueClient for StandardQueueClient {
    async fn push(&self, payload: &[u8]) -> Result<(), QueueError> {
        self.queue.push(payload).await
    }

    async fn pop(&self) -> Result<Option<Message>, QueueError> {
        self.queue.pop().await
    }

    async fn checkout(&self) -> Result<Option<AckableMessage>, QueueError> {
        let mut retries = 0;

        loop {
            let err = match self.queue.checkout().await {
                Ok(result) => return Ok(result),
                Err(err) if err.is_contention() => err,
                Err(err) => {
                    if err.is_transient() {
                        warn!(
                            queue = %self.queue.name(),
                            error = %err,
                            "Checkout failed on a store fault that may clear"
                        );
                    }
                    return Err(err);
                }
            };

            if retries >= self.policy.max_attempts {
                warn!(
                    queue = %self.queue.name(),
                    attempts = retries + 1,
                    error = %err,
                    "Checkout contention persisted, giving up"
                );
                return Ok(None);
            }

            let delay = self.policy.delay_for(retries);
            retries += 1;
            debug!(
                queue = %self.queue.name(),
                retry = retries,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %err,
                "Retrying checkout"
            );
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
    }

    async fn acknowledge(&self, message: &Message) -> Result<(), QueueError> {
        self.queue.acknowledge_message(message).await
    }

    async fn stats(&self) -> Result<QueueStats, QueueError> {
        self.queue.stats().await
    }

    async fn purge(&self) -> Result<(), QueueError> {
        self.queue.purge().await
    }
}
