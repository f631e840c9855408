//! Redis-backed atomic store.
//!
//! Each [`StoreOperation`] maps to one Lua script, so Redis executes it without
//! interleaving other commands. Time for checkout is read inside the script
//! with `TIME`, giving all consumers a single authoritative clock.

use super::scripts::Scripts;
use crate::clock::duration_micros;
use crate::error::StoreError;
use crate::message::{DeliveryToken, QueueName};
use crate::store::{codes, AtomicStore, StoreOperation, StoreValue};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{RedisError, Value};
use std::sync::Arc;
use tracing::{debug, info};

#[cfg(test)]
#[path = "redis_tests.rs"]
mod tests;

/// Atomic store over a Redis connection manager
#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
    scripts: Arc<Scripts>,
}

impl RedisStore {
    /// Connect to Redis
    ///
    /// Supports both redis:// and rediss:// (TLS) URLs
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url).map_err(map_redis_error)?;
        let connection = ConnectionManager::new(client)
            .await
            .map_err(map_redis_error)?;

        info!(tls = url.starts_with("rediss://"), "Connected to Redis store");
        Ok(Self::from_connection(connection))
    }

    /// Wrap an existing connection manager
    pub fn from_connection(connection: ConnectionManager) -> Self {
        Self {
            connection,
            scripts: Arc::new(Scripts::new()),
        }
    }
}

#[async_trait]
impl AtomicStore for RedisStore {
    async fn execute(&self, operation: StoreOperation) -> Result<StoreValue, StoreError> {
        let mut connection = self.connection.clone();
        let name = operation.name();

        let reply: Value = match operation {
            StoreOperation::Push { queue, payload } => {
                self.scripts
                    .push
                    .key(queue.as_str())
                    .arg(&payload[..])
                    .invoke_async(&mut connection)
                    .await
            }
            StoreOperation::Pop { queue } => {
                self.scripts
                    .pop
                    .key(queue.as_str())
                    .invoke_async(&mut connection)
                    .await
            }
            StoreOperation::Checkout {
                queue,
                pending,
                ttl,
            } => {
                self.scripts
                    .checkout
                    .key(queue.as_str())
                    .key(pending.as_str())
                    .arg(duration_micros(ttl))
                    .arg(DeliveryToken::MAX_SEQUENCE)
                    .invoke_async(&mut connection)
                    .await
            }
            StoreOperation::Acknowledge {
                pending,
                member,
                delivered_at,
            } => {
                self.scripts
                    .acknowledge
                    .key(pending.as_str())
                    .arg(member.as_slice())
                    .arg(delivered_at)
                    .invoke_async(&mut connection)
                    .await
            }
            StoreOperation::Stats { queue, pending } => {
                let mut invocation = self.scripts.stats.key(queue.as_str());
                if let Some(pending) = pending {
                    invocation.key(pending.as_str());
                }
                invocation.invoke_async(&mut connection).await
            }
        }
        .map_err(map_redis_error)?;

        debug!(operation = name, "Store operation completed");
        from_redis_value(reply)
    }

    async fn delete(&self, keys: &[QueueName]) -> Result<u64, StoreError> {
        if keys.is_empty() {
            return Ok(0);
        }

        let mut connection = self.connection.clone();
        let names: Vec<&str> = keys.iter().map(QueueName::as_str).collect();
        redis::cmd("DEL")
            .arg(&names)
            .query_async(&mut connection)
            .await
            .map_err(map_redis_error)
    }
}

/// Convert a Redis reply into the store reply shape
pub(crate) fn from_redis_value(value: Value) -> Result<StoreValue, StoreError> {
    match value {
        Value::Nil => Ok(StoreValue::Nil),
        Value::Int(n) => Ok(StoreValue::Integer(n)),
        Value::Boolean(b) => Ok(StoreValue::Integer(i64::from(b))),
        Value::Okay => Ok(StoreValue::Text("OK".to_string())),
        Value::SimpleString(s) => Ok(StoreValue::Text(s)),
        Value::BulkString(bytes) => Ok(StoreValue::from_bytes(bytes)),
        Value::Array(items) => items
            .into_iter()
            .map(from_redis_value)
            .collect::<Result<Vec<_>, _>>()
            .map(StoreValue::Array),
        other => Err(StoreError::Backend {
            message: format!("unsupported reply: {:?}", other),
        }),
    }
}

/// Classify a Redis error
pub(crate) fn map_redis_error(err: RedisError) -> StoreError {
    match err.code() {
        Some(code @ (codes::TIMESTAMP_UPDATE_FAILED | codes::CHECKOUT_EOF)) => {
            return StoreError::Rejected {
                code: code.to_string(),
                message: err.detail().unwrap_or_default().to_string(),
            };
        }
        Some("BUSY" | "LOADING" | "TRYAGAIN") => {
            return StoreError::Busy {
                message: err.to_string(),
            };
        }
        _ => {}
    }

    if err.is_io_error()
        || err.is_connection_refusal()
        || err.is_connection_dropped()
        || err.is_timeout()
    {
        StoreError::ConnectionFailed {
            message: err.to_string(),
        }
    } else {
        StoreError::Backend {
            message: err.to_string(),
        }
    }
}
