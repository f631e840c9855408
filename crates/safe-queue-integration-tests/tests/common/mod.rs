//! Common test utilities for safe-queue integration tests
//!
//! This module provides:
//! - In-memory queues driven by a manual clock
//! - Live Redis queues under unique key names
//! - Helpers for draining queues

#![allow(dead_code)]

use safe_queue::{
    AckQueue, AckableMessage, AtomicStore, InMemoryStore, ManualClock, QueueName, RedisStore,
};
use std::sync::Arc;
use std::time::Duration;

/// Arbitrary fixed start time, microseconds since the epoch
pub const START_MICROS: i64 = 1_700_000_000_000_000;

pub fn name(value: &str) -> QueueName {
    QueueName::new(value.to_string()).expect("valid queue name")
}

/// Acknowledged queue over an in-memory store with a manual clock
pub fn in_memory_queue(ttl: Duration) -> (AckQueue, ManualClock) {
    let clock = ManualClock::new(START_MICROS);
    let store = InMemoryStore::with_clock(Arc::new(clock.clone()));
    let queue = AckQueue::new(name("jobs"), name("ack:jobs"), ttl, Arc::new(store));
    (queue, clock)
}

pub fn redis_url() -> String {
    std::env::var("SAFE_QUEUE_TEST_REDIS_URL")
        .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string())
}

/// Acknowledged queue on a live Redis under a fresh, empty key pair
pub async fn redis_queue(prefix: &str, ttl: Duration) -> AckQueue {
    let store = RedisStore::connect(&redis_url())
        .await
        .expect("Redis should be reachable; set SAFE_QUEUE_TEST_REDIS_URL");

    let queue = name(&format!("{}-{}", prefix, rand::random::<u32>()));
    let pending = QueueName::with_prefix("ack", &queue).expect("valid pending name");
    store
        .delete(&[queue.clone(), pending.clone()])
        .await
        .expect("delete should succeed");

    AckQueue::new(queue, pending, ttl, Arc::new(store))
}

/// Payload of a test message that was pushed as text
pub fn payload_text(payload: &[u8]) -> String {
    String::from_utf8(payload.to_vec()).expect("test payloads are UTF-8")
}

/// Check out until the queue reports empty
pub async fn checkout_all(queue: &AckQueue) -> Vec<AckableMessage> {
    let mut messages = Vec::new();
    while let Some(message) = queue.checkout().await.expect("checkout should succeed") {
        messages.push(message);
    }
    messages
}
