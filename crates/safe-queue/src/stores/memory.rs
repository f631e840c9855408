//! In-memory atomic store for testing and development.
//!
//! This module provides a fully functional in-memory store that:
//! - Keeps lists and pending sets in a single mutex-guarded keyspace
//! - Runs every operation under one lock acquisition, so operations are
//!   indivisible with respect to each other
//! - Reads its [`Clock`] once per operation
//!
//! Pending sets follow sorted-set semantics: one entry per member, ordered by
//! score, with ties broken by member.

use crate::clock::{duration_micros, Clock, SystemClock};
use crate::error::StoreError;
use crate::message::{DeliveryToken, QueueName};
use crate::store::{codes, AtomicStore, StoreOperation, StoreValue};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;

// ============================================================================
// Internal Storage Structures
// ============================================================================

/// All keys held by one store
#[derive(Default)]
struct Keyspace {
    lists: HashMap<QueueName, VecDeque<Bytes>>,
    pending: HashMap<QueueName, PendingSet>,
}

impl Keyspace {
    fn list_mut(&mut self, key: &QueueName) -> &mut VecDeque<Bytes> {
        self.lists.entry(key.clone()).or_default()
    }

    fn pending_mut(&mut self, key: &QueueName) -> &mut PendingSet {
        self.pending.entry(key.clone()).or_default()
    }

    /// Drop keys that became empty, as a key-value store would
    fn prune(&mut self, key: &QueueName) {
        if self.lists.get(key).is_some_and(VecDeque::is_empty) {
            self.lists.remove(key);
        }
        if self.pending.get(key).is_some_and(PendingSet::is_empty) {
            self.pending.remove(key);
        }
    }
}

/// Sorted set of pending members keyed by delivery timestamp
#[derive(Default)]
struct PendingSet {
    scores: HashMap<Vec<u8>, i64>,
    ordered: BTreeSet<(i64, Vec<u8>)>,
}

impl PendingSet {
    fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    fn len(&self) -> usize {
        self.scores.len()
    }

    /// Insert only if the member is absent. Returns whether it was added.
    fn insert_if_absent(&mut self, score: i64, member: &[u8]) -> bool {
        if self.scores.contains_key(member) {
            return false;
        }
        self.scores.insert(member.to_vec(), score);
        self.ordered.insert((score, member.to_vec()));
        true
    }

    /// Set the member's score. Returns whether a new member was added.
    fn upsert(&mut self, score: i64, member: &[u8]) -> bool {
        match self.scores.insert(member.to_vec(), score) {
            Some(previous) => {
                self.ordered.remove(&(previous, member.to_vec()));
                self.ordered.insert((score, member.to_vec()));
                false
            }
            None => {
                self.ordered.insert((score, member.to_vec()));
                true
            }
        }
    }

    /// Remove the member only if it still carries `score`
    fn remove_scored(&mut self, member: &[u8], score: i64) -> bool {
        if self.scores.get(member) != Some(&score) {
            return false;
        }
        self.scores.remove(member);
        self.ordered.remove(&(score, member.to_vec()));
        true
    }

    /// Oldest member with score at or below `cutoff`
    fn first_at_or_below(&self, cutoff: i64) -> Option<&[u8]> {
        self.ordered
            .iter()
            .next()
            .filter(|(score, _)| *score <= cutoff)
            .map(|(_, member)| member.as_slice())
    }

    /// Highest sequence currently pending for `payload`
    fn highest_sequence(&self, payload: &[u8]) -> Option<u64> {
        self.scores
            .keys()
            .filter_map(|member| DeliveryToken::from_member(member).ok())
            .filter(|token| &token.payload()[..] == payload)
            .map(|token| token.sequence())
            .max()
    }
}

fn token_reply(token: &DeliveryToken, stamped_at: i64) -> StoreValue {
    StoreValue::Array(vec![
        StoreValue::Text(token.sequence().to_string()),
        StoreValue::from_bytes(token.payload().to_vec()),
        StoreValue::Integer(stamped_at),
    ])
}

fn count_reply(count: usize) -> StoreValue {
    StoreValue::Integer(i64::try_from(count).unwrap_or(i64::MAX))
}

// ============================================================================
// InMemoryStore
// ============================================================================

/// In-memory atomic store. Clones share the same keyspace.
#[derive(Clone)]
pub struct InMemoryStore {
    keyspace: Arc<Mutex<Keyspace>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryStore {
    /// Create an empty store reading the wall clock
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty store reading `clock`
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            keyspace: Arc::new(Mutex::new(Keyspace::default())),
            clock,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Keyspace>, StoreError> {
        self.keyspace.lock().map_err(|_| StoreError::Backend {
            message: "in-memory keyspace lock poisoned".to_string(),
        })
    }

    fn push(keyspace: &mut Keyspace, queue: &QueueName, payload: Bytes) -> StoreValue {
        keyspace.list_mut(queue).push_back(payload);
        StoreValue::Integer(1)
    }

    fn pop(keyspace: &mut Keyspace, queue: &QueueName) -> StoreValue {
        let head = keyspace.list_mut(queue).pop_front();
        keyspace.prune(queue);
        head.map_or(StoreValue::Nil, |payload| {
            StoreValue::from_bytes(payload.to_vec())
        })
    }

    fn checkout(
        keyspace: &mut Keyspace,
        queue: &QueueName,
        pending: &QueueName,
        ttl_micros: i64,
        now: i64,
    ) -> Result<StoreValue, StoreError> {
        // Overdue entries take priority over fresh messages
        let overdue = keyspace
            .pending
            .get(pending)
            .and_then(|set| set.first_at_or_below(now.saturating_sub(ttl_micros)))
            .map(<[u8]>::to_vec);

        if let Some(member) = overdue {
            if keyspace.pending_mut(pending).upsert(now, &member) {
                return Err(StoreError::Rejected {
                    code: codes::TIMESTAMP_UPDATE_FAILED.to_string(),
                    message: "timestamp update failed".to_string(),
                });
            }

            let token = DeliveryToken::from_member(&member).map_err(|e| StoreError::Backend {
                message: format!(
                    "malformed pending member '{}': {}",
                    String::from_utf8_lossy(&member),
                    e
                ),
            })?;
            debug!(pending = %pending, token = %token, "Redelivering overdue message");
            return Ok(token_reply(&token, now));
        }

        let Some(payload) = keyspace.list_mut(queue).pop_front() else {
            keyspace.prune(queue);
            return Ok(StoreValue::Nil);
        };
        keyspace.prune(queue);

        let set = keyspace.pending_mut(pending);
        let first = DeliveryToken::first(payload.clone());
        if set.insert_if_absent(now, &first.to_member()) {
            return Ok(token_reply(&first, now));
        }

        let retry = set
            .highest_sequence(&payload)
            .and_then(|highest| DeliveryToken::new(highest, payload.clone()).next());
        if let Some(token) = retry {
            if set.insert_if_absent(now, &token.to_member()) {
                return Ok(token_reply(&token, now));
            }
        }

        warn!(queue = %queue, "Pending token collision unresolved; returning message to queue head");
        keyspace.list_mut(queue).push_front(payload);
        Err(StoreError::Rejected {
            code: codes::CHECKOUT_EOF.to_string(),
            message: "EOF while checkout".to_string(),
        })
    }

    fn acknowledge(
        keyspace: &mut Keyspace,
        pending: &QueueName,
        member: &[u8],
        delivered_at: i64,
    ) -> StoreValue {
        let removed = keyspace
            .pending
            .get_mut(pending)
            .is_some_and(|set| set.remove_scored(member, delivered_at));
        keyspace.prune(pending);

        if removed {
            StoreValue::Integer(1)
        } else {
            StoreValue::Nil
        }
    }

    fn stats(keyspace: &Keyspace, queue: &QueueName, pending: Option<&QueueName>) -> StoreValue {
        let queued = keyspace.lists.get(queue).map_or(0, VecDeque::len);
        let pending = pending
            .and_then(|key| keyspace.pending.get(key))
            .map_or(0, PendingSet::len);
        StoreValue::Array(vec![count_reply(queued), count_reply(pending)])
    }

    /// Place a pending entry directly, bypassing checkout
    #[cfg(test)]
    pub(crate) fn seed_pending(&self, pending: &QueueName, score: i64, member: &[u8]) {
        let mut keyspace = self.keyspace.lock().unwrap();
        keyspace.pending_mut(pending).upsert(score, member);
    }

    /// Pending members with their scores, oldest first
    #[cfg(test)]
    pub(crate) fn pending_entries(&self, pending: &QueueName) -> Vec<(i64, Vec<u8>)> {
        let keyspace = self.keyspace.lock().unwrap();
        keyspace
            .pending
            .get(pending)
            .map(|set| set.ordered.iter().cloned().collect())
            .unwrap_or_default()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AtomicStore for InMemoryStore {
    async fn execute(&self, operation: StoreOperation) -> Result<StoreValue, StoreError> {
        let mut keyspace = self.lock()?;

        match operation {
            StoreOperation::Push { queue, payload } => {
                Ok(Self::push(&mut keyspace, &queue, payload))
            }
            StoreOperation::Pop { queue } => Ok(Self::pop(&mut keyspace, &queue)),
            StoreOperation::Checkout {
                queue,
                pending,
                ttl,
            } => {
                let now = self.clock.now_micros();
                Self::checkout(&mut keyspace, &queue, &pending, duration_micros(ttl), now)
            }
            StoreOperation::Acknowledge {
                pending,
                member,
                delivered_at,
            } => Ok(Self::acknowledge(
                &mut keyspace,
                &pending,
                &member,
                delivered_at,
            )),
            StoreOperation::Stats { queue, pending } => {
                Ok(Self::stats(&keyspace, &queue, pending.as_ref()))
            }
        }
    }

    async fn delete(&self, keys: &[QueueName]) -> Result<u64, StoreError> {
        let mut keyspace = self.lock()?;

        let mut deleted = 0;
        for key in keys {
            let list = keyspace.lists.remove(key).is_some();
            let set = keyspace.pending.remove(key).is_some();
            if list || set {
                deleted += 1;
            }
        }
        Ok(deleted)
    }
}
