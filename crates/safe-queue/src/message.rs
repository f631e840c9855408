//! Message types for queue operations including core domain identifiers.

use crate::error::{QueueError, ValidationError};
use crate::queue::AckQueue;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

// ============================================================================
// Core Domain Identifiers
// ============================================================================

/// Validated store key for a main queue or pending set
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct QueueName(String);

impl QueueName {
    /// Create new queue name with validation
    pub fn new(name: String) -> Result<Self, ValidationError> {
        if name.is_empty() || name.len() > 260 {
            return Err(ValidationError::OutOfRange {
                field: "queue_name".to_string(),
                message: "must be 1-260 characters".to_string(),
            });
        }

        // ':' is allowed for conventional store namespacing ("ack:jobs")
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == ':')
        {
            return Err(ValidationError::InvalidFormat {
                field: "queue_name".to_string(),
                message: "only ASCII alphanumeric, hyphens, underscores and colons allowed"
                    .to_string(),
            });
        }

        let is_separator = |c: char| c == '-' || c == ':';
        if name.starts_with(is_separator) || name.ends_with(is_separator) {
            return Err(ValidationError::InvalidFormat {
                field: "queue_name".to_string(),
                message: "no leading or trailing separators".to_string(),
            });
        }

        Ok(Self(name))
    }

    /// Create a name nested under a prefix, e.g. `ack:jobs`
    pub fn with_prefix(prefix: &str, base_name: &QueueName) -> Result<Self, ValidationError> {
        Self::new(format!("{}:{}", prefix, base_name.as_str()))
    }

    /// Get queue name as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for QueueName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for QueueName {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for QueueName {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<QueueName> for String {
    fn from(name: QueueName) -> Self {
        name.0
    }
}

/// Identity of a checked-out message inside the pending set.
///
/// Two checkouts of the same payload are told apart by `sequence`. In the
/// store the token is a single member `<sequence>|<payload>`; the sequence is
/// digits only, so the first `|` always ends it. Payloads are opaque bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeliveryToken {
    sequence: u64,
    payload: Bytes,
}

impl DeliveryToken {
    /// Separator between sequence and payload in the store member
    pub const SEPARATOR: u8 = b'|';

    /// Largest sequence a token may carry (2^53 - 1, exact in a Lua number)
    pub const MAX_SEQUENCE: u64 = (1 << 53) - 1;

    pub fn new(sequence: u64, payload: impl Into<Bytes>) -> Self {
        Self {
            sequence,
            payload: payload.into(),
        }
    }

    /// Token for the first checkout of a payload
    pub fn first(payload: impl Into<Bytes>) -> Self {
        Self::new(0, payload)
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Token with the next sequence for the same payload, if any remain
    pub fn next(&self) -> Option<Self> {
        if self.sequence >= Self::MAX_SEQUENCE {
            return None;
        }
        Some(Self::new(self.sequence + 1, self.payload.clone()))
    }

    /// Encode as the pending set member
    pub fn to_member(&self) -> Vec<u8> {
        let sequence = self.sequence.to_string();
        let mut member = Vec::with_capacity(sequence.len() + 1 + self.payload.len());
        member.extend_from_slice(sequence.as_bytes());
        member.push(Self::SEPARATOR);
        member.extend_from_slice(&self.payload);
        member
    }

    /// Decode a pending set member
    pub fn from_member(member: &[u8]) -> Result<Self, ValidationError> {
        let at = member
            .iter()
            .position(|&b| b == Self::SEPARATOR)
            .ok_or_else(|| ValidationError::InvalidFormat {
                field: "delivery_token".to_string(),
                message: "missing sequence separator".to_string(),
            })?;

        let sequence = std::str::from_utf8(&member[..at]).map_err(|_| {
            ValidationError::InvalidFormat {
                field: "delivery_token".to_string(),
                message: "sequence is not a decimal number".to_string(),
            }
        })?;

        Ok(Self::new(
            parse_sequence(sequence)?,
            Bytes::copy_from_slice(&member[at + 1..]),
        ))
    }
}

/// Parse a token sequence; digits only, no sign, at most `MAX_SEQUENCE`
pub(crate) fn parse_sequence(raw: &str) -> Result<u64, ValidationError> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ValidationError::InvalidFormat {
            field: "delivery_token".to_string(),
            message: format!("sequence '{}' is not a decimal number", raw),
        });
    }

    match raw.parse::<u64>() {
        Ok(sequence) if sequence <= DeliveryToken::MAX_SEQUENCE => Ok(sequence),
        _ => Err(ValidationError::OutOfRange {
            field: "delivery_token".to_string(),
            message: format!("sequence must not exceed {}", DeliveryToken::MAX_SEQUENCE),
        }),
    }
}

/// Non-UTF-8 payload bytes are shown lossily
impl std::fmt::Display for DeliveryToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}|{}",
            self.sequence,
            String::from_utf8_lossy(&self.payload)
        )
    }
}

impl FromStr for DeliveryToken {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_member(s.as_bytes())
    }
}

/// Proof of one particular checkout: the token plus the store timestamp
/// (microseconds) its pending entry was stamped with.
///
/// A redelivery keeps the token but restamps the entry, so an older receipt
/// for the same token no longer matches and cannot acknowledge it. Written as
/// `<delivered_at>:<sequence>|<payload>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Receipt {
    token: DeliveryToken,
    delivered_at: i64,
}

impl Receipt {
    pub fn new(token: DeliveryToken, delivered_at: i64) -> Self {
        Self {
            token,
            delivered_at,
        }
    }

    pub fn token(&self) -> &DeliveryToken {
        &self.token
    }

    /// Pending entry score at checkout, in microseconds
    pub fn delivered_at(&self) -> i64 {
        self.delivered_at
    }
}

impl std::fmt::Display for Receipt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.delivered_at, self.token)
    }
}

impl FromStr for Receipt {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (stamp, token) = s
            .split_once(':')
            .ok_or_else(|| ValidationError::InvalidFormat {
                field: "receipt".to_string(),
                message: "expected <delivered_at>:<sequence>|<payload>".to_string(),
            })?;

        if stamp.is_empty() || !stamp.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ValidationError::InvalidFormat {
                field: "receipt".to_string(),
                message: format!("delivery timestamp '{}' is not a decimal number", stamp),
            });
        }
        let delivered_at = stamp.parse::<i64>().map_err(|_| ValidationError::OutOfRange {
            field: "receipt".to_string(),
            message: format!("delivery timestamp '{}' is too large", stamp),
        })?;

        Ok(Self::new(token.parse()?, delivered_at))
    }
}

// ============================================================================
// Message Handles
// ============================================================================

/// A message returned to a consumer.
///
/// Messages from `pop` carry no receipt; messages from `checkout` carry the
/// receipt they must be acknowledged with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    payload: Bytes,
    receipt: Option<Receipt>,
}

impl Message {
    /// Create a message that cannot be acknowledged
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
            receipt: None,
        }
    }

    /// Create a message pending under `receipt`
    pub fn checked_out(receipt: Receipt) -> Self {
        Self {
            payload: receipt.token().payload().clone(),
            receipt: Some(receipt),
        }
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn receipt(&self) -> Option<&Receipt> {
        self.receipt.as_ref()
    }

    pub fn token(&self) -> Option<&DeliveryToken> {
        self.receipt.as_ref().map(Receipt::token)
    }

    /// Check if the message came from a checkout
    pub fn is_ackable(&self) -> bool {
        self.receipt.is_some()
    }

    pub fn into_payload(self) -> Bytes {
        self.payload
    }
}

/// A checked-out message bound to the queue it must be acknowledged on
#[derive(Clone)]
pub struct AckableMessage {
    receipt: Receipt,
    queue: AckQueue,
}

impl AckableMessage {
    pub(crate) fn new(receipt: Receipt, queue: AckQueue) -> Self {
        Self { receipt, queue }
    }

    pub fn payload(&self) -> &Bytes {
        self.receipt.token().payload()
    }

    pub fn token(&self) -> &DeliveryToken {
        self.receipt.token()
    }

    pub fn receipt(&self) -> &Receipt {
        &self.receipt
    }

    /// Convert into a plain message handle that still carries the receipt
    pub fn into_message(self) -> Message {
        Message::checked_out(self.receipt)
    }

    /// Remove the message from the pending set.
    ///
    /// Fails with [`QueueError::AckFailed`] if this checkout no longer owns
    /// the pending entry: it was acknowledged already, or its ttl ran out and
    /// the message was handed to another consumer.
    pub async fn acknowledge(&self) -> Result<(), QueueError> {
        self.queue.acknowledge(&self.receipt).await
    }
}

impl std::fmt::Debug for AckableMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AckableMessage")
            .field("receipt", &self.receipt)
            .field("queue", &self.queue.name())
            .finish()
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
