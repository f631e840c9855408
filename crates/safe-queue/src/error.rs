//! Error types for queue and store operations.

use thiserror::Error;

/// Error type for all queue operations
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Push to queue '{queue_name}' failed: store reported no item added")]
    PushFailed { queue_name: String },

    #[error("Checkout from queue '{queue_name}' failed: {reason}")]
    AckPopFailed { queue_name: String, reason: String },

    #[error("EOF while checking out from queue '{queue_name}': pending entry collision could not be resolved")]
    AckPopEof { queue_name: String },

    #[error("Timestamp update failed while redelivering from queue '{queue_name}'")]
    TimestampUpdateFailed { queue_name: String },

    #[error("Store returned unexpected type: expected {expected}, found {found}")]
    UnexpectedType {
        expected: &'static str,
        found: String,
    },

    #[error("Acknowledgment is not available for this message; only checked out messages can be acknowledged")]
    AckNotAvailable,

    /// The pending entry is gone or was restamped by a later redelivery
    #[error("Acknowledgment failed: token '{token}' is not pending under this checkout")]
    AckFailed { token: String },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    ConfigurationError(#[from] ConfigurationError),

    #[error("Validation error: {0}")]
    ValidationError(#[from] ValidationError),
}

impl QueueError {
    /// Check if error is store contention that a fresh checkout attempt can resolve
    pub fn is_contention(&self) -> bool {
        matches!(
            self,
            Self::AckPopFailed { .. } | Self::AckPopEof { .. } | Self::TimestampUpdateFailed { .. }
        )
    }

    /// Check if error is transient and the operation may succeed later
    pub fn is_transient(&self) -> bool {
        match self {
            Self::PushFailed { .. } => false,
            Self::AckPopFailed { .. } => true,
            Self::AckPopEof { .. } => true,
            Self::TimestampUpdateFailed { .. } => true,
            Self::UnexpectedType { .. } => false,
            Self::AckNotAvailable => false,
            Self::AckFailed { .. } => false,
            Self::Store(store) => store.is_transient(),
            Self::ConfigurationError(_) => false,
            Self::ValidationError(_) => false,
        }
    }
}

/// Errors reported by an atomic store backend
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Connection failed: {message}")]
    ConnectionFailed { message: String },

    /// The operation ran and deliberately aborted with an error code.
    #[error("Operation rejected ({code}): {message}")]
    Rejected { code: String, message: String },

    /// The store could not run the operation right now (for example another
    /// script is still executing).
    #[error("Store busy: {message}")]
    Busy { message: String },

    #[error("Backend error: {message}")]
    Backend { message: String },
}

impl StoreError {
    /// Check if the backend fault may clear on its own
    pub fn is_transient(&self) -> bool {
        match self {
            Self::ConnectionFailed { .. } => true,
            Self::Rejected { .. } => false,
            Self::Busy { .. } => true,
            Self::Backend { .. } => false,
        }
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration: {key}")]
    Missing { key: String },

    #[error("Configuration parsing failed: {message}")]
    Parsing { message: String },
}

impl From<config::ConfigError> for ConfigurationError {
    fn from(err: config::ConfigError) -> Self {
        match err {
            config::ConfigError::NotFound(key) => Self::Missing { key },
            other => Self::Parsing {
                message: other.to_string(),
            },
        }
    }
}

/// Validation errors
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    Required { field: String },

    #[error("Invalid format for {field}: {message}")]
    InvalidFormat { field: String, message: String },

    #[error("Value out of range for {field}: {message}")]
    OutOfRange { field: String, message: String },
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
