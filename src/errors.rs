// Copyright (c) 2025 - Cowboy AI, Inc.
//! Error types for ingestion operations
//!
//! Each collaborator has its own error enum; [`IngestionError`] composes them
//! and classifies the result for the pipeline's failure routing.

use std::fmt;
use thiserror::Error;

/// Transport failures that are worth retrying
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransientKind {
    /// Remote service could not be reached
    Unavailable,
    /// Remote service is shedding load
    ResourceExhausted,
    /// Call exceeded its deadline
    DeadlineExceeded,
}

impl fmt::Display for TransientKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransientKind::Unavailable => write!(f, "unavailable"),
            TransientKind::ResourceExhausted => write!(f, "resource exhausted"),
            TransientKind::DeadlineExceeded => write!(f, "deadline exceeded"),
        }
    }
}

/// Errors returned by an [`EventLog`](crate::event_log::EventLog)
#[derive(Debug, Clone, Error)]
pub enum AppendError {
    /// Retryable transport failure
    #[error("event log {kind}: {message}")]
    Transient {
        /// Classification used by the retry policy
        kind: TransientKind,
        /// Underlying error text
        message: String,
    },

    /// Data or validation failure; never retried
    #[error("event log rejected append: {0}")]
    Permanent(String),
}

impl AppendError {
    /// Build a transient error
    pub fn transient(kind: TransientKind, message: impl Into<String>) -> Self {
        AppendError::Transient {
            kind,
            message: message.into(),
        }
    }

    /// Whether the retry policy may try again
    pub fn is_transient(&self) -> bool {
        matches!(self, AppendError::Transient { .. })
    }
}

/// Errors returned by a [`DocumentStore`](crate::projection::DocumentStore)
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// A document with the same key already exists
    #[error("document already exists: {0}")]
    Duplicate(String),

    /// Store could not be reached or timed out
    #[error("document store unavailable: {0}")]
    Unavailable(String),

    /// Stored document could not be decoded or encoded
    #[error("document encoding error: {0}")]
    Encoding(String),

    /// Store rejected the operation
    #[error("document store error: {0}")]
    Rejected(String),
}

/// Errors returned by broker connections and channels
#[derive(Debug, Clone, Error)]
pub enum BrokerError {
    /// Opening a channel failed
    #[error("failed to open channel: {0}")]
    ChannelOpen(String),

    /// Channel was closed by either side
    #[error("channel closed")]
    ChannelClosed,

    /// Queue declaration failed
    #[error("failed to declare queue {queue}: {message}")]
    Declare {
        /// Queue name
        queue: String,
        /// Underlying error text
        message: String,
    },

    /// Publishing failed
    #[error("failed to publish to {routing_key}: {message}")]
    Publish {
        /// Destination routing key
        routing_key: String,
        /// Underlying error text
        message: String,
    },

    /// Connection-level failure
    #[error("broker connection error: {0}")]
    Connection(String),
}

/// Errors returned by the [`ChannelPool`](crate::pool::ChannelPool)
#[derive(Debug, Clone, Error)]
pub enum PoolError {
    /// Caller's deadline fired while waiting for a slot
    #[error("timed out waiting for a broker channel")]
    Timeout,

    /// Pool has been shut down
    #[error("channel pool is closed")]
    Closed,

    /// Creating a fresh channel failed
    #[error(transparent)]
    Broker(#[from] BrokerError),
}

/// Validation failures on inbound commands
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// Account identifier is not a valid UUID
    #[error("account id is not a valid uuid: {0}")]
    InvalidAccountId(String),

    /// Amount violates a business rule
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
}

/// Top-level error surfaced by the ingestion pipeline
#[derive(Debug, Clone, Error)]
pub enum IngestionError {
    /// Command failed validation
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Append to the event log failed (after retries, if transient)
    #[error(transparent)]
    Append(#[from] AppendError),

    /// Projection update failed
    #[error("projection update failed: {0}")]
    Projection(#[from] StoreError),

    /// Broker publish failed
    #[error(transparent)]
    Broker(#[from] BrokerError),

    /// Channel lease failed
    #[error(transparent)]
    Pool(#[from] PoolError),

    /// A remote call exceeded its deadline
    #[error("operation timed out: {0}")]
    Timeout(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl IngestionError {
    /// Transport failure that a caller may retry later
    pub fn is_transient(&self) -> bool {
        match self {
            IngestionError::Append(e) => e.is_transient(),
            IngestionError::Projection(StoreError::Unavailable(_)) => true,
            IngestionError::Pool(PoolError::Timeout) => true,
            IngestionError::Timeout(_) => true,
            _ => false,
        }
    }

    /// Data or validation failure; retrying will not help
    pub fn is_permanent(&self) -> bool {
        !self.is_transient()
    }
}

/// Result type for ingestion operations
pub type IngestionResult<T> = Result<T, IngestionError>;

impl From<serde_json::Error> for IngestionError {
    fn from(err: serde_json::Error) -> Self {
        IngestionError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_error_classification() {
        let transient = AppendError::transient(TransientKind::Unavailable, "connection refused");
        assert!(transient.is_transient());
        assert!(!AppendError::Permanent("bad payload".into()).is_transient());
    }

    #[test]
    fn test_ingestion_error_classification() {
        let err: IngestionError =
            AppendError::transient(TransientKind::DeadlineExceeded, "slow").into();
        assert!(err.is_transient());

        let err: IngestionError = StoreError::Rejected("schema".into()).into();
        assert!(err.is_permanent());

        let err: IngestionError = DomainError::InvalidAccountId("nope".into()).into();
        assert!(err.is_permanent());
    }

    #[test]
    fn test_error_messages() {
        let err = AppendError::transient(TransientKind::ResourceExhausted, "quota");
        assert_eq!(err.to_string(), "event log resource exhausted: quota");

        let err = PoolError::Closed;
        assert_eq!(err.to_string(), "channel pool is closed");
    }
}
