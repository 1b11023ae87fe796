// Copyright (c) 2025 - Cowboy AI, Inc.
//! Append-only event log
//!
//! Interface to the external log service that durably records ledger events.
//!
//! # Append Semantics
//!
//! 1. **Append-only**: events are never updated or deleted
//! 2. **Implicit streams**: a stream is created by its first append
//! 3. **No version check**: appends use [`ExpectedState::Any`]; the log does
//!    not enforce optimistic concurrency here
//! 4. **Stable ids**: every event carries its deterministic identity, so
//!    repeated appends of the same logical event are recognisable downstream
//!
//! # Example
//!
//! ```rust,no_run
//! use ledger_ingest::event_log::{EventData, EventLog, ExpectedState, InMemoryEventLog};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let log = InMemoryEventLog::new();
//! let event = EventData::new(uuid::Uuid::now_v7(), "TransactionCreated", b"{}".to_vec());
//! log.append_to_stream("transaction-1", ExpectedState::Any, vec![event]).await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use bytes::Bytes;
use uuid::Uuid;

use crate::errors::AppendError;

pub mod memory;
pub mod nats;

pub use memory::InMemoryEventLog;
pub use nats::JetStreamEventLog;

/// Stream state the caller expects before appending
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExpectedState {
    /// Append regardless of the stream's current version
    #[default]
    Any,
}

/// One event as handed to the log service
#[derive(Debug, Clone, PartialEq)]
pub struct EventData {
    /// Unique event id (the deterministic identity)
    pub id: Uuid,
    /// Event type name
    pub kind: String,
    /// Serialized event body
    pub payload: Bytes,
}

impl EventData {
    /// Create event data
    pub fn new(id: Uuid, kind: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            id,
            kind: kind.into(),
            payload: payload.into(),
        }
    }
}

/// Log-service collaborator
#[async_trait]
pub trait EventLog: Send + Sync {
    /// Append events to a named stream
    ///
    /// # Returns
    ///
    /// Log position of the last appended event
    ///
    /// # Errors
    ///
    /// - `AppendError::Transient` for unavailable, exhausted or timed-out
    ///   transport
    /// - `AppendError::Permanent` for anything retrying will not fix
    async fn append_to_stream(
        &self,
        stream_name: &str,
        expected: ExpectedState,
        events: Vec<EventData>,
    ) -> Result<u64, AppendError>;
}
