// Copyright (c) 2025 - Cowboy AI, Inc.

//! Routing names for ledger events
//!
//! Every event kind owns a success queue, a dead-letter queue and a family of
//! event-log streams. All names derive from the kind and never from config,
//! so producers and consumers agree without coordination.
//!
//! # Patterns
//!
//! ```text
//! {kind}.created        success queue
//! {kind}.dlq            dead-letter queue
//! {kind}-{identity}     event-log stream
//! ```
//!
//! # Examples
//!
//! ```rust
//! use ledger_ingest::subjects::{EventKind, Destination, RoutingBuilder};
//!
//! let key = RoutingBuilder::new(EventKind::Transaction)
//!     .destination(Destination::DeadLetter)
//!     .build();
//! assert_eq!(key, "transaction.dlq");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Ledger event kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Individual signed transaction against an account
    Transaction,
    /// Daily consolidation of an account's transactions
    Consolidation,
    /// Running balance derived from consolidations
    Balance,
}

impl EventKind {
    /// All kinds, in pipeline order
    pub const ALL: [EventKind; 3] = [
        EventKind::Transaction,
        EventKind::Consolidation,
        EventKind::Balance,
    ];

    /// Event type name recorded in the event log
    pub fn event_type(&self) -> &'static str {
        match self {
            EventKind::Transaction => "TransactionCreated",
            EventKind::Consolidation => "ConsolidationCreated",
            EventKind::Balance => "BalanceCreated",
        }
    }

    /// Field name carrying the identity in dead-letter payloads
    pub fn id_field(&self) -> &'static str {
        match self {
            EventKind::Transaction => "TransactionId",
            EventKind::Consolidation => "ConsolidationId",
            EventKind::Balance => "BalanceId",
        }
    }

    /// Projection collection for this kind
    pub fn collection(&self) -> &'static str {
        match self {
            EventKind::Transaction => "transactions",
            EventKind::Consolidation => "consolidations",
            EventKind::Balance => "balances",
        }
    }

    /// Event-log stream name for an identity
    pub fn stream_name(&self, identity: Uuid) -> String {
        format!("{}-{}", self, identity)
    }

    /// Success queue
    pub fn created_queue(&self) -> String {
        RoutingBuilder::new(*self)
            .destination(Destination::Created)
            .build()
    }

    /// Dead-letter queue
    pub fn dead_letter_queue(&self) -> String {
        RoutingBuilder::new(*self)
            .destination(Destination::DeadLetter)
            .build()
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Transaction => write!(f, "transaction"),
            EventKind::Consolidation => write!(f, "consolidation"),
            EventKind::Balance => write!(f, "balance"),
        }
    }
}

/// Where a message for a kind is routed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Destination {
    /// Event was recorded and projected
    Created,
    /// Ingestion failed
    DeadLetter,
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Created => write!(f, "created"),
            Destination::DeadLetter => write!(f, "dlq"),
        }
    }
}

/// Builder for broker routing keys
#[derive(Debug, Clone)]
pub struct RoutingBuilder {
    kind: EventKind,
    destination: Destination,
}

impl RoutingBuilder {
    /// Routing builder for a kind; destination defaults to [`Destination::Created`]
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            destination: Destination::Created,
        }
    }

    /// Set the destination
    pub fn destination(mut self, destination: Destination) -> Self {
        self.destination = destination;
        self
    }

    /// Build the routing key
    pub fn build(self) -> String {
        format!("{}.{}", self.kind, self.destination)
    }
}
