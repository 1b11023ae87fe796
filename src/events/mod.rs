// Copyright (c) 2025 - Cowboy AI, Inc.
//! Ledger Domain Events
//!
//! Immutable facts produced by ingesting a command. Once appended to the
//! event log an event is never mutated; it is addressed by its stream name
//! and its deterministic identity.
//!
//! # Event Flow
//!
//! ```text
//! Command → identity → Event → EventLog → Projection → Broker
//!                                  ↓ (failure at any step)
//!                             Dead-letter queue
//! ```
//!
//! # Kinds
//!
//! [`LedgerEvent`] is a tagged union over the known kinds. Consumers decode a
//! payload with [`LedgerEvent::decode`], matching on the kind carried by the
//! routing key or event-log type name.

pub mod ledger;

pub use ledger::{BalanceCreated, ConsolidationCreated, LedgerEvent, TransactionCreated};
