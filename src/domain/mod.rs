// Copyright (c) 2025 - Cowboy AI, Inc.
//! Ledger Domain Models
//!
//! Value objects and inbound commands for the three ledger aggregates:
//! transactions, daily consolidations and balances.
//!
//! # Value Objects with Invariants
//!
//! - [`AccountId`] - account identifier, must be a UUID
//! - [`SignedAmount`] - signed decimal split into debit and credit legs
//!
//! # Commands
//!
//! - [`LedgerCommand`] - tagged union over the per-kind commands; each one
//!   knows its aggregate key, business timestamp and how to become an event

pub mod account;
pub mod amount;
pub mod commands;

pub use account::AccountId;
pub use amount::SignedAmount;
pub use commands::{CreateBalance, CreateConsolidation, CreateTransaction, LedgerCommand};
