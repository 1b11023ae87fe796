// Copyright (c) 2025 - Cowboy AI, Inc.
//! Inbound ledger commands
//!
//! Commands carry the raw input exactly as received. Validation happens when
//! a command is turned into an event, so an invalid command can still be
//! serialized verbatim into a dead-letter record.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{AccountId, SignedAmount};
use crate::errors::DomainError;
use crate::events::{BalanceCreated, ConsolidationCreated, LedgerEvent, TransactionCreated};
use crate::identity::DeterministicId;
use crate::subjects::EventKind;

/// Record a signed transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateTransaction {
    pub account_id: String,
    pub amount: Decimal,
    pub occurred_at: DateTime<Utc>,
}

/// Record a daily consolidation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateConsolidation {
    pub account_id: String,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Record a balance movement from its debit and credit legs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateBalance {
    pub account_id: String,
    pub debit: Decimal,
    pub credit: Decimal,
    pub date: DateTime<Utc>,
}

/// Any inbound ledger command
///
/// JSON form carries a `kind` tag alongside the command's own fields:
///
/// ```json
/// {"kind":"transaction","AccountId":"…","Amount":"150.00","OccurredAt":"2026-01-19T12:00:00Z"}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LedgerCommand {
    Transaction(CreateTransaction),
    Consolidation(CreateConsolidation),
    Balance(CreateBalance),
}

impl LedgerCommand {
    /// Kind of event this command produces
    pub fn kind(&self) -> EventKind {
        match self {
            LedgerCommand::Transaction(_) => EventKind::Transaction,
            LedgerCommand::Consolidation(_) => EventKind::Consolidation,
            LedgerCommand::Balance(_) => EventKind::Balance,
        }
    }

    /// Raw aggregate key as received
    pub fn aggregate_key(&self) -> &str {
        match self {
            LedgerCommand::Transaction(c) => &c.account_id,
            LedgerCommand::Consolidation(c) => &c.account_id,
            LedgerCommand::Balance(c) => &c.account_id,
        }
    }

    /// Business timestamp feeding the identity
    pub fn business_time(&self) -> DateTime<Utc> {
        match self {
            LedgerCommand::Transaction(c) => c.occurred_at,
            LedgerCommand::Consolidation(c) => c.created_at,
            LedgerCommand::Balance(c) => c.date,
        }
    }

    /// Deterministic identity of the event this command produces
    ///
    /// Hashes the canonical account id, so every accepted spelling of one
    /// account maps to one identity. A key that does not parse falls back to
    /// its trimmed raw text, which keeps dead-letter records stable.
    pub fn identity(&self) -> Uuid {
        match AccountId::parse(self.aggregate_key()) {
            Ok(account_id) => {
                DeterministicId::for_key(&account_id.to_string(), self.business_time())
            }
            Err(_) => DeterministicId::for_key(self.aggregate_key().trim(), self.business_time()),
        }
    }

    /// Validate the command and build its event
    pub fn to_event(&self, event_id: Uuid) -> Result<LedgerEvent, DomainError> {
        let account_id = AccountId::parse(self.aggregate_key())?;

        Ok(match self {
            LedgerCommand::Transaction(c) => {
                let amount = SignedAmount::non_zero(c.amount)?;
                LedgerEvent::TransactionCreated(TransactionCreated {
                    event_id,
                    account_id,
                    amount: amount.value(),
                    occurred_at: c.occurred_at,
                })
            }
            LedgerCommand::Consolidation(c) => {
                let amount = SignedAmount::new(c.amount);
                LedgerEvent::ConsolidationCreated(ConsolidationCreated {
                    event_id,
                    account_id,
                    credit: amount.credit(),
                    debit: amount.debit(),
                    date: c.created_at,
                })
            }
            LedgerCommand::Balance(c) => {
                let amount = SignedAmount::from_legs(c.debit, c.credit)?;
                LedgerEvent::BalanceCreated(BalanceCreated {
                    event_id,
                    account_id,
                    amount: amount.value(),
                    date: c.date,
                })
            }
        })
    }

    /// The command's own shape, without the kind tag
    pub fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            LedgerCommand::Transaction(c) => serde_json::to_value(c),
            LedgerCommand::Consolidation(c) => serde_json::to_value(c),
            LedgerCommand::Balance(c) => serde_json::to_value(c),
        }
    }
}

impl From<CreateTransaction> for LedgerCommand {
    fn from(command: CreateTransaction) -> Self {
        LedgerCommand::Transaction(command)
    }
}

impl From<CreateConsolidation> for LedgerCommand {
    fn from(command: CreateConsolidation) -> Self {
        LedgerCommand::Consolidation(command)
    }
}

impl From<CreateBalance> for LedgerCommand {
    fn from(command: CreateBalance) -> Self {
        LedgerCommand::Balance(command)
    }
}
