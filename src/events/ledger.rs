// Copyright (c) 2025 - Cowboy AI, Inc.
//! Ledger event payloads and the tagged union over them

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{AccountId, SignedAmount};
use crate::projection::{ProjectionDelta, ProjectionKey};
use crate::subjects::EventKind;

/// A signed transaction was recorded against an account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TransactionCreated {
    /// Deterministic identity
    pub event_id: Uuid,
    /// Account the transaction belongs to
    pub account_id: AccountId,
    /// Signed amount (negative = debit)
    pub amount: Decimal,
    /// Business timestamp
    pub occurred_at: DateTime<Utc>,
}

/// A day's transactions were consolidated for an account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConsolidationCreated {
    /// Deterministic identity
    pub event_id: Uuid,
    /// Account being consolidated
    pub account_id: AccountId,
    /// Credit leg
    pub credit: Decimal,
    /// Debit leg
    pub debit: Decimal,
    /// Business timestamp; its calendar date scopes the projection
    pub date: DateTime<Utc>,
}

/// A balance movement was recorded for an account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BalanceCreated {
    /// Deterministic identity
    pub event_id: Uuid,
    /// Account whose balance moved
    pub account_id: AccountId,
    /// Net movement (`credit - debit`)
    pub amount: Decimal,
    /// Business timestamp
    pub date: DateTime<Utc>,
}

/// Tagged union over all ledger events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "Kind", content = "Event")]
pub enum LedgerEvent {
    TransactionCreated(TransactionCreated),
    ConsolidationCreated(ConsolidationCreated),
    BalanceCreated(BalanceCreated),
}

impl LedgerEvent {
    /// Kind of this event
    pub fn kind(&self) -> EventKind {
        match self {
            LedgerEvent::TransactionCreated(_) => EventKind::Transaction,
            LedgerEvent::ConsolidationCreated(_) => EventKind::Consolidation,
            LedgerEvent::BalanceCreated(_) => EventKind::Balance,
        }
    }

    /// Deterministic identity
    pub fn event_id(&self) -> Uuid {
        match self {
            LedgerEvent::TransactionCreated(e) => e.event_id,
            LedgerEvent::ConsolidationCreated(e) => e.event_id,
            LedgerEvent::BalanceCreated(e) => e.event_id,
        }
    }

    /// Aggregate key
    pub fn account_id(&self) -> AccountId {
        match self {
            LedgerEvent::TransactionCreated(e) => e.account_id,
            LedgerEvent::ConsolidationCreated(e) => e.account_id,
            LedgerEvent::BalanceCreated(e) => e.account_id,
        }
    }

    /// Business timestamp
    pub fn business_time(&self) -> DateTime<Utc> {
        match self {
            LedgerEvent::TransactionCreated(e) => e.occurred_at,
            LedgerEvent::ConsolidationCreated(e) => e.date,
            LedgerEvent::BalanceCreated(e) => e.date,
        }
    }

    /// Event-log stream this event is appended to
    pub fn stream_name(&self) -> String {
        self.kind().stream_name(self.event_id())
    }

    /// Projection document this event folds into
    pub fn projection_key(&self) -> ProjectionKey {
        match self {
            LedgerEvent::TransactionCreated(e) => {
                ProjectionKey::account(EventKind::Transaction, e.account_id)
            }
            LedgerEvent::ConsolidationCreated(e) => {
                ProjectionKey::daily(EventKind::Consolidation, e.account_id, e.date.date_naive())
            }
            LedgerEvent::BalanceCreated(e) => ProjectionKey::account(EventKind::Balance, e.account_id),
        }
    }

    /// Contribution of this event to its projection's totals
    pub fn delta(&self) -> ProjectionDelta {
        match self {
            LedgerEvent::TransactionCreated(e) => SignedAmount::new(e.amount).into(),
            LedgerEvent::ConsolidationCreated(e) => ProjectionDelta {
                debit: e.debit,
                credit: e.credit,
            },
            LedgerEvent::BalanceCreated(e) => SignedAmount::new(e.amount).into(),
        }
    }

    /// Kind-specific JSON body (the untagged payload)
    pub fn payload(&self) -> Result<Vec<u8>, serde_json::Error> {
        match self {
            LedgerEvent::TransactionCreated(e) => serde_json::to_vec(e),
            LedgerEvent::ConsolidationCreated(e) => serde_json::to_vec(e),
            LedgerEvent::BalanceCreated(e) => serde_json::to_vec(e),
        }
    }

    /// Decode a kind-specific payload
    pub fn decode(kind: EventKind, payload: &[u8]) -> Result<Self, serde_json::Error> {
        Ok(match kind {
            EventKind::Transaction => LedgerEvent::TransactionCreated(serde_json::from_slice(payload)?),
            EventKind::Consolidation => {
                LedgerEvent::ConsolidationCreated(serde_json::from_slice(payload)?)
            }
            EventKind::Balance => LedgerEvent::BalanceCreated(serde_json::from_slice(payload)?),
        })
    }
}
