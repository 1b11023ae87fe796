// Copyright (c) 2025 - Cowboy AI, Inc.

//! Read-model projections
//!
//! A projection document aggregates the amounts of every event folded into it
//! and remembers the identity of each one. The identity set is what makes the
//! fold idempotent: an identity already present is never applied again.
//!
//! # Invariants
//!
//! 1. **No double application**: an id in `applied_ids` is never re-applied
//! 2. **Totals match history**: `total_debits`/`total_credits` equal the sums
//!    over exactly the events whose ids are in `applied_ids`
//! 3. **Single writer**: documents are only mutated through [`ProjectionWriter`]
//!
//! # Architecture
//!
//! ```text
//! LedgerEvent ──key, id, delta──> ProjectionWriter ──> DocumentStore
//!                                       │                 (memory | NATS KV)
//!                                       ▼
//!                                 AppliedCount (0 | 1)
//! ```

pub mod kv;
pub mod memory;
pub mod writer;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::domain::{AccountId, SignedAmount};
use crate::errors::StoreError;
use crate::subjects::EventKind;

pub use kv::KvDocumentStore;
pub use memory::InMemoryDocumentStore;
pub use writer::ProjectionWriter;

/// Address of a projection document
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProjectionKey {
    /// Collection the document lives in
    pub kind: EventKind,
    /// Aggregate key
    pub account_id: AccountId,
    /// Calendar date for date-scoped aggregates
    pub date: Option<NaiveDate>,
}

impl ProjectionKey {
    /// Account-scoped key
    pub fn account(kind: EventKind, account_id: AccountId) -> Self {
        Self {
            kind,
            account_id,
            date: None,
        }
    }

    /// Account and date scoped key
    pub fn daily(kind: EventKind, account_id: AccountId, date: NaiveDate) -> Self {
        Self {
            kind,
            account_id,
            date: Some(date),
        }
    }

    /// Flat storage key: `{collection}.{account}[.{yyyymmdd}]`
    pub fn storage_key(&self) -> String {
        match self.date {
            Some(date) => format!(
                "{}.{}.{}",
                self.kind.collection(),
                self.account_id,
                date.format("%Y%m%d")
            ),
            None => format!("{}.{}", self.kind.collection(), self.account_id),
        }
    }
}

impl fmt::Display for ProjectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.storage_key())
    }
}

/// Contribution of one event to a document's totals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProjectionDelta {
    /// Added to `total_debits`
    pub debit: Decimal,
    /// Added to `total_credits`
    pub credit: Decimal,
}

impl ProjectionDelta {
    /// Net effect: `credit - debit`
    pub fn net(&self) -> Decimal {
        self.credit - self.debit
    }
}

impl From<SignedAmount> for ProjectionDelta {
    fn from(amount: SignedAmount) -> Self {
        Self {
            debit: amount.debit(),
            credit: amount.credit(),
        }
    }
}

/// Read-optimized aggregate for one key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionDocument {
    /// Document address
    pub key: ProjectionKey,
    /// Sum of debit legs
    pub total_debits: Decimal,
    /// Sum of credit legs
    pub total_credits: Decimal,
    /// Identities already folded into the totals
    ///
    /// Only grows. See [`KvDocumentStore`](crate::projection::KvDocumentStore)
    /// for the size limit this puts on a stored document.
    pub applied_ids: BTreeSet<String>,
    /// Last successful write
    pub updated_at: DateTime<Utc>,
}

impl ProjectionDocument {
    /// First document for a key, holding a single applied delta
    pub fn new(key: ProjectionKey, dedup_id: &str, delta: &ProjectionDelta) -> Self {
        Self {
            key,
            total_debits: delta.debit,
            total_credits: delta.credit,
            applied_ids: BTreeSet::from([dedup_id.to_string()]),
            updated_at: Utc::now(),
        }
    }

    /// Derived net amount
    pub fn net(&self) -> Decimal {
        self.total_credits - self.total_debits
    }

    /// Whether an identity has been folded in
    pub fn has_applied(&self, dedup_id: &str) -> bool {
        self.applied_ids.contains(dedup_id)
    }

    /// Fold a delta unless its identity is already present
    ///
    /// Returns `true` when the totals changed.
    pub fn apply(&mut self, dedup_id: &str, delta: &ProjectionDelta) -> bool {
        if !self.applied_ids.insert(dedup_id.to_string()) {
            return false;
        }
        self.total_debits += delta.debit;
        self.total_credits += delta.credit;
        self.updated_at = Utc::now();
        true
    }
}

/// Document-store collaborator
///
/// The store must make each single-document operation atomic; nothing here
/// relies on cross-operation transactions.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Conditionally fold a delta into an existing document
    ///
    /// Matches the document at `key` only if `dedup_id` is absent from its
    /// applied set; on match, increments the totals and adds the id.
    ///
    /// # Returns
    ///
    /// Number of documents matched and modified (0 or 1)
    async fn update_unless_applied(
        &self,
        key: &ProjectionKey,
        dedup_id: &str,
        delta: &ProjectionDelta,
    ) -> Result<u64, StoreError>;

    /// Number of documents at `key` (0 or 1)
    async fn count(&self, key: &ProjectionKey) -> Result<u64, StoreError>;

    /// Insert a new document
    ///
    /// # Errors
    ///
    /// - `StoreError::Duplicate` if a document already exists at its key
    async fn insert(&self, document: ProjectionDocument) -> Result<(), StoreError>;

    /// Load the document at `key`
    async fn find(&self, key: &ProjectionKey) -> Result<Option<ProjectionDocument>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn account() -> AccountId {
        AccountId::parse("8f14e45f-ceea-467f-a0e6-2b7d1c4f0a11").unwrap()
    }

    fn delta(debit: &str, credit: &str) -> ProjectionDelta {
        ProjectionDelta {
            debit: Decimal::from_str(debit).unwrap(),
            credit: Decimal::from_str(credit).unwrap(),
        }
    }

    #[test]
    fn test_storage_keys() {
        let key = ProjectionKey::account(EventKind::Balance, account());
        assert_eq!(key.storage_key(), "balances.8f14e45f-ceea-467f-a0e6-2b7d1c4f0a11");

        let key = ProjectionKey::daily(
            EventKind::Consolidation,
            account(),
            NaiveDate::from_ymd_opt(2026, 1, 19).unwrap(),
        );
        assert_eq!(
            key.storage_key(),
            "consolidations.8f14e45f-ceea-467f-a0e6-2b7d1c4f0a11.20260119"
        );
    }

    #[test]
    fn test_apply_is_idempotent() {
        let key = ProjectionKey::account(EventKind::Transaction, account());
        let mut doc = ProjectionDocument::new(key, "e1", &delta("0", "150.00"));

        assert!(!doc.apply("e1", &delta("0", "150.00")));
        assert_eq!(doc.net(), Decimal::from_str("150.00").unwrap());

        assert!(doc.apply("e2", &delta("50.00", "0")));
        assert_eq!(doc.net(), Decimal::from_str("100.00").unwrap());
        assert_eq!(doc.applied_ids.len(), 2);
    }
}
