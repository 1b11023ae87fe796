// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests for Idempotent Ingestion
//!
//! Re-applying any delivery, any number of times, must leave projections
//! exactly as if each distinct event had been applied once.

use chrono::{Duration, TimeZone, Utc};
use ledger_ingest::domain::CreateTransaction;
use ledger_ingest::projection::{
    InMemoryDocumentStore, ProjectionDelta, ProjectionKey, ProjectionWriter,
};
use ledger_ingest::{DeterministicId, EventKind, LedgerCommand};
use proptest::prelude::*;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::fixtures::{account, Harness, ACCOUNT_1};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

/// Amount in cents, never zero
fn amount_strategy() -> impl Strategy<Value = Decimal> {
    prop_oneof![(-1_000_000i64..-1), (1i64..1_000_000)].prop_map(|cents| Decimal::new(cents, 2))
}

fn key() -> ProjectionKey {
    ProjectionKey::account(EventKind::Transaction, account(ACCOUNT_1))
}

// ============================================================================
// Identity
// ============================================================================

proptest! {
    /// Property: identity is a pure function of (key, timestamp)
    #[test]
    fn prop_identity_is_deterministic(key in "[a-zA-Z0-9-]{1,40}", secs in 0i64..4_000_000_000) {
        let at = Utc.timestamp_opt(secs, 0).unwrap();
        prop_assert_eq!(DeterministicId::for_key(&key, at), DeterministicId::for_key(&key, at));
    }

    /// Property: distinct business times give distinct identities
    #[test]
    fn prop_identity_separates_times(secs in 0i64..4_000_000_000, nanos in 1i64..1_000_000_000) {
        let at = Utc.timestamp_opt(secs, 0).unwrap();
        let later = at + Duration::nanoseconds(nanos);
        prop_assert_ne!(
            DeterministicId::for_key(ACCOUNT_1, at),
            DeterministicId::for_key(ACCOUNT_1, later)
        );
    }
}

// ============================================================================
// Projection writer
// ============================================================================

proptest! {
    /// Property: applying a delivery twice equals applying it once
    #[test]
    fn prop_second_apply_is_noop(amount in amount_strategy()) {
        let rt = runtime();
        rt.block_on(async {
            let writer = ProjectionWriter::new(
                Arc::new(InMemoryDocumentStore::new()),
                std::time::Duration::from_secs(5),
            );
            let delta = ProjectionDelta::from(ledger_ingest::domain::SignedAmount::new(amount));

            let first = writer.apply(&key(), "e1", &delta).await.unwrap();
            let once = writer.load(&key()).await.unwrap().unwrap();
            let second = writer.apply(&key(), "e1", &delta).await.unwrap();
            let twice = writer.load(&key()).await.unwrap().unwrap();

            assert_eq!(first, 1);
            assert_eq!(second, 0);
            assert_eq!(once.total_debits, twice.total_debits);
            assert_eq!(once.total_credits, twice.total_credits);
            assert_eq!(once.applied_ids, twice.applied_ids);
        });
    }

    /// Property: totals depend only on the set of distinct ids delivered
    #[test]
    fn prop_redelivery_never_double_counts(
        deliveries in prop::collection::vec((0usize..8, amount_strategy()), 1..40)
    ) {
        let rt = runtime();
        rt.block_on(async {
            let writer = ProjectionWriter::new(
                Arc::new(InMemoryDocumentStore::new()),
                std::time::Duration::from_secs(5),
            );

            // The first amount seen for an id is the one that sticks
            let mut expected: BTreeMap<usize, Decimal> = BTreeMap::new();
            let mut applied = 0;
            for (id, amount) in &deliveries {
                expected.entry(*id).or_insert(*amount);
                let delta = ProjectionDelta::from(ledger_ingest::domain::SignedAmount::new(*amount));
                applied += writer.apply(&key(), &format!("e{}", id), &delta).await.unwrap();
            }

            let doc = writer.load(&key()).await.unwrap().unwrap();
            assert_eq!(applied as usize, expected.len());
            assert_eq!(doc.applied_ids.len(), expected.len());
            assert_eq!(doc.net(), expected.values().copied().sum::<Decimal>());
        });
    }
}

// ============================================================================
// Pipeline
// ============================================================================

proptest! {
    /// Property: resubmitting a command any number of times applies it once
    #[test]
    fn prop_resubmission_applies_once(amount in amount_strategy(), repeats in 1usize..6) {
        let rt = runtime();
        rt.block_on(async {
            let h = Harness::new();
            let command: LedgerCommand = CreateTransaction {
                account_id: ACCOUNT_1.to_string(),
                amount,
                occurred_at: Utc.with_ymd_and_hms(2026, 1, 19, 12, 0, 0).unwrap(),
            }
            .into();

            let mut applied = 0;
            for _ in 0..repeats {
                applied += h.pipeline.ingest(command.clone()).await.unwrap().applied;
            }

            assert_eq!(applied, 1);
            assert_eq!(h.log.events(&command.kind().stream_name(command.identity())).len(), repeats);
            let doc = h.pipeline.writer().load(&key()).await.unwrap().unwrap();
            assert_eq!(doc.net(), amount);
        });
    }
}
