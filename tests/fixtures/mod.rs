// Copyright (c) 2025 - Cowboy AI, Inc.
//! Test Fixtures for ledger-ingest
//!
//! Deterministic accounts, timestamps and commands, plus a harness wiring the
//! pipeline to in-memory collaborators.
//!
//! # Design Principles
//! - All test data is deterministic (no `Uuid::now_v7()` or `Utc::now()`)
//! - Collaborators are shared so tests can inject faults and inspect traffic

#![allow(dead_code)]

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;

use ledger_ingest::broker::InMemoryBroker;
use ledger_ingest::domain::{AccountId, CreateBalance, CreateConsolidation, CreateTransaction};
use ledger_ingest::event_log::InMemoryEventLog;
use ledger_ingest::projection::InMemoryDocumentStore;
use ledger_ingest::{ChannelPool, IngestionConfig, IngestionPipeline, LedgerCommand, PoolConfig};

pub const ACCOUNT_1: &str = "01934f4a-1000-7000-8000-000000001000";
pub const ACCOUNT_2: &str = "01934f4a-2000-7000-8000-000000002000";

// Fixed business timestamp (2026-01-19T12:00:00Z)
pub const FIXED_TIMESTAMP: &str = "2026-01-19T12:00:00Z";

pub fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .expect("Invalid timestamp in test fixture")
        .with_timezone(&Utc)
}

pub fn fixed_timestamp() -> DateTime<Utc> {
    parse_timestamp(FIXED_TIMESTAMP)
}

pub fn account(s: &str) -> AccountId {
    AccountId::parse(s).expect("Invalid account in test fixture")
}

pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).expect("Invalid decimal in test fixture")
}

pub fn transaction(account_id: &str, amount: &str) -> LedgerCommand {
    CreateTransaction {
        account_id: account_id.to_string(),
        amount: dec(amount),
        occurred_at: fixed_timestamp(),
    }
    .into()
}

pub fn transaction_at(account_id: &str, amount: &str, at: &str) -> LedgerCommand {
    CreateTransaction {
        account_id: account_id.to_string(),
        amount: dec(amount),
        occurred_at: parse_timestamp(at),
    }
    .into()
}

pub fn consolidation(account_id: &str, amount: &str, at: &str) -> LedgerCommand {
    CreateConsolidation {
        account_id: account_id.to_string(),
        amount: dec(amount),
        created_at: parse_timestamp(at),
    }
    .into()
}

pub fn balance(account_id: &str, debit: &str, credit: &str) -> LedgerCommand {
    CreateBalance {
        account_id: account_id.to_string(),
        debit: dec(debit),
        credit: dec(credit),
        date: fixed_timestamp(),
    }
    .into()
}

/// Pipeline wired to in-memory collaborators
pub struct Harness {
    pub log: Arc<InMemoryEventLog>,
    pub store: Arc<InMemoryDocumentStore>,
    pub broker: InMemoryBroker,
    pub pool: Arc<ChannelPool>,
    pub pipeline: IngestionPipeline,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_pool(PoolConfig::default())
    }

    pub fn with_pool(pool_config: PoolConfig) -> Self {
        let log = Arc::new(InMemoryEventLog::new());
        let store = Arc::new(InMemoryDocumentStore::new());
        let broker = InMemoryBroker::new();
        let pool = Arc::new(ChannelPool::new(Arc::new(broker.clone()), pool_config));
        let pipeline = IngestionPipeline::new(
            log.clone(),
            store.clone(),
            pool.clone(),
            &IngestionConfig::default(),
        );

        Self {
            log,
            store,
            broker,
            pool,
            pipeline,
        }
    }
}
