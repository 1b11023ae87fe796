//! Idempotent ingestion of ledger events
//!
//! Commands for transactions, daily consolidations and balances are turned
//! into events with a deterministic identity, appended to an append-only
//! log, folded exactly once into projection documents, and announced on the
//! broker. Failures are routed to per-kind dead-letter queues.
//!
//! # Architecture
//!
//! - **Identity**: UUID v5 over aggregate key and business timestamp
//! - **Event log**: JetStream-backed append with bounded retry
//! - **Projections**: documents carrying the set of applied event ids
//! - **Channel pool**: bounded, reusable broker channels
//! - **Pipeline**: sequencing and dead-letter routing
//!
//! # Subject Hierarchy
//!
//! ```text
//! {kind}.created     success notifications
//! {kind}.dlq         failure records
//! ledger.events.>    event log appends
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use ledger_ingest::{
//!     broker::InMemoryBroker,
//!     event_log::InMemoryEventLog,
//!     pool::ChannelPool,
//!     projection::InMemoryDocumentStore,
//!     IngestionConfig, IngestionPipeline, LedgerCommand,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = IngestionConfig::default();
//!     let pool = Arc::new(ChannelPool::new(Arc::new(InMemoryBroker::new()), config.pool.clone()));
//!     let pipeline = IngestionPipeline::new(
//!         Arc::new(InMemoryEventLog::new()),
//!         Arc::new(InMemoryDocumentStore::new()),
//!         pool,
//!         &config,
//!     );
//!
//!     let command: LedgerCommand = serde_json::from_str(
//!         r#"{"kind":"transaction","AccountId":"8f14e45f-ceea-467f-a0e6-2b7d1c4f0a11","Amount":"150.00","OccurredAt":"2026-01-19T12:00:00Z"}"#,
//!     )?;
//!     let outcome = pipeline.ingest(command).await?;
//!     assert_eq!(outcome.applied, 1);
//!
//!     Ok(())
//! }
//! ```

pub mod appender;
pub mod broker;
pub mod config;
pub mod domain;
pub mod errors;
pub mod event_log;
pub mod events;
pub mod identity;
pub mod jetstream;
pub mod notifier;
pub mod pipeline;
pub mod pool;
pub mod projection;
pub mod subjects;

// Re-export commonly used types
pub use config::IngestionConfig;
pub use domain::LedgerCommand;
pub use errors::{IngestionError, IngestionResult};
pub use identity::DeterministicId;
pub use pipeline::{declare_topology, IngestionOutcome, IngestionPipeline};
pub use pool::{ChannelLease, ChannelPool, PoolConfig};
pub use subjects::EventKind;
