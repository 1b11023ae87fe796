// Copyright (c) 2025 - Cowboy AI, Inc.
//! Ledger Ingest Service
//!
//! Reads ledger commands as JSON lines from stdin and ingests each one
//! concurrently:
//! - Command → identity → JetStream event log → KV projection → `{kind}.created`
//! - Any failure → `{kind}.dlq`
//!
//! Run with: `cargo run --bin ledger-ingest < commands.jsonl`
//!
//! Each line looks like:
//!
//! ```json
//! {"kind":"transaction","AccountId":"…","Amount":"150.00","OccurredAt":"2026-01-19T12:00:00Z"}
//! ```
//!
//! Prerequisites:
//! 1. NATS server with JetStream running (default: localhost:4222)
//! 2. Optional overrides via environment (see `IngestionConfig`)

use anyhow::{Context, Result};
use async_nats::jetstream;
use ledger_ingest::{
    broker::NatsConnection,
    declare_topology,
    event_log::JetStreamEventLog,
    notifier::FailureNotifier,
    projection::KvDocumentStore,
    ChannelPool, EventKind, IngestionConfig, IngestionOutcome, IngestionPipeline, IngestionResult,
    LedgerCommand,
};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::{JoinError, JoinSet};
use tracing::{error, info, warn};

/// Running totals for the session
#[derive(Debug, Default)]
struct Stats {
    applied: u64,
    duplicates: u64,
    failed: u64,
    rejected_lines: u64,
}

impl Stats {
    fn record(&mut self, result: Result<IngestionResult<IngestionOutcome>, JoinError>) {
        match result {
            Ok(Ok(outcome)) if outcome.applied > 0 => self.applied += 1,
            Ok(Ok(_)) => self.duplicates += 1,
            Ok(Err(_)) => self.failed += 1,
            Err(e) => {
                self.failed += 1;
                error!("❌ Ingestion task aborted: {}", e);
            }
        }
    }
}

/// Wait for finished tasks until fewer than `limit` are in flight
///
/// Keeps parsed commands from piling up in memory while they queue on the
/// channel pool.
async fn make_room<T: 'static>(
    tasks: &mut JoinSet<T>,
    limit: usize,
    mut on_done: impl FnMut(Result<T, JoinError>),
) {
    while tasks.len() >= limit.max(1) {
        match tasks.join_next().await {
            Some(result) => on_done(result),
            None => break,
        }
    }
}

/// Route an undecodable line to its kind's dead-letter queue when the kind
/// can be recovered
async fn reject_line(notifier: &FailureNotifier, line: &str, reason: &str) {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(line) else {
        error!("❌ Dropping line that is not JSON: {}", reason);
        return;
    };
    let Ok(kind) = serde_json::from_value::<EventKind>(value["kind"].clone()) else {
        error!("❌ Dropping command without a known kind: {}", reason);
        return;
    };

    if let Err(e) = notifier
        .notify_raw(&kind.dead_letter_queue(), reason, value)
        .await
    {
        error!("⚠️ Failed to dead-letter rejected line: {}", e);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("🚀 Starting Ledger Ingest Service");

    // Load configuration
    let config = IngestionConfig::from_env().context("Failed to load configuration")?;
    info!("📋 Configuration loaded:");
    info!("  - NATS servers: {:?}", config.nats.servers);
    info!("  - Event stream: {}", config.event_log.stream_name);
    info!("  - Projection bucket: {}", config.projections.bucket);
    info!("  - Pool size: {}", config.pool.max_channels);

    // Connect to NATS
    let connection = NatsConnection::connect(&config.nats)
        .await
        .context("Failed to connect to NATS")?;
    let jetstream = jetstream::new(connection.client().clone());
    info!("✅ Connected to NATS");

    let log = JetStreamEventLog::open(jetstream.clone(), config.event_log.clone())
        .await
        .context("Failed to open event log")?;
    let store = KvDocumentStore::open(&jetstream, config.projections.clone())
        .await
        .context("Failed to open projection bucket")?;

    let pool = Arc::new(ChannelPool::new(Arc::new(connection), config.pool.clone()));
    declare_topology(&pool)
        .await
        .context("Failed to declare queues")?;

    let pipeline = IngestionPipeline::new(Arc::new(log), Arc::new(store), pool.clone(), &config);
    let notifier = FailureNotifier::new(pool.clone(), config.call_timeout);

    info!("🎧 Reading commands from stdin...");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut tasks = JoinSet::new();
    let mut stats = Stats::default();

    let interrupted = tokio::signal::ctrl_c();
    tokio::pin!(interrupted);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    info!("📭 End of input");
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }

                match serde_json::from_str::<LedgerCommand>(&line) {
                    Ok(command) => {
                        make_room(&mut tasks, config.pool.max_channels, |result| stats.record(result)).await;
                        let pipeline = pipeline.clone();
                        tasks.spawn(async move { pipeline.ingest(command).await });
                    }
                    Err(e) => {
                        stats.rejected_lines += 1;
                        reject_line(&notifier, &line, &e.to_string()).await;
                    }
                }
            }
            Some(result) = tasks.join_next(), if !tasks.is_empty() => {
                stats.record(result);
            }
            _ = &mut interrupted => {
                warn!("⚠️ Interrupted, finishing in-flight commands");
                break;
            }
        }
    }

    while let Some(result) = tasks.join_next().await {
        stats.record(result);
    }

    pool.shutdown().await;

    info!(
        "📊 Statistics: {} applied, {} duplicates, {} failed, {} rejected lines",
        stats.applied, stats.duplicates, stats.failed, stats.rejected_lines
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_make_room_bounds_in_flight_tasks() {
        let mut tasks = JoinSet::new();
        let mut finished = 0;

        for i in 0..10u64 {
            make_room(&mut tasks, 3, |result| {
                result.unwrap();
                finished += 1;
            })
            .await;
            tasks.spawn(async move {
                tokio::time::sleep(Duration::from_millis(10 * (i + 1))).await;
            });
            assert!(tasks.len() <= 3);
        }

        assert_eq!(finished, 7);
        while tasks.join_next().await.is_some() {
            finished += 1;
        }
        assert_eq!(finished, 10);
    }

    #[tokio::test]
    async fn test_make_room_returns_at_once_below_limit() {
        let mut tasks: JoinSet<()> = JoinSet::new();
        tasks.spawn(std::future::pending());

        make_room(&mut tasks, 2, |_| panic!("nothing should finish")).await;
        assert_eq!(tasks.len(), 1);
        tasks.abort_all();
    }
}
