// Copyright (c) 2025 - Cowboy AI, Inc.
//! Ingestion pipeline
//!
//! Sequences one inbound command through the system:
//!
//! ```text
//! command
//!   │ identity = id(aggregate key, business time)
//!   ▼
//! validate ──────────┐
//!   ▼                │
//! append (retried) ──┤ error
//!   ▼                │
//! apply projection ──┤
//!   ▼                ▼
//! publish created   publish dead letter, return original error
//!   (best effort)
//! ```
//!
//! Re-running the same command is safe: the identity is deterministic and
//! the projection writer skips identities it has already applied.

use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::appender::ResilientAppender;
use crate::broker::{BrokerChannel, PublishProperties};
use crate::config::IngestionConfig;
use crate::domain::LedgerCommand;
use crate::errors::IngestionResult;
use crate::event_log::EventLog;
use crate::events::LedgerEvent;
use crate::notifier::{FailureNotifier, FailureRecord};
use crate::pool::ChannelPool;
use crate::projection::{DocumentStore, ProjectionWriter};
use crate::subjects::EventKind;

/// Result of a successful ingestion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestionOutcome {
    /// Deterministic identity of the event
    pub event_id: Uuid,
    /// Event-log stream the event was appended to
    pub stream_name: String,
    /// 1 when the projection changed, 0 when the event was already applied
    pub applied: u64,
    /// Whether the success notification reached the broker
    pub published: bool,
}

/// Orchestrates append, projection and publication for inbound commands
#[derive(Clone)]
pub struct IngestionPipeline {
    appender: ResilientAppender,
    writer: ProjectionWriter,
    pool: Arc<ChannelPool>,
    notifier: FailureNotifier,
    call_timeout: Duration,
}

impl IngestionPipeline {
    /// Assemble a pipeline from its collaborators
    pub fn new(
        log: Arc<dyn EventLog>,
        store: Arc<dyn DocumentStore>,
        pool: Arc<ChannelPool>,
        config: &IngestionConfig,
    ) -> Self {
        Self {
            appender: ResilientAppender::new(log, config.retry, config.call_timeout),
            writer: ProjectionWriter::new(store, config.call_timeout),
            notifier: FailureNotifier::new(pool.clone(), config.call_timeout),
            pool,
            call_timeout: config.call_timeout,
        }
    }

    /// Ingest one command
    ///
    /// # Errors
    ///
    /// The first failure from validation, append or projection, after the
    /// command has been routed to its dead-letter queue. A failed success
    /// publication is not an error.
    pub async fn ingest(&self, command: LedgerCommand) -> IngestionResult<IngestionOutcome> {
        let kind = command.kind();
        let event_id = command.identity();
        let stream_name = kind.stream_name(event_id);

        match self.record(&command, event_id, &stream_name).await {
            Ok((event, applied)) => {
                let published = self.publish_created(&event).await;
                info!(
                    stream = %stream_name,
                    %event_id,
                    applied,
                    published,
                    "Command ingested"
                );
                Ok(IngestionOutcome {
                    event_id,
                    stream_name,
                    applied,
                    published,
                })
            }
            Err(e) => {
                error!(stream = %stream_name, %event_id, error = %e, "Ingestion failed");
                let record = FailureRecord::for_command(&command, event_id, e.to_string());
                if let Err(notify_error) = self.notifier.notify(&record).await {
                    error!(
                        %event_id,
                        error = %notify_error,
                        "Could not record failure in dead-letter queue"
                    );
                }
                Err(e)
            }
        }
    }

    /// Ingest one command, reporting only the applied count (0 on failure)
    pub async fn ingest_or_zero(&self, command: LedgerCommand) -> u64 {
        self.ingest(command)
            .await
            .map(|outcome| outcome.applied)
            .unwrap_or(0)
    }

    /// Validate, append and project
    async fn record(
        &self,
        command: &LedgerCommand,
        event_id: Uuid,
        stream_name: &str,
    ) -> IngestionResult<(LedgerEvent, u64)> {
        let event = command.to_event(event_id)?;
        let payload = event.payload()?;

        self.appender
            .append(stream_name, event_id, event.kind().event_type(), Bytes::from(payload))
            .await?;

        // The event is durable from here on; a projection failure leaves it
        // to replay.
        let applied = self
            .writer
            .apply(&event.projection_key(), &event_id.to_string(), &event.delta())
            .await?;

        Ok((event, applied))
    }

    /// Best-effort success notification
    async fn publish_created(&self, event: &LedgerEvent) -> bool {
        let queue = event.kind().created_queue();
        let body = match event.payload() {
            Ok(body) => Bytes::from(body),
            Err(e) => {
                warn!(queue = %queue, error = %e, "Could not encode event for publication");
                return false;
            }
        };

        let properties = PublishProperties::persistent().with_message_id(event.event_id());
        let publish = self.pool.publish(&queue, properties, body);

        match tokio::time::timeout(self.call_timeout, publish).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!(queue = %queue, event_id = %event.event_id(), error = %e, "Publish failed");
                false
            }
            Err(_) => {
                warn!(queue = %queue, event_id = %event.event_id(), "Publish timed out");
                false
            }
        }
    }

    /// Projection writer, for reading documents back
    pub fn writer(&self) -> &ProjectionWriter {
        &self.writer
    }
}

/// Declare the created and dead-letter queues of every event kind
pub async fn declare_topology(pool: &ChannelPool) -> IngestionResult<()> {
    let lease = pool.rent().await?;
    let result = declare_queues(&*lease).await;
    lease.release().await;

    result?;
    info!("Declared ledger queues");
    Ok(())
}

async fn declare_queues(channel: &dyn BrokerChannel) -> IngestionResult<()> {
    for kind in EventKind::ALL {
        channel.declare_queue(&kind.created_queue(), true).await?;
        channel.declare_queue(&kind.dead_letter_queue(), true).await?;
    }
    Ok(())
}
