// Copyright (c) 2025 - Cowboy AI, Inc.

//! JetStream stream configuration shared by the event log and the broker
//!
//! Both the append-only event log and the durable broker queues are
//! JetStream streams; this module owns their configuration and idempotent
//! creation.
//!
//! # Example
//!
//! ```rust,no_run
//! use ledger_ingest::jetstream::{ensure_stream, JetStreamConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = async_nats::connect("nats://localhost:4222").await?;
//!     let jetstream = async_nats::jetstream::new(client);
//!
//!     let stream = ensure_stream(&jetstream, &JetStreamConfig::event_log()).await?;
//!
//!     Ok(())
//! }
//! ```

use async_nats::jetstream::{self, stream::Stream};
use std::time::Duration;

use crate::errors::{IngestionError, IngestionResult};

/// Configuration for a JetStream stream
#[derive(Debug, Clone)]
pub struct JetStreamConfig {
    /// Stream name
    pub stream_name: String,

    /// Subjects this stream captures
    pub subjects: Vec<String>,

    /// Maximum age of messages (zero = unlimited)
    pub max_age: Duration,

    /// Window in which repeated message ids are dropped by the server
    pub duplicate_window: Duration,

    /// Storage type
    pub storage: StorageType,

    /// Number of replicas (for clustered NATS)
    pub replicas: usize,
}

impl JetStreamConfig {
    /// The append-only ledger event log
    pub fn event_log() -> Self {
        Self {
            stream_name: "LEDGER_EVENTS".to_string(),
            subjects: vec![format!("{}.>", EVENT_LOG_SUBJECT_PREFIX)],
            max_age: Duration::ZERO,
            duplicate_window: Duration::from_secs(2 * 60),
            storage: StorageType::File,
            replicas: 1,
        }
    }

    /// A broker queue capturing a single routing key
    pub fn queue(name: &str, durable: bool) -> Self {
        Self {
            stream_name: queue_stream_name(name),
            subjects: vec![name.to_string()],
            max_age: Duration::from_secs(30 * 24 * 60 * 60), // 30 days
            duplicate_window: Duration::from_secs(2 * 60),
            storage: if durable {
                StorageType::File
            } else {
                StorageType::Memory
            },
            replicas: 1,
        }
    }
}

impl Default for JetStreamConfig {
    fn default() -> Self {
        Self::event_log()
    }
}

/// Subject prefix for event-log appends
pub const EVENT_LOG_SUBJECT_PREFIX: &str = "ledger.events";

/// Storage type for JetStream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageType {
    /// File-based storage (persistent across restarts)
    File,
    /// Memory-based storage (faster, but lost on restart)
    Memory,
}

/// Stream name for a queue: dots are not allowed in stream names
pub fn queue_stream_name(queue: &str) -> String {
    format!("Q_{}", queue.replace(['.', '>', '*', ' '], "_").to_uppercase())
}

/// Create the stream if it does not exist, otherwise return it
pub async fn ensure_stream(
    jetstream: &jetstream::Context,
    config: &JetStreamConfig,
) -> IngestionResult<Stream> {
    let storage = match config.storage {
        StorageType::File => jetstream::stream::StorageType::File,
        StorageType::Memory => jetstream::stream::StorageType::Memory,
    };

    let stream_config = jetstream::stream::Config {
        name: config.stream_name.clone(),
        subjects: config.subjects.clone(),
        max_age: config.max_age,
        duplicate_window: config.duplicate_window,
        storage,
        num_replicas: config.replicas,
        ..Default::default()
    };

    jetstream
        .get_or_create_stream(stream_config)
        .await
        .map_err(|e| IngestionError::Configuration(e.to_string()))
}
