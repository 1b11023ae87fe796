// Copyright (c) 2025 - Cowboy AI, Inc.
//! NATS JetStream event log
//!
//! Implements [`EventLog`] on a JetStream stream. Each logical stream maps to
//! a subject under the log's prefix; the deterministic identity travels as
//! the `Nats-Msg-Id` header so the server also drops duplicates inside its
//! dedup window.

use async_nats::jetstream::{
    self,
    context::{PublishError, PublishErrorKind},
};
use async_nats::HeaderMap;
use async_trait::async_trait;
use tracing::debug;

use super::{EventData, EventLog, ExpectedState};
use crate::errors::{AppendError, IngestionResult, TransientKind};
use crate::jetstream::{ensure_stream, JetStreamConfig, EVENT_LOG_SUBJECT_PREFIX};

/// Header carrying the event type name
pub const EVENT_TYPE_HEADER: &str = "Ledger-Event-Type";

/// Header the server uses for duplicate detection
pub const MESSAGE_ID_HEADER: &str = "Nats-Msg-Id";

/// JetStream-backed event log
///
/// # Example
///
/// ```rust,no_run
/// use ledger_ingest::event_log::JetStreamEventLog;
/// use ledger_ingest::jetstream::JetStreamConfig;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = async_nats::connect("nats://localhost:4222").await?;
///     let log = JetStreamEventLog::open(
///         async_nats::jetstream::new(client),
///         JetStreamConfig::event_log(),
///     )
///     .await?;
///     Ok(())
/// }
/// ```
pub struct JetStreamEventLog {
    jetstream: jetstream::Context,
    subject_prefix: String,
}

impl JetStreamEventLog {
    /// Ensure the log stream exists and return a handle to it
    pub async fn open(
        jetstream: jetstream::Context,
        config: JetStreamConfig,
    ) -> IngestionResult<Self> {
        ensure_stream(&jetstream, &config).await?;

        Ok(Self {
            jetstream,
            subject_prefix: EVENT_LOG_SUBJECT_PREFIX.to_string(),
        })
    }

    /// Subject for a logical stream
    ///
    /// Format: ledger.events.<stream-name>
    fn build_subject(&self, stream_name: &str) -> String {
        format!("{}.{}", self.subject_prefix, stream_name)
    }
}

/// Map a JetStream publish failure onto the retry taxonomy
fn classify(error: PublishError) -> AppendError {
    match error.kind() {
        PublishErrorKind::TimedOut => {
            AppendError::transient(TransientKind::DeadlineExceeded, error.to_string())
        }
        PublishErrorKind::StreamNotFound
        | PublishErrorKind::WrongLastMessageId
        | PublishErrorKind::WrongLastSequence => AppendError::Permanent(error.to_string()),
        _ => AppendError::transient(TransientKind::Unavailable, error.to_string()),
    }
}

#[async_trait]
impl EventLog for JetStreamEventLog {
    async fn append_to_stream(
        &self,
        stream_name: &str,
        _expected: ExpectedState,
        events: Vec<EventData>,
    ) -> Result<u64, AppendError> {
        let subject = self.build_subject(stream_name);
        let mut position = 0;

        for event in events {
            let mut headers = HeaderMap::new();
            headers.insert(MESSAGE_ID_HEADER, event.id.to_string().as_str());
            headers.insert(EVENT_TYPE_HEADER, event.kind.as_str());

            let ack = self
                .jetstream
                .publish_with_headers(subject.clone(), headers, event.payload)
                .await
                .map_err(classify)?
                .await
                .map_err(classify)?;

            if ack.duplicate {
                debug!(stream = %stream_name, event_id = %event.id, "Server dropped duplicate append");
            }
            position = ack.sequence;
        }

        Ok(position)
    }
}
