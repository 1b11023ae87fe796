// Copyright (c) 2025 - Cowboy AI, Inc.
//! Dead-letter notifications
//!
//! A failed command is published to its kind's dead-letter queue as:
//!
//! ```json
//! {
//!   "FailedAt": "2026-01-19T12:00:00.000000000Z",
//!   "Command": { "AccountId": "…", "Amount": "150.00", "OccurredAt": "…" },
//!   "Reason": "projection update failed: …",
//!   "TransactionId": "5f0c…"
//! }
//! ```
//!
//! The identity field is named after the aggregate (`TransactionId`,
//! `ConsolidationId`, `BalanceId`).

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn};
use uuid::Uuid;

use crate::broker::PublishProperties;
use crate::domain::LedgerCommand;
use crate::errors::{IngestionError, IngestionResult};
use crate::pool::ChannelPool;
use crate::subjects::EventKind;

/// A command that could not be ingested
#[derive(Debug, Clone, PartialEq)]
pub struct FailureRecord {
    pub failed_at: DateTime<Utc>,
    pub kind: EventKind,
    pub identity: Uuid,
    pub command: Value,
    pub reason: String,
}

impl FailureRecord {
    /// Record for `command` failing with `reason`, stamped now
    pub fn for_command(command: &LedgerCommand, identity: Uuid, reason: impl Into<String>) -> Self {
        Self {
            failed_at: Utc::now(),
            kind: command.kind(),
            identity,
            command: command.to_json().unwrap_or(Value::Null),
            reason: reason.into(),
        }
    }

    /// Wire payload
    pub fn to_payload(&self) -> Value {
        let mut payload = Map::new();
        payload.insert("FailedAt".into(), Value::String(timestamp(self.failed_at)));
        payload.insert("Command".into(), self.command.clone());
        payload.insert("Reason".into(), Value::String(self.reason.clone()));
        payload.insert(
            self.kind.id_field().into(),
            Value::String(self.identity.to_string()),
        );
        Value::Object(payload)
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Publishes failure records through the channel pool
#[derive(Clone)]
pub struct FailureNotifier {
    pool: Arc<ChannelPool>,
    call_timeout: Duration,
}

impl FailureNotifier {
    pub fn new(pool: Arc<ChannelPool>, call_timeout: Duration) -> Self {
        Self { pool, call_timeout }
    }

    /// Publish `record` to its kind's dead-letter queue
    pub async fn notify(&self, record: &FailureRecord) -> IngestionResult<()> {
        let queue = record.kind.dead_letter_queue();
        error!(
            queue = %queue,
            identity = %record.identity,
            reason = %record.reason,
            "Routing failed command to dead-letter queue"
        );
        self.publish(&queue, &record.to_payload()).await
    }

    /// Publish an arbitrary failure to `dlq`
    ///
    /// Payload: `{"FailedAt", "Reason", "Content"}`
    pub async fn notify_raw(&self, dlq: &str, reason: &str, content: Value) -> IngestionResult<()> {
        let payload = serde_json::json!({
            "FailedAt": timestamp(Utc::now()),
            "Reason": reason,
            "Content": content,
        });
        error!(queue = %dlq, reason = %reason, "Routing failure to dead-letter queue");
        self.publish(dlq, &payload).await
    }

    async fn publish(&self, queue: &str, payload: &Value) -> IngestionResult<()> {
        let body = serde_json::to_vec(payload)?;
        let publish = self
            .pool
            .publish(queue, PublishProperties::persistent(), body.into());

        match tokio::time::timeout(self.call_timeout, publish).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                warn!(queue = %queue, error = %e, "Dead-letter publish failed");
                Err(e)
            }
            Err(_) => {
                warn!(queue = %queue, "Dead-letter publish timed out");
                Err(IngestionError::Timeout(format!("dead-letter publish to {}", queue)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::InMemoryBroker;
    use crate::domain::CreateBalance;
    use crate::pool::PoolConfig;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;

    fn command() -> LedgerCommand {
        CreateBalance {
            account_id: "not-a-uuid".into(),
            debit: Decimal::new(500, 2),
            credit: Decimal::ZERO,
            date: Utc.with_ymd_and_hms(2026, 1, 19, 0, 0, 0).unwrap(),
        }
        .into()
    }

    fn notifier(broker: &InMemoryBroker) -> FailureNotifier {
        let pool = ChannelPool::new(Arc::new(broker.clone()), PoolConfig::default());
        FailureNotifier::new(Arc::new(pool), Duration::from_secs(5))
    }

    #[test]
    fn test_payload_shape() {
        let command = command();
        let identity = command.identity();
        let mut record = FailureRecord::for_command(&command, identity, "invalid account");
        record.failed_at = Utc.with_ymd_and_hms(2026, 1, 19, 12, 0, 0).unwrap();

        let payload = record.to_payload();
        assert_eq!(payload["FailedAt"], "2026-01-19T12:00:00.000000000Z");
        assert_eq!(payload["Reason"], "invalid account");
        assert_eq!(payload["BalanceId"], identity.to_string());
        assert_eq!(payload["Command"]["AccountId"], "not-a-uuid");
        assert!(payload.get("kind").is_none());
    }

    #[tokio::test]
    async fn test_notify_publishes_to_dead_letter_queue() {
        let broker = InMemoryBroker::new();
        let command = command();
        let record = FailureRecord::for_command(&command, command.identity(), "boom");

        notifier(&broker).notify(&record).await.unwrap();

        let messages = broker.published("balance.dlq");
        assert_eq!(messages.len(), 1);
        assert!(messages[0].properties.persistent);
        assert_eq!(messages[0].json().unwrap()["Reason"], "boom");
    }

    #[tokio::test]
    async fn test_notify_raw() {
        let broker = InMemoryBroker::new();

        notifier(&broker)
            .notify_raw("consolidation.dlq", "undecodable", serde_json::json!("garbage"))
            .await
            .unwrap();

        let payload = broker.published("consolidation.dlq")[0].json().unwrap();
        assert_eq!(payload["Reason"], "undecodable");
        assert_eq!(payload["Content"], "garbage");
        assert!(payload["FailedAt"].is_string());
    }

    #[tokio::test]
    async fn test_notify_failure_is_returned() {
        let broker = InMemoryBroker::new();
        broker.fail_publish(true);
        let command = command();
        let record = FailureRecord::for_command(&command, command.identity(), "boom");

        assert!(notifier(&broker).notify(&record).await.is_err());
    }
}
