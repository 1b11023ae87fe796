// Copyright (c) 2025 - Cowboy AI, Inc.
//! Resilient event-log appender
//!
//! Wraps [`EventLog::append_to_stream`] in a bounded retry policy. Only
//! transient transport failures are retried; each attempt runs under its own
//! deadline, and a deadline that fires counts as a transient failure.

use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::errors::{AppendError, TransientKind};
use crate::event_log::{EventData, EventLog, ExpectedState};

/// Linear backoff policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay unit; retry `n` waits `base_delay * n`
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

/// Appender with retry and per-call deadlines
#[derive(Clone)]
pub struct ResilientAppender {
    log: Arc<dyn EventLog>,
    policy: RetryPolicy,
    call_timeout: Duration,
}

impl ResilientAppender {
    pub fn new(log: Arc<dyn EventLog>, policy: RetryPolicy, call_timeout: Duration) -> Self {
        Self {
            log,
            policy,
            call_timeout,
        }
    }

    /// Append one event under its deterministic identity
    ///
    /// # Returns
    ///
    /// Log position of the appended event
    ///
    /// # Errors
    ///
    /// The last transient error once retries are exhausted, or the first
    /// permanent error unchanged.
    pub async fn append(
        &self,
        stream_name: &str,
        event_id: Uuid,
        event_kind: &str,
        payload: Bytes,
    ) -> Result<u64, AppendError> {
        let mut attempt = 0;

        loop {
            match self.attempt(stream_name, event_id, event_kind, payload.clone()).await {
                Ok(position) => {
                    debug!(stream = %stream_name, %event_id, position, "Event appended");
                    return Ok(position);
                }
                Err(e) if e.is_transient() && attempt < self.policy.max_retries => {
                    attempt += 1;
                    let delay = self.policy.delay_for_attempt(attempt);
                    warn!(
                        stream = %stream_name,
                        %event_id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient append failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn attempt(
        &self,
        stream_name: &str,
        event_id: Uuid,
        event_kind: &str,
        payload: Bytes,
    ) -> Result<u64, AppendError> {
        let events = vec![EventData::new(event_id, event_kind, payload)];
        let call = self
            .log
            .append_to_stream(stream_name, ExpectedState::Any, events);

        match tokio::time::timeout(self.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(AppendError::transient(
                TransientKind::DeadlineExceeded,
                format!("append timed out after {:?}", self.call_timeout),
            )),
        }
    }

    /// Retry policy in effect
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }
}
