// Copyright (c) 2025 - Cowboy AI, Inc.
//! In-memory event log with scripted failures

use async_trait::async_trait;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use super::{EventData, EventLog, ExpectedState};
use crate::errors::AppendError;

#[derive(Debug, Default)]
struct LogState {
    streams: BTreeMap<String, Vec<EventData>>,
    position: u64,
    scripted: VecDeque<AppendError>,
    always: Option<AppendError>,
}

/// Event log held in memory
///
/// Failures are consumed in order: scripted one-shot failures first, then the
/// permanent failure if one is set, then success.
#[derive(Debug, Default)]
pub struct InMemoryEventLog {
    state: Mutex<LogState>,
    calls: AtomicU64,
}

impl InMemoryEventLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `times` appends with `error`
    pub fn fail_next(&self, times: usize, error: AppendError) {
        let mut state = self.lock();
        state.scripted.extend(std::iter::repeat(error).take(times));
    }

    /// Fail every append with `error` until [`heal`](Self::heal)
    pub fn fail_always(&self, error: AppendError) {
        self.lock().always = Some(error);
    }

    /// Clear all injected failures
    pub fn heal(&self) {
        let mut state = self.lock();
        state.scripted.clear();
        state.always = None;
    }

    /// Number of append calls received, including failed ones
    pub fn append_calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Events recorded on a stream, in append order
    pub fn events(&self, stream_name: &str) -> Vec<EventData> {
        self.lock().streams.get(stream_name).cloned().unwrap_or_default()
    }

    /// Names of every stream with at least one event
    pub fn stream_names(&self) -> Vec<String> {
        self.lock().streams.keys().cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, LogState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl EventLog for InMemoryEventLog {
    async fn append_to_stream(
        &self,
        stream_name: &str,
        _expected: ExpectedState,
        events: Vec<EventData>,
    ) -> Result<u64, AppendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let mut state = self.lock();
        if let Some(error) = state.scripted.pop_front() {
            return Err(error);
        }
        if let Some(error) = state.always.clone() {
            return Err(error);
        }

        state.position += events.len() as u64;
        let position = state.position;
        state
            .streams
            .entry(stream_name.to_string())
            .or_default()
            .extend(events);

        Ok(position)
    }
}
