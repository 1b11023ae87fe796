// Copyright (c) 2025 - Cowboy AI, Inc.
//! Idempotent projection writer
//!
//! Folds one event's delta into its projection document exactly once.
//!
//! # Algorithm
//!
//! ```text
//! update_unless_applied(key, id, delta)
//!   matched 1 ──────────────────────────────> 1   (applied)
//!   matched 0 ─> count(key)
//!                  > 0 ─────────────────────> 0   (id already applied)
//!                  = 0 ─> insert(new doc)
//!                           ok ─────────────> 1   (first write)
//!                           duplicate ─> update_unless_applied again
//! ```
//!
//! Insert and conditional update are never combined into an upsert: the
//! existence check decides, and a lost insert race against a concurrent
//! first writer falls back to one more conditional update.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::{DocumentStore, ProjectionDelta, ProjectionDocument, ProjectionKey};
use crate::errors::StoreError;

/// Writer enforcing the applied-set invariant
#[derive(Clone)]
pub struct ProjectionWriter {
    store: Arc<dyn DocumentStore>,
    call_timeout: Duration,
}

impl ProjectionWriter {
    /// Create a writer over a document store
    pub fn new(store: Arc<dyn DocumentStore>, call_timeout: Duration) -> Self {
        Self {
            store,
            call_timeout,
        }
    }

    /// Apply `delta` to the document at `key` unless `dedup_id` was applied
    ///
    /// # Returns
    ///
    /// Number of newly applied deltas: 1 for a state change, 0 for a retried
    /// no-op
    ///
    /// # Errors
    ///
    /// Any store failure, or `StoreError::Unavailable` when a call exceeds
    /// the deadline. Timeouts are not retried here.
    pub async fn apply(
        &self,
        key: &ProjectionKey,
        dedup_id: &str,
        delta: &ProjectionDelta,
    ) -> Result<u64, StoreError> {
        let matched = self
            .deadline(self.store.update_unless_applied(key, dedup_id, delta))
            .await?;
        if matched > 0 {
            debug!(key = %key, dedup_id, "Projection updated");
            return Ok(matched);
        }

        let existing = self.deadline(self.store.count(key)).await?;
        if existing > 0 {
            info!(key = %key, dedup_id, "Delta already applied, skipping");
            return Ok(0);
        }

        let document = ProjectionDocument::new(key.clone(), dedup_id, delta);
        match self.deadline(self.store.insert(document)).await {
            Ok(()) => {
                debug!(key = %key, dedup_id, "Projection created");
                Ok(1)
            }
            Err(StoreError::Duplicate(_)) => {
                debug!(key = %key, dedup_id, "Lost first-write race, retrying update");
                self.deadline(self.store.update_unless_applied(key, dedup_id, delta))
                    .await
            }
            Err(e) => Err(e),
        }
    }

    /// Current document at `key`
    pub async fn load(&self, key: &ProjectionKey) -> Result<Option<ProjectionDocument>, StoreError> {
        self.deadline(self.store.find(key)).await
    }

    async fn deadline<T>(
        &self,
        call: impl std::future::Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        tokio::time::timeout(self.call_timeout, call)
            .await
            .map_err(|_| StoreError::Unavailable(format!("timed out after {:?}", self.call_timeout)))?
    }
}
