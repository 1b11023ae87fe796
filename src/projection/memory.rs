// Copyright (c) 2025 - Cowboy AI, Inc.
//! In-memory document store
//!
//! Single-process [`DocumentStore`] with per-operation atomicity under one
//! lock. Useful for tests and embedding; supports fault injection so callers
//! can exercise the pipeline's failure routing.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use super::{DocumentStore, ProjectionDelta, ProjectionDocument, ProjectionKey};
use crate::errors::StoreError;

/// Document store backed by a map
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    documents: Mutex<BTreeMap<ProjectionKey, ProjectionDocument>>,
    failure: Mutex<Option<StoreError>>,
    updates: AtomicU64,
    inserts: AtomicU64,
}

impl InMemoryDocumentStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every subsequent operation with `error`
    pub fn fail_with(&self, error: StoreError) {
        *self.lock_failure() = Some(error);
    }

    /// Stop injecting failures
    pub fn heal(&self) {
        *self.lock_failure() = None;
    }

    /// Number of conditional updates attempted
    pub fn update_calls(&self) -> u64 {
        self.updates.load(Ordering::SeqCst)
    }

    /// Number of inserts attempted
    pub fn insert_calls(&self) -> u64 {
        self.inserts.load(Ordering::SeqCst)
    }

    /// Snapshot of every stored document
    pub fn documents(&self) -> Vec<ProjectionDocument> {
        self.lock_documents().values().cloned().collect()
    }

    fn check_failure(&self) -> Result<(), StoreError> {
        match self.lock_failure().as_ref() {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn lock_documents(&self) -> std::sync::MutexGuard<'_, BTreeMap<ProjectionKey, ProjectionDocument>> {
        self.documents.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_failure(&self) -> std::sync::MutexGuard<'_, Option<StoreError>> {
        self.failure.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn update_unless_applied(
        &self,
        key: &ProjectionKey,
        dedup_id: &str,
        delta: &ProjectionDelta,
    ) -> Result<u64, StoreError> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;

        let mut documents = self.lock_documents();
        let applied = documents
            .get_mut(key)
            .map(|doc| doc.apply(dedup_id, delta))
            .unwrap_or(false);
        Ok(u64::from(applied))
    }

    async fn count(&self, key: &ProjectionKey) -> Result<u64, StoreError> {
        self.check_failure()?;
        Ok(u64::from(self.lock_documents().contains_key(key)))
    }

    async fn insert(&self, document: ProjectionDocument) -> Result<(), StoreError> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;

        let mut documents = self.lock_documents();
        if documents.contains_key(&document.key) {
            return Err(StoreError::Duplicate(document.key.storage_key()));
        }
        documents.insert(document.key.clone(), document);
        Ok(())
    }

    async fn find(&self, key: &ProjectionKey) -> Result<Option<ProjectionDocument>, StoreError> {
        self.check_failure()?;
        Ok(self.lock_documents().get(key).cloned())
    }
}
