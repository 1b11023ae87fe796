// Copyright (c) 2025 - Cowboy AI, Inc.
//! NATS JetStream key-value document store
//!
//! Stores each projection document as JSON under its flat storage key in a
//! KV bucket. Writes are guarded by the entry revision through the
//! `Nats-Expected-Last-Subject-Sequence` header, so two writers racing on
//! the same document never lose an increment: the loser re-reads and
//! re-checks the applied set. Expected revision 0 means "no entry yet",
//! which makes an insert create-if-absent.
//!
//! # Document size
//!
//! A document keeps every applied event id, so it grows with each distinct
//! event folded into it. The whole document is one KV value and must fit in
//! the server's maximum message size (1 MB by default). Once a busy
//! account's document crosses it, every later apply for that key fails with
//! `StoreError::Rejected` or `StoreError::Unavailable`. Daily-scoped keys
//! stay small; account-scoped keys need `max_payload` raised on the server
//! or a store that can keep the applied set outside the document.

use async_nats::header::NATS_EXPECTED_LAST_SUBJECT_SEQUENCE;
use async_nats::jetstream::{self, context::PublishErrorKind, kv};
use async_nats::HeaderMap;
use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, warn};

use super::{DocumentStore, ProjectionDelta, ProjectionDocument, ProjectionKey};
use crate::errors::StoreError;

/// Bound on compare-and-swap attempts per conditional update
const MAX_CAS_ATTEMPTS: usize = 8;

/// Revision a key has before its first write
const NO_REVISION: u64 = 0;

/// Configuration for the projection bucket
#[derive(Debug, Clone)]
pub struct KvStoreConfig {
    /// Bucket name
    pub bucket: String,
    /// Revisions kept per key
    pub history: i64,
}

impl Default for KvStoreConfig {
    fn default() -> Self {
        Self {
            bucket: "LEDGER_PROJECTIONS".to_string(),
            history: 1,
        }
    }
}

/// Why a revision-guarded write did not land
#[derive(Debug)]
enum WriteFailure {
    /// The key moved past the expected revision
    Conflict,
    /// Anything else; not worth retrying here
    Store(StoreError),
}

/// Map a JetStream ack failure for a guarded write
fn classify_ack(kind: PublishErrorKind, message: String) -> WriteFailure {
    match kind {
        PublishErrorKind::WrongLastSequence => WriteFailure::Conflict,
        PublishErrorKind::TimedOut
        | PublishErrorKind::BrokenPipe
        | PublishErrorKind::StreamNotFound => WriteFailure::Store(StoreError::Unavailable(message)),
        _ => WriteFailure::Store(StoreError::Rejected(message)),
    }
}

/// Document store on a JetStream KV bucket
pub struct KvDocumentStore {
    jetstream: jetstream::Context,
    store: kv::Store,
    bucket: String,
}

impl KvDocumentStore {
    /// Open (or create) the projection bucket
    pub async fn open(
        jetstream: &jetstream::Context,
        config: KvStoreConfig,
    ) -> Result<Self, StoreError> {
        let store = match jetstream.get_key_value(&config.bucket).await {
            Ok(store) => store,
            Err(_) => jetstream
                .create_key_value(kv::Config {
                    bucket: config.bucket.clone(),
                    history: config.history,
                    ..Default::default()
                })
                .await
                .map_err(|e| StoreError::Unavailable(e.to_string()))?,
        };

        Ok(Self {
            jetstream: jetstream.clone(),
            store,
            bucket: config.bucket,
        })
    }

    /// Load a document with its revision; delete markers read as absent
    async fn load(&self, key: &ProjectionKey) -> Result<Option<(ProjectionDocument, u64)>, StoreError> {
        let entry = self
            .store
            .entry(key.storage_key())
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        match entry {
            Some(entry) if matches!(entry.operation, kv::Operation::Put) => {
                let document: ProjectionDocument = serde_json::from_slice(&entry.value)
                    .map_err(|e| StoreError::Encoding(e.to_string()))?;
                Ok(Some((document, entry.revision)))
            }
            _ => Ok(None),
        }
    }

    /// Write `document` only if its key is still at `revision`
    ///
    /// Subject format: $KV.<bucket>.<storage-key>
    async fn write_at(
        &self,
        document: &ProjectionDocument,
        revision: u64,
    ) -> Result<u64, WriteFailure> {
        let subject = format!("$KV.{}.{}", self.bucket, document.key.storage_key());
        let payload = encode(document).map_err(WriteFailure::Store)?;

        let mut headers = HeaderMap::new();
        headers.insert(
            NATS_EXPECTED_LAST_SUBJECT_SEQUENCE,
            revision.to_string().as_str(),
        );

        let ack = self
            .jetstream
            .publish_with_headers(subject, headers, payload)
            .await
            .map_err(|e| WriteFailure::Store(StoreError::Unavailable(e.to_string())))?
            .await
            .map_err(|e| classify_ack(e.kind(), e.to_string()))?;

        Ok(ack.sequence)
    }
}

fn encode(document: &ProjectionDocument) -> Result<Bytes, StoreError> {
    serde_json::to_vec(document)
        .map(Bytes::from)
        .map_err(|e| StoreError::Encoding(e.to_string()))
}

#[async_trait]
impl DocumentStore for KvDocumentStore {
    async fn update_unless_applied(
        &self,
        key: &ProjectionKey,
        dedup_id: &str,
        delta: &ProjectionDelta,
    ) -> Result<u64, StoreError> {
        let storage_key = key.storage_key();

        for attempt in 1..=MAX_CAS_ATTEMPTS {
            let Some((mut document, revision)) = self.load(key).await? else {
                return Ok(0);
            };
            if !document.apply(dedup_id, delta) {
                return Ok(0);
            }

            match self.write_at(&document, revision).await {
                Ok(_) => return Ok(1),
                Err(WriteFailure::Conflict) => {
                    debug!(key = %storage_key, attempt, "Revision conflict, re-reading");
                }
                Err(WriteFailure::Store(error)) => return Err(error),
            }
        }

        warn!(key = %storage_key, "Gave up after {} compare-and-swap attempts", MAX_CAS_ATTEMPTS);
        Err(StoreError::Unavailable(format!(
            "contention on {} exceeded {} attempts",
            storage_key, MAX_CAS_ATTEMPTS
        )))
    }

    async fn count(&self, key: &ProjectionKey) -> Result<u64, StoreError> {
        Ok(u64::from(self.load(key).await?.is_some()))
    }

    async fn insert(&self, document: ProjectionDocument) -> Result<(), StoreError> {
        match self.write_at(&document, NO_REVISION).await {
            Ok(_) => Ok(()),
            Err(WriteFailure::Conflict) => Err(StoreError::Duplicate(document.key.storage_key())),
            Err(WriteFailure::Store(error)) => Err(error),
        }
    }

    async fn find(&self, key: &ProjectionKey) -> Result<Option<ProjectionDocument>, StoreError> {
        Ok(self.load(key).await?.map(|(document, _)| document))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AccountId;
    use crate::projection::ProjectionWriter;
    use crate::subjects::EventKind;
    use rust_decimal::Decimal;
    use std::sync::Arc;
    use std::time::Duration;
    use test_case::test_case;

    #[test_case(PublishErrorKind::WrongLastSequence => "conflict" ; "revision moved")]
    #[test_case(PublishErrorKind::TimedOut => "unavailable" ; "ack timed out")]
    #[test_case(PublishErrorKind::BrokenPipe => "unavailable" ; "connection lost")]
    #[test_case(PublishErrorKind::StreamNotFound => "unavailable" ; "bucket missing")]
    #[test_case(PublishErrorKind::Other => "rejected" ; "server refused")]
    #[test_case(PublishErrorKind::WrongLastMessageId => "rejected" ; "message id mismatch")]
    fn test_classify_ack(kind: PublishErrorKind) -> &'static str {
        match classify_ack(kind, "boom".into()) {
            WriteFailure::Conflict => "conflict",
            WriteFailure::Store(StoreError::Unavailable(_)) => "unavailable",
            WriteFailure::Store(StoreError::Rejected(_)) => "rejected",
            WriteFailure::Store(other) => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_default_config() {
        let config = KvStoreConfig::default();
        assert_eq!(config.bucket, "LEDGER_PROJECTIONS");
        assert_eq!(config.history, 1);
    }

    #[tokio::test]
    #[ignore] // Requires NATS server with JetStream
    async fn test_kv_store_idempotent_apply() -> Result<(), StoreError> {
        let client = async_nats::connect("nats://localhost:4222")
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let jetstream = jetstream::new(client);
        let store = KvDocumentStore::open(&jetstream, KvStoreConfig::default()).await?;
        let writer = ProjectionWriter::new(Arc::new(store), Duration::from_secs(5));

        let key = ProjectionKey::account(EventKind::Balance, AccountId::from(uuid::Uuid::now_v7()));
        let delta = ProjectionDelta {
            debit: Decimal::ZERO,
            credit: Decimal::new(15000, 2),
        };

        assert_eq!(writer.apply(&key, "e1", &delta).await?, 1);
        assert_eq!(writer.apply(&key, "e1", &delta).await?, 0);

        let doc = writer.load(&key).await?.expect("document exists");
        assert_eq!(doc.net(), Decimal::new(15000, 2));

        // A second insert for the same key is a duplicate, not a failure
        let store = KvDocumentStore::open(&jetstream, KvStoreConfig::default()).await?;
        assert!(matches!(store.insert(doc).await, Err(StoreError::Duplicate(_))));
        Ok(())
    }
}
