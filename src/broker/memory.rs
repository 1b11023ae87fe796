// Copyright (c) 2025 - Cowboy AI, Inc.
//! In-memory broker
//!
//! Records every published message per routing key and lets tests inject the
//! failures a real broker produces: refused channel creation, failed
//! publishes, and channels closed from the remote side.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use super::{BrokerChannel, BrokerConnection, PublishProperties};
use crate::errors::BrokerError;

/// A message captured by the in-memory broker
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedMessage {
    pub exchange: String,
    pub routing_key: String,
    pub properties: PublishProperties,
    pub body: Bytes,
}

impl PublishedMessage {
    /// Body decoded as JSON
    pub fn json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

#[derive(Default)]
struct BrokerState {
    published: Mutex<Vec<PublishedMessage>>,
    queues: Mutex<BTreeMap<String, bool>>,
    channels: Mutex<Vec<Weak<AtomicBool>>>,
    opened: AtomicU64,
    closed_channels: AtomicU64,
    fail_open: AtomicBool,
    fail_publish: AtomicBool,
    connection_closed: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Broker connection that keeps everything in memory
///
/// Clones share state, so a test can hand one clone to the pool and inspect
/// traffic through another.
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    state: Arc<BrokerState>,
}

impl InMemoryBroker {
    /// Create an empty broker
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages published to `routing_key`, oldest first
    pub fn published(&self, routing_key: &str) -> Vec<PublishedMessage> {
        lock(&self.state.published)
            .iter()
            .filter(|m| m.routing_key == routing_key)
            .cloned()
            .collect()
    }

    /// Total number of published messages
    pub fn published_count(&self) -> usize {
        lock(&self.state.published).len()
    }

    /// Declared queues and their durability
    pub fn declared_queues(&self) -> BTreeMap<String, bool> {
        lock(&self.state.queues).clone()
    }

    /// Number of channels opened so far
    pub fn channels_opened(&self) -> u64 {
        self.state.opened.load(Ordering::SeqCst)
    }

    /// Number of channels closed by their owner
    pub fn channels_closed(&self) -> u64 {
        self.state.closed_channels.load(Ordering::SeqCst)
    }

    /// Refuse (or allow again) channel creation
    pub fn fail_open(&self, fail: bool) {
        self.state.fail_open.store(fail, Ordering::SeqCst);
    }

    /// Fail (or allow again) every publish
    pub fn fail_publish(&self, fail: bool) {
        self.state.fail_publish.store(fail, Ordering::SeqCst);
    }

    /// Close every live channel as the remote side would
    pub fn close_all_channels(&self) {
        let mut channels = lock(&self.state.channels);
        for open in channels.iter().filter_map(Weak::upgrade) {
            open.store(false, Ordering::SeqCst);
        }
        channels.clear();
    }

    /// Whether the connection has been closed
    pub fn is_closed(&self) -> bool {
        self.state.connection_closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrokerConnection for InMemoryBroker {
    async fn open_channel(&self) -> Result<Box<dyn BrokerChannel>, BrokerError> {
        if self.is_closed() {
            return Err(BrokerError::Connection("connection closed".into()));
        }
        if self.state.fail_open.load(Ordering::SeqCst) {
            return Err(BrokerError::ChannelOpen("injected failure".into()));
        }

        let open = Arc::new(AtomicBool::new(true));
        {
            let mut channels = lock(&self.state.channels);
            channels.retain(|c| c.strong_count() > 0);
            channels.push(Arc::downgrade(&open));
        }
        self.state.opened.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(MemoryChannel {
            open,
            state: self.state.clone(),
        }))
    }

    async fn close(&self) {
        self.state.connection_closed.store(true, Ordering::SeqCst);
    }
}

struct MemoryChannel {
    open: Arc<AtomicBool>,
    state: Arc<BrokerState>,
}

#[async_trait]
impl BrokerChannel for MemoryChannel {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst) && !self.state.connection_closed.load(Ordering::SeqCst)
    }

    async fn declare_queue(&self, name: &str, durable: bool) -> Result<(), BrokerError> {
        if !self.is_open() {
            return Err(BrokerError::ChannelClosed);
        }
        lock(&self.state.queues).insert(name.to_string(), durable);
        Ok(())
    }

    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        properties: PublishProperties,
        body: Bytes,
    ) -> Result<(), BrokerError> {
        if !self.is_open() {
            return Err(BrokerError::ChannelClosed);
        }
        if self.state.fail_publish.load(Ordering::SeqCst) {
            return Err(BrokerError::Publish {
                routing_key: routing_key.to_string(),
                message: "injected failure".into(),
            });
        }

        lock(&self.state.published).push(PublishedMessage {
            exchange: exchange.to_string(),
            routing_key: routing_key.to_string(),
            properties,
            body,
        });
        Ok(())
    }

    async fn close(&self) {
        if self.open.swap(false, Ordering::SeqCst) {
            self.state.closed_channels.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_is_recorded() {
        let broker = InMemoryBroker::new();
        let channel = broker.open_channel().await.unwrap();

        channel
            .publish("", "transaction.created", PublishProperties::persistent(), Bytes::from_static(b"{}"))
            .await
            .unwrap();

        let messages = broker.published("transaction.created");
        assert_eq!(messages.len(), 1);
        assert!(messages[0].properties.persistent);
        assert!(broker.published("transaction.dlq").is_empty());
    }

    #[tokio::test]
    async fn test_remote_close() {
        let broker = InMemoryBroker::new();
        let channel = broker.open_channel().await.unwrap();
        assert!(channel.is_open());

        broker.close_all_channels();
        assert!(!channel.is_open());

        let result = channel
            .publish("", "balance.created", PublishProperties::default(), Bytes::new())
            .await;
        assert!(matches!(result, Err(BrokerError::ChannelClosed)));
        // Remote close is not counted as an owner close
        assert_eq!(broker.channels_closed(), 0);
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let broker = InMemoryBroker::new();

        broker.fail_open(true);
        assert!(broker.open_channel().await.is_err());
        broker.fail_open(false);

        let channel = broker.open_channel().await.unwrap();
        broker.fail_publish(true);
        let result = channel
            .publish("", "balance.dlq", PublishProperties::persistent(), Bytes::new())
            .await;
        assert!(matches!(result, Err(BrokerError::Publish { .. })));
        assert_eq!(broker.published_count(), 0);
    }

    #[tokio::test]
    async fn test_connection_close_closes_channels() {
        let broker = InMemoryBroker::new();
        let channel = broker.open_channel().await.unwrap();

        broker.close().await;
        assert!(!channel.is_open());
        assert!(broker.open_channel().await.is_err());
    }
}
