// Copyright (c) 2025 - Cowboy AI, Inc.
//! Broker abstraction
//!
//! A [`BrokerConnection`] is the single process-scoped link to the message
//! broker; it hands out [`BrokerChannel`]s, which are cheap, independently
//! closable publishing handles. Callers never hold a raw channel: they rent
//! one from the [`ChannelPool`](crate::pool::ChannelPool).

use async_trait::async_trait;
use bytes::Bytes;
use uuid::Uuid;

use crate::errors::BrokerError;

pub mod memory;
pub mod nats;

pub use memory::{InMemoryBroker, PublishedMessage};
pub use nats::{NatsConfig, NatsConnection};

/// Delivery properties attached to a published message
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishProperties {
    /// Message must survive a broker restart
    pub persistent: bool,
    /// Broker-side deduplication id
    pub message_id: Option<String>,
}

impl PublishProperties {
    /// Persistent delivery without a message id
    pub fn persistent() -> Self {
        Self {
            persistent: true,
            message_id: None,
        }
    }

    /// Attach a deduplication id
    pub fn with_message_id(mut self, id: Uuid) -> Self {
        self.message_id = Some(id.to_string());
        self
    }
}

/// Process-scoped broker connection
#[async_trait]
pub trait BrokerConnection: Send + Sync {
    /// Open a fresh channel
    async fn open_channel(&self) -> Result<Box<dyn BrokerChannel>, BrokerError>;

    /// Sever the connection; channels opened from it stop working
    async fn close(&self);
}

/// A publishing handle on a connection
#[async_trait]
pub trait BrokerChannel: Send + Sync {
    /// False once either side has closed the channel
    fn is_open(&self) -> bool;

    /// Declare a queue bound to the routing key `name`
    async fn declare_queue(&self, name: &str, durable: bool) -> Result<(), BrokerError>;

    /// Publish `body` to `routing_key` on `exchange` (empty for the default exchange)
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        properties: PublishProperties,
        body: Bytes,
    ) -> Result<(), BrokerError>;

    /// Close the channel
    async fn close(&self);
}
