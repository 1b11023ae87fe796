// Copyright (c) 2025 - Cowboy AI, Inc.
//! NATS broker connection
//!
//! One `async_nats::Client` per process. Channels are JetStream contexts on
//! that client: declaring a queue creates a stream capturing its routing key,
//! and persistent publishes wait for the JetStream ack.

use async_nats::connection::State;
use async_nats::{jetstream, Client, ConnectOptions, HeaderMap};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{BrokerChannel, BrokerConnection, PublishProperties};
use crate::errors::BrokerError;
use crate::jetstream::{ensure_stream, JetStreamConfig};

/// Configuration for NATS connection
#[derive(Debug, Clone)]
pub struct NatsConfig {
    /// NATS server URLs
    pub servers: Vec<String>,
    /// Client name
    pub name: String,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Request timeout
    pub request_timeout: Duration,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            servers: vec!["nats://localhost:4222".to_string()],
            name: "ledger-ingest".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(5),
        }
    }
}

/// Process-scoped NATS connection
pub struct NatsConnection {
    client: Client,
    closed: Arc<AtomicBool>,
}

impl NatsConnection {
    /// Connect with the given configuration
    pub async fn connect(config: &NatsConfig) -> Result<Self, BrokerError> {
        let connect_options = ConnectOptions::new()
            .name(&config.name)
            .connection_timeout(config.connect_timeout)
            .request_timeout(Some(config.request_timeout));

        let client = async_nats::connect_with_options(config.servers.join(","), connect_options)
            .await
            .map_err(|e| BrokerError::Connection(e.to_string()))?;

        info!("Connected to NATS at {:?}", config.servers);

        Ok(Self {
            client,
            closed: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Underlying client, for the event log and projection store
    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl BrokerConnection for NatsConnection {
    async fn open_channel(&self) -> Result<Box<dyn BrokerChannel>, BrokerError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BrokerError::Connection("connection closed".into()));
        }
        if self.client.connection_state() != State::Connected {
            return Err(BrokerError::ChannelOpen("client is not connected".into()));
        }

        debug!("Opening JetStream channel");
        Ok(Box::new(NatsChannel {
            client: self.client.clone(),
            jetstream: jetstream::new(self.client.clone()),
            open: AtomicBool::new(true),
            connection_closed: self.closed.clone(),
        }))
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Err(e) = self.client.flush().await {
            warn!("Flush on close failed: {}", e);
        }
        info!("NATS connection closed");
    }
}

struct NatsChannel {
    client: Client,
    jetstream: jetstream::Context,
    open: AtomicBool,
    connection_closed: Arc<AtomicBool>,
}

impl NatsChannel {
    fn subject(exchange: &str, routing_key: &str) -> String {
        if exchange.is_empty() {
            routing_key.to_string()
        } else {
            format!("{}.{}", exchange, routing_key)
        }
    }
}

#[async_trait]
impl BrokerChannel for NatsChannel {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
            && !self.connection_closed.load(Ordering::SeqCst)
            && self.client.connection_state() == State::Connected
    }

    async fn declare_queue(&self, name: &str, durable: bool) -> Result<(), BrokerError> {
        if !self.is_open() {
            return Err(BrokerError::ChannelClosed);
        }

        ensure_stream(&self.jetstream, &JetStreamConfig::queue(name, durable))
            .await
            .map_err(|e| BrokerError::Declare {
                queue: name.to_string(),
                message: e.to_string(),
            })?;

        debug!(queue = %name, durable, "Queue declared");
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

        let subject = Self::subject(exchange, routing_key);
        let mut headers = HeaderMap::new();
        if let Some(id) = &properties.message_id {
            headers.insert("Nats-Msg-Id", id.as_str());
        }
        let publish_error = |message: String| BrokerError::Publish {
            routing_key: routing_key.to_string(),
            message,
        };

        if properties.persistent {
            self.jetstream
                .publish_with_headers(subject, headers, body)
                .await
                .map_err(|e| publish_error(e.to_string()))?
                .await
                .map_err(|e| publish_error(e.to_string()))?;
        } else {
            self.client
                .publish_with_headers(subject, headers, body)
                .await
                .map_err(|e| publish_error(e.to_string()))?;
        }

        Ok(())
    }

    async fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = NatsConfig::default();
        assert_eq!(config.servers, vec!["nats://localhost:4222"]);
        assert_eq!(config.name, "ledger-ingest");
    }

    #[test]
    fn test_subject_with_exchange() {
        assert_eq!(NatsChannel::subject("", "transaction.created"), "transaction.created");
        assert_eq!(NatsChannel::subject("ledger", "balance.dlq"), "ledger.balance.dlq");
    }

    #[tokio::test]
    #[ignore] // Requires NATS server with JetStream
    async fn test_declare_and_publish() -> Result<(), BrokerError> {
        let connection = NatsConnection::connect(&NatsConfig::default()).await?;
        let channel = connection.open_channel().await?;

        channel.declare_queue("transaction.created", true).await?;
        channel
            .publish(
                "",
                "transaction.created",
                PublishProperties::persistent(),
                Bytes::from_static(b"{}"),
            )
            .await?;

        channel.close().await;
        assert!(!channel.is_open());
        connection.close().await;
        Ok(())
    }
}
