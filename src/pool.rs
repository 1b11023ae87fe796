// Copyright (c) 2025 - Cowboy AI, Inc.
//! Bounded broker channel pool
//!
//! A counting semaphore caps the number of leased channels; an idle queue
//! keeps returned channels for reuse. The pool owns the broker connection
//! for its whole lifetime and severs it on [`ChannelPool::shutdown`].
//!
//! # Lifecycle
//!
//! ```text
//! rent ──> acquire permit ──> newest idle channel still open? ──yes──> lease
//!                                    │ no (discard, keep the permit)
//!                                    └──> open a fresh channel ──────> lease
//!
//! release ──> channel open and pool live? ──yes──> back of idle queue
//!                                          └─no──> closed / dropped
//!         ──> permit returned
//! ```
//!
//! A background reaper closes channels that sat idle longer than the cutoff,
//! oldest first, never going below the configured minimum.
//!
//! # Example
//!
//! ```rust,no_run
//! use ledger_ingest::broker::{BrokerChannel, InMemoryBroker};
//! use ledger_ingest::pool::{ChannelPool, PoolConfig};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = ChannelPool::new(Arc::new(InMemoryBroker::new()), PoolConfig::default());
//!
//! let lease = pool.rent().await?;
//! lease.declare_queue("transaction.created", true).await?;
//! lease.release().await;
//!
//! pool.shutdown().await;
//! # Ok(())
//! # }
//! ```

use bytes::Bytes;
use futures::future::join_all;
use std::collections::VecDeque;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::broker::{BrokerChannel, BrokerConnection, PublishProperties};
use crate::errors::{IngestionResult, PoolError};

/// Pool sizing and reaping parameters
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Hard cap on concurrently leased channels
    pub max_channels: usize,
    /// Idle channels the reaper always keeps
    pub min_idle: usize,
    /// Idle time after which a channel may be reaped
    pub idle_timeout: Duration,
    /// How often the reaper runs
    pub sweep_interval: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_channels: 500,
            min_idle: 1,
            idle_timeout: Duration::from_secs(5 * 60),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

struct IdleChannel {
    channel: Arc<dyn BrokerChannel>,
    since: Instant,
}

struct PoolInner {
    connection: Arc<dyn BrokerConnection>,
    semaphore: Arc<Semaphore>,
    idle: Mutex<VecDeque<IdleChannel>>,
    closed: AtomicBool,
    config: PoolConfig,
}

impl PoolInner {
    fn lock_idle(&self) -> MutexGuard<'_, VecDeque<IdleChannel>> {
        self.idle.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Newest open idle channel, or a fresh one. Caller holds a permit.
    async fn checkout(&self) -> Result<Arc<dyn BrokerChannel>, PoolError> {
        loop {
            let candidate = self.lock_idle().pop_back();
            match candidate {
                Some(entry) if entry.channel.is_open() => return Ok(entry.channel),
                Some(_) => debug!("Discarding idle channel closed by the remote side"),
                None => break,
            }
        }

        let channel = self.connection.open_channel().await?;
        debug!("Opened new broker channel");
        Ok(Arc::from(channel))
    }

    /// Put a channel back; returns it when it must be closed instead
    fn give_back(&self, channel: Arc<dyn BrokerChannel>) -> Option<Arc<dyn BrokerChannel>> {
        let mut idle = self.lock_idle();
        if self.closed.load(Ordering::SeqCst) {
            return Some(channel);
        }
        if !channel.is_open() {
            debug!("Dropping closed channel on release");
            return None;
        }
        idle.push_back(IdleChannel {
            channel,
            since: Instant::now(),
        });
        None
    }

    /// Remove expired channels from the front, keeping `min_idle`
    fn take_expired(&self) -> Vec<Arc<dyn BrokerChannel>> {
        let mut idle = self.lock_idle();
        let mut expired = Vec::new();
        while idle.len() > self.config.min_idle {
            match idle.front() {
                Some(oldest) if oldest.since.elapsed() >= self.config.idle_timeout => {
                    if let Some(entry) = idle.pop_front() {
                        expired.push(entry.channel);
                    }
                }
                _ => break,
            }
        }
        expired
    }
}

/// Bounded pool of broker channels
pub struct ChannelPool {
    inner: Arc<PoolInner>,
    reaper: Mutex<Option<JoinHandle<()>>>,
}

impl ChannelPool {
    /// Create a pool owning `connection` and start its reaper
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(connection: Arc<dyn BrokerConnection>, config: PoolConfig) -> Self {
        let inner = Arc::new(PoolInner {
            connection,
            semaphore: Arc::new(Semaphore::new(config.max_channels)),
            idle: Mutex::new(VecDeque::new()),
            closed: AtomicBool::new(false),
            config,
        });
        let reaper = spawn_reaper(Arc::downgrade(&inner), inner.config.sweep_interval);

        Self {
            inner,
            reaper: Mutex::new(Some(reaper)),
        }
    }

    /// Lease a channel, waiting for capacity if every slot is in use
    ///
    /// Dropping the returned future while it waits gives up the attempt
    /// without holding any capacity.
    ///
    /// # Errors
    ///
    /// `PoolError::Closed` after shutdown, `PoolError::Broker` when a fresh
    /// channel cannot be opened. Neither leaks a slot.
    pub async fn rent(&self) -> Result<ChannelLease, PoolError> {
        if self.is_closed() {
            return Err(PoolError::Closed);
        }

        let permit = self
            .inner
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| PoolError::Closed)?;

        // Permit drops with the error, returning the slot
        let channel = self.inner.checkout().await?;

        Ok(ChannelLease {
            channel,
            pool: self.inner.clone(),
            _permit: permit,
            released: false,
        })
    }

    /// [`rent`](Self::rent) with a deadline
    pub async fn rent_timeout(&self, deadline: Duration) -> Result<ChannelLease, PoolError> {
        tokio::time::timeout(deadline, self.rent())
            .await
            .map_err(|_| PoolError::Timeout)?
    }

    /// Rent a channel, publish one message, and release the channel
    pub async fn publish(
        &self,
        routing_key: &str,
        properties: PublishProperties,
        body: Bytes,
    ) -> IngestionResult<()> {
        let lease = self.rent().await?;
        let result = lease.publish("", routing_key, properties, body).await;
        lease.release().await;
        Ok(result?)
    }

    /// Close idle channels, refuse new leases, and sever the connection
    ///
    /// Outstanding leases stay usable until released; their channels are
    /// closed on release.
    pub async fn shutdown(&self) {
        let drained: Vec<IdleChannel> = {
            let mut idle = self.inner.lock_idle();
            if self.inner.closed.swap(true, Ordering::SeqCst) {
                return;
            }
            idle.drain(..).collect()
        };

        self.inner.semaphore.close();
        if let Some(reaper) = self
            .reaper
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
        {
            reaper.abort();
        }

        let count = drained.len();
        join_all(drained.iter().map(|entry| entry.channel.close())).await;
        self.inner.connection.close().await;

        info!(closed_channels = count, "Channel pool shut down");
    }

    /// Whether shutdown has begun
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Slots not currently leased
    pub fn available(&self) -> usize {
        self.inner.semaphore.available_permits()
    }

    /// Channels waiting in the idle queue
    pub fn idle_count(&self) -> usize {
        self.inner.lock_idle().len()
    }

    /// Configured capacity
    pub fn max_channels(&self) -> usize {
        self.inner.config.max_channels
    }
}

impl Drop for ChannelPool {
    fn drop(&mut self) {
        if let Some(reaper) = self
            .reaper
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
        {
            reaper.abort();
        }
    }
}

fn spawn_reaper(pool: Weak<PoolInner>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let Some(inner) = pool.upgrade() else {
                break;
            };

            let expired = inner.take_expired();
            if expired.is_empty() {
                continue;
            }
            debug!(count = expired.len(), "Reaping idle channels");
            join_all(expired.iter().map(|channel| channel.close())).await;
        }
    })
}

/// Exclusive handle on a pooled channel
///
/// Dereferences to the channel. Call [`release`](Self::release) when done;
/// dropping the lease releases it as well, without awaiting a close.
pub struct ChannelLease {
    channel: Arc<dyn BrokerChannel>,
    pool: Arc<PoolInner>,
    _permit: OwnedSemaphorePermit,
    released: bool,
}

impl ChannelLease {
    /// Return the channel to the pool and free its slot
    pub async fn release(mut self) {
        self.released = true;
        if let Some(channel) = self.pool.give_back(self.channel.clone()) {
            channel.close().await;
        }
    }
}

impl std::fmt::Debug for ChannelLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelLease")
            .field("released", &self.released)
            .finish_non_exhaustive()
    }
}

impl Deref for ChannelLease {
    type Target = dyn BrokerChannel;

    fn deref(&self) -> &Self::Target {
        self.channel.as_ref()
    }
}

impl Drop for ChannelLease {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Some(channel) = self.pool.give_back(self.channel.clone()) {
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(async move { channel.close().await });
            }
        }
    }
}
