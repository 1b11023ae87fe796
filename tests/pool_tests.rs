// Copyright (c) 2025 - Cowboy AI, Inc.
//! Channel pool behaviour under concurrency and churn

use ledger_ingest::broker::{InMemoryBroker, PublishProperties};
use ledger_ingest::{ChannelPool, PoolConfig};
use bytes::Bytes;
use futures::future::join_all;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use test_case::test_case;
use tokio_test::{assert_pending, assert_ready};

fn pool(broker: &InMemoryBroker, max_channels: usize) -> Arc<ChannelPool> {
    Arc::new(ChannelPool::new(
        Arc::new(broker.clone()),
        PoolConfig {
            max_channels,
            ..Default::default()
        },
    ))
}

/// At most N leases are ever outstanding, whatever the number of callers
#[test_case(1, 8 ; "single slot")]
#[test_case(3, 32 ; "small pool")]
#[test_case(8, 64 ; "wide pool")]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_outstanding_leases_never_exceed_capacity(capacity: usize, callers: usize) {
    let broker = InMemoryBroker::new();
    let pool = pool(&broker, capacity);
    let outstanding = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let mut tasks = Vec::new();
    for _ in 0..callers {
        let pool = pool.clone();
        let outstanding = outstanding.clone();
        let peak = peak.clone();
        tasks.push(tokio::spawn(async move {
            let lease = pool.rent().await.unwrap();
            let now = outstanding.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);

            tokio::time::sleep(Duration::from_millis(2)).await;

            outstanding.fetch_sub(1, Ordering::SeqCst);
            lease.release().await;
        }));
    }
    for result in join_all(tasks).await {
        result.unwrap();
    }

    assert!(peak.load(Ordering::SeqCst) <= capacity);
    assert!(broker.channels_opened() <= capacity as u64);
    assert_eq!(pool.available(), capacity);
}

/// Channels closed remotely between uses are replaced, never handed out
#[tokio::test]
async fn test_churn_never_hands_out_closed_channel() {
    let broker = InMemoryBroker::new();
    let pool = pool(&broker, 4);

    for round in 0..10 {
        let leases = vec![
            pool.rent().await.unwrap(),
            pool.rent().await.unwrap(),
            pool.rent().await.unwrap(),
        ];
        for lease in &leases {
            assert!(lease.is_open(), "closed channel handed out in round {}", round);
            lease
                .publish("", "transaction.created", PublishProperties::persistent(), Bytes::new())
                .await
                .unwrap();
        }
        for lease in leases {
            lease.release().await;
        }
        if round % 3 == 0 {
            broker.close_all_channels();
        }
    }

    assert_eq!(pool.available(), 4);
    assert_eq!(broker.published("transaction.created").len(), 30);
}

#[tokio::test]
async fn test_waiting_rent_is_woken_by_release() {
    let broker = InMemoryBroker::new();
    let pool = pool(&broker, 1);
    let held = pool.rent().await.unwrap();

    let mut waiting = tokio_test::task::spawn(pool.rent());
    assert_pending!(waiting.poll());

    held.release().await;
    assert!(waiting.is_woken());
    let lease = assert_ready!(waiting.poll()).unwrap();
    assert!(lease.is_open());
    assert_eq!(broker.channels_opened(), 1);
}

#[tokio::test]
async fn test_shutdown_wakes_waiters() {
    let broker = InMemoryBroker::new();
    let pool = pool(&broker, 1);
    let held = pool.rent().await.unwrap();

    let waiter = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.rent().await.map(|_| ()) })
    };
    tokio::task::yield_now().await;

    pool.shutdown().await;
    let result = waiter.await.unwrap();
    assert!(result.is_err());

    held.release().await;
    assert!(broker.is_closed());
}
