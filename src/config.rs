// Copyright (c) 2025 - Cowboy AI, Inc.
//! Ingestion configuration
//!
//! Every setting has a default. [`IngestionConfig::from_env`] overrides them
//! from the environment:
//!
//! | Variable                    | Setting                          |
//! |-----------------------------|----------------------------------|
//! | `NATS_URL`                  | comma-separated server URLs      |
//! | `LEDGER_CLIENT_NAME`        | NATS client name                 |
//! | `LEDGER_POOL_SIZE`          | maximum leased channels          |
//! | `LEDGER_POOL_MIN_IDLE`      | idle channels kept by the reaper |
//! | `LEDGER_POOL_IDLE_SECS`     | idle cutoff                      |
//! | `LEDGER_CALL_TIMEOUT_MS`    | per remote call deadline         |
//! | `LEDGER_MAX_RETRIES`        | append retries                   |
//! | `LEDGER_RETRY_BASE_MS`      | append backoff unit              |
//! | `LEDGER_EVENT_STREAM`       | event-log stream name            |
//! | `LEDGER_PROJECTION_BUCKET`  | projection KV bucket             |

use std::str::FromStr;
use std::time::Duration;

use crate::appender::RetryPolicy;
use crate::broker::NatsConfig;
use crate::errors::{IngestionError, IngestionResult};
use crate::jetstream::JetStreamConfig;
use crate::pool::PoolConfig;
use crate::projection::kv::KvStoreConfig;

/// Complete configuration of an ingestion process
#[derive(Debug, Clone)]
pub struct IngestionConfig {
    pub nats: NatsConfig,
    pub pool: PoolConfig,
    pub retry: RetryPolicy,
    /// Deadline applied to every remote call
    pub call_timeout: Duration,
    pub event_log: JetStreamConfig,
    pub projections: KvStoreConfig,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            nats: NatsConfig::default(),
            pool: PoolConfig::default(),
            retry: RetryPolicy::default(),
            call_timeout: Duration::from_secs(5),
            event_log: JetStreamConfig::event_log(),
            projections: KvStoreConfig::default(),
        }
    }
}

impl IngestionConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> IngestionResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> IngestionResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(urls) = lookup("NATS_URL") {
            config.nats.servers = urls
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
            if config.nats.servers.is_empty() {
                return Err(IngestionError::Configuration("NATS_URL is empty".into()));
            }
        }
        if let Some(name) = lookup("LEDGER_CLIENT_NAME") {
            config.nats.name = name;
        }

        if let Some(size) = parse::<usize>(&lookup, "LEDGER_POOL_SIZE")? {
            if size == 0 {
                return Err(IngestionError::Configuration(
                    "LEDGER_POOL_SIZE must be at least 1".into(),
                ));
            }
            config.pool.max_channels = size;
        }
        if let Some(min_idle) = parse::<usize>(&lookup, "LEDGER_POOL_MIN_IDLE")? {
            config.pool.min_idle = min_idle;
        }
        if let Some(secs) = parse::<u64>(&lookup, "LEDGER_POOL_IDLE_SECS")? {
            config.pool.idle_timeout = Duration::from_secs(secs);
        }

        if let Some(ms) = parse::<u64>(&lookup, "LEDGER_CALL_TIMEOUT_MS")? {
            config.call_timeout = Duration::from_millis(ms);
        }
        if let Some(retries) = parse::<u32>(&lookup, "LEDGER_MAX_RETRIES")? {
            config.retry.max_retries = retries;
        }
        if let Some(ms) = parse::<u64>(&lookup, "LEDGER_RETRY_BASE_MS")? {
            config.retry.base_delay = Duration::from_millis(ms);
        }

        if let Some(stream) = lookup("LEDGER_EVENT_STREAM") {
            config.event_log.stream_name = stream;
        }
        if let Some(bucket) = lookup("LEDGER_PROJECTION_BUCKET") {
            config.projections.bucket = bucket;
        }

        Ok(config)
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> IngestionResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    lookup(name)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|e| {
                IngestionError::Configuration(format!("{} = {:?}: {}", name, raw, e))
            })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = IngestionConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.pool.max_channels, 500);
        assert_eq!(config.pool.min_idle, 1);
        assert_eq!(config.pool.idle_timeout, Duration::from_secs(300));
        assert_eq!(config.retry, RetryPolicy::default());
        assert_eq!(config.call_timeout, Duration::from_secs(5));
        assert_eq!(config.event_log.stream_name, "LEDGER_EVENTS");
    }

    #[test]
    fn test_overrides() {
        let config = IngestionConfig::from_lookup(lookup(&[
            ("NATS_URL", "nats://a:4222, nats://b:4222"),
            ("LEDGER_POOL_SIZE", "8"),
            ("LEDGER_CALL_TIMEOUT_MS", "250"),
            ("LEDGER_MAX_RETRIES", "5"),
        ]))
        .unwrap();

        assert_eq!(config.nats.servers, vec!["nats://a:4222", "nats://b:4222"]);
        assert_eq!(config.pool.max_channels, 8);
        assert_eq!(config.call_timeout, Duration::from_millis(250));
        assert_eq!(config.retry.max_retries, 5);
    }

    #[test]
    fn test_malformed_value() {
        let result = IngestionConfig::from_lookup(lookup(&[("LEDGER_POOL_SIZE", "lots")]));
        assert!(matches!(result, Err(IngestionError::Configuration(_))));
    }

    #[test]
    fn test_zero_pool_size_rejected() {
        let result = IngestionConfig::from_lookup(lookup(&[("LEDGER_POOL_SIZE", "0")]));
        assert!(matches!(result, Err(IngestionError::Configuration(_))));
    }
}
