// Copyright (c) 2025 - Cowboy AI, Inc.
//! Deterministic event identity
//!
//! Maps a natural key (aggregate key + business timestamp) to a name-based
//! UUID (v5). The same logical fact always yields the same identity, across
//! retries and process restarts, so the identity can serve both as the
//! event-log message id and as the projection dedup marker.
//!
//! # Example
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use ledger_ingest::identity::DeterministicId;
//!
//! let at = Utc.with_ymd_and_hms(2026, 1, 19, 12, 0, 0).unwrap();
//! let a = DeterministicId::for_key("A1", at);
//! let b = DeterministicId::for_key("A1", at);
//! assert_eq!(a, b);
//! ```

use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

/// Namespace for ledger event identities
pub const LEDGER_NAMESPACE: Uuid = Uuid::from_u128(0x6c65_6467_6572_4000_8000_6576_656e_7473);

/// Deterministic identity generator
pub struct DeterministicId;

impl DeterministicId {
    /// Identity for `key` at `timestamp`
    pub fn for_key(key: &str, timestamp: DateTime<Utc>) -> Uuid {
        Uuid::new_v5(&LEDGER_NAMESPACE, Self::natural_key(key, timestamp).as_bytes())
    }

    /// Canonical encoding hashed into the identity
    ///
    /// Timestamps are rendered in UTC with nanosecond precision so that two
    /// instants compare equal exactly when their encodings do.
    pub fn natural_key(key: &str, timestamp: DateTime<Utc>) -> String {
        format!(
            "{}|{}",
            key,
            timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true)
        )
    }
}
