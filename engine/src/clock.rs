//! Wall clock used to stamp records.
//!
//! The store never reads the system time directly. Every `createdAt` and
//! `updatedAt` comes from an injected [`Clock`], which keeps tests
//! deterministic and lets callers replay imports with stable timestamps.

use crate::Timestamp;
use chrono::{DateTime, SecondsFormat, Utc};
use std::sync::atomic::{AtomicU64, Ordering};

/// Source of timestamps in milliseconds since the Unix epoch.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now().timestamp_millis().max(0) as Timestamp
    }
}

/// A clock that advances by a fixed step on every read.
///
/// Two consecutive reads never return the same value, so records created
/// back to back still get distinct timestamps.
#[derive(Debug)]
pub struct ManualClock {
    current: AtomicU64,
    step: u64,
}

impl ManualClock {
    /// Create a clock starting at `start`, advancing 1ms per read.
    pub fn new(start: Timestamp) -> Self {
        Self::with_step(start, 1)
    }

    /// Create a clock starting at `start`, advancing `step` per read.
    pub fn with_step(start: Timestamp, step: u64) -> Self {
        Self {
            current: AtomicU64::new(start),
            step,
        }
    }

    /// Peek at the next value without advancing.
    pub fn peek(&self) -> Timestamp {
        self.current.load(Ordering::SeqCst)
    }

    /// Jump the clock to an absolute value.
    pub fn set(&self, value: Timestamp) {
        self.current.store(value, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.current.fetch_add(self.step, Ordering::SeqCst)
    }
}

/// Format a millisecond timestamp as RFC 3339 (UTC, millisecond precision).
pub fn to_rfc3339(timestamp: Timestamp) -> String {
    let millis = i64::try_from(timestamp).unwrap_or(i64::MAX);
    DateTime::<Utc>::from_timestamp_millis(millis)
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}
