//! Block-anchored time interpolation. Block timestamps only refresh every
//! settlement, so candidate transactions observed between blocks are stamped
//! with the last authoritative timestamp plus the monotonic time elapsed
//! since it was taken.

use std::time::{Duration, Instant};

/// Monotonic time source, injectable so the detector can be driven
/// deterministically in tests.
pub trait Clock: Send + Sync {
    /// Time elapsed since an arbitrary fixed origin. Never goes backwards.
    fn monotonic(&self) -> Duration;
}

/// Production clock measuring from process start.
#[derive(Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn monotonic(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// The latest authoritative settlement timestamp paired with the monotonic
/// reading taken at the moment it arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeAnchor {
    settlement_timestamp: i64,
    monotonic_snapshot: Duration,
}

impl TimeAnchor {
    pub fn new(settlement_timestamp: i64, monotonic_snapshot: Duration) -> Self {
        Self {
            settlement_timestamp,
            monotonic_snapshot,
        }
    }

    pub fn settlement_timestamp(&self) -> i64 {
        self.settlement_timestamp
    }

    /// Interpolates a unix timestamp (seconds) for an event observed at
    /// monotonic time `now`. Sub-second remainders truncate.
    pub fn estimate(&self, now: Duration) -> i64 {
        let delta = now.saturating_sub(self.monotonic_snapshot);
        self.settlement_timestamp + delta.as_secs() as i64
    }
}
