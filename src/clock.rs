//! Wall-clock abstraction.
//!
//! Every place the engine reads "now" (sync acknowledgement timestamps,
//! the leaderboard rate gate, snapshot expiry) goes through [`Clock`] so
//! tests can drive time explicitly.

use chrono::{DateTime, Utc};

/// Source of the current wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// System clock used in production.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
pub use test_clock::ManualClock;
