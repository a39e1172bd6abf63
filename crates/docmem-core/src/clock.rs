//! The shared time base for expiration stamping and sweeping.
//!
//! Every expiration is Unix seconds (UTC). The memory service stamps with a
//! [`Clock`] and hands the same clock's reading to the TTL reaper.

use chrono::Utc;

pub trait Clock: Send + Sync {
    /// Current time in Unix seconds.
    fn now(&self) -> i64;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        unix_now()
    }
}

/// A clock frozen at a given instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now(&self) -> i64 {
        self.0
    }
}

pub fn unix_now() -> i64 {
    Utc::now().timestamp()
}
