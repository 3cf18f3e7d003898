//! Wall-clock sources.
//!
//! The timer never counts down by decrementing; it compares an absolute end
//! time against whatever the clock reports. Swapping the clock is how tests
//! simulate suspension.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Local, TimeZone, Utc};

/// Provides the current wall-clock time in epoch milliseconds.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;

    /// Local time of day as `HH:MM`, for a status line next to the timer.
    fn time_of_day(&self) -> String {
        time_of_day(&Local, self.now_ms())
    }
}

/// Format `ms` as a zero-padded 24-hour `HH:MM` in `tz`.
pub fn time_of_day<Tz: TimeZone>(tz: &Tz, ms: u64) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let utc = DateTime::<Utc>::from_timestamp_millis(i64::try_from(ms).unwrap_or(i64::MAX))
        .unwrap_or_default();
    utc.with_timezone(tz).format("%H:%M").to_string()
}

/// The system wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        // Pre-epoch clocks are treated as the epoch.
        Utc::now().timestamp_millis().max(0) as u64
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: AtomicU64::new(start_ms),
        }
    }

    pub fn set(&self, ms: u64) {
        self.now.store(ms, Ordering::SeqCst);
    }

    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}
