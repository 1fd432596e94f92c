//! # Clock Abstraction
//!
//! Lock TTLs and Offer staleness are all "now versus some timestamp"
//! comparisons. Reading the wall clock directly makes those untestable
//! without sleeping for five minutes, so the protocol asks a [`Clock`].
//!
//! Time is whole Unix seconds, matching the wire format's u32 timestamp.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{NaiveDate, TimeZone, Utc};

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Seconds since the Unix epoch.
    fn now(&self) -> u64;

    /// The UTC calendar date for [`Clock::now`], used to pick the daily key.
    fn today(&self) -> NaiveDate {
        let secs = i64::try_from(self.now()).unwrap_or(i64::MAX);
        Utc.timestamp_opt(secs, 0)
            .single()
            .map(|dt| dt.date_naive())
            .unwrap_or(NaiveDate::MAX)
    }
}

/// The real wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        u64::try_from(Utc::now().timestamp()).unwrap_or(0)
    }
}

/// A clock that only moves when told to. For tests and the CLI's demo mode.
#[derive(Debug, Default)]
pub struct ManualClock {
    secs: AtomicU64,
}

impl ManualClock {
    pub fn new(start: u64) -> Self {
        Self {
            secs: AtomicU64::new(start),
        }
    }

    /// Move forward by `secs` seconds.
    pub fn advance(&self, secs: u64) {
        self.secs.fetch_add(secs, Ordering::SeqCst);
    }

    /// Jump to an absolute time. Going backwards is allowed; phones do it.
    pub fn set(&self, secs: u64) {
        self.secs.store(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.secs.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new(1_000);
        assert_eq!(clock.now(), 1_000);
        clock.advance(300);
        assert_eq!(clock.now(), 1_300);
        clock.set(10);
        assert_eq!(clock.now(), 10);
    }

    #[test]
    fn today_tracks_utc_midnight() {
        // 2026-03-14T23:59:59Z
        let clock = ManualClock::new(1_773_532_799);
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2026, 3, 14).unwrap());
        clock.advance(1);
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2026, 3, 15).unwrap());
    }

    #[test]
    fn system_clock_is_after_2024() {
        assert!(SystemClock.now() > 1_700_000_000);
    }
}
