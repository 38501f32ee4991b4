//! Sliding-window limiter for outbound extraction requests.
//!
//! The persisted log only ever holds the last 24 hours of request timestamps;
//! the per-minute count is derived from the same log. A timestamp whose age
//! equals the window size is already outside the window.

use tracing::{debug, warn};

use crate::clock::Clock;
use crate::error::{IntelError, IntelResult, Window};

pub const DAILY_LIMIT: usize = 20;
pub const MINUTE_LIMIT: usize = 5;
pub const DAY_MS: i64 = 24 * 60 * 60 * 1000;
pub const MINUTE_MS: i64 = 60 * 1000;

/// Durable storage for the request timestamp log.
pub trait UsageLog {
    fn load(&self) -> IntelResult<Vec<i64>>;
    fn store(&self, timestamps: &[i64]) -> IntelResult<()>;
}

impl<T: UsageLog + ?Sized> UsageLog for &T {
    fn load(&self) -> IntelResult<Vec<i64>> {
        (**self).load()
    }

    fn store(&self, timestamps: &[i64]) -> IntelResult<()> {
        (**self).store(timestamps)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Usage {
    pub daily: usize,
    pub minute: usize,
}

impl Usage {
    pub fn daily_exhausted(&self) -> bool {
        self.daily >= DAILY_LIMIT
    }
}

pub struct Governor<L, C> {
    log: L,
    clock: C,
}

impl<L: UsageLog, C: Clock> Governor<L, C> {
    pub fn new(log: L, clock: C) -> Self {
        Self { log, clock }
    }

    /// Permit and record one request, or refuse it without recording anything.
    pub fn check_and_record(&self) -> IntelResult<()> {
        let now = self.clock.now_ms();
        let daily: Vec<i64> = self
            .log
            .load()?
            .into_iter()
            .filter(|ts| within(now, *ts, DAY_MS))
            .collect();
        let minute = daily.iter().filter(|ts| within(now, **ts, MINUTE_MS)).count();

        if daily.len() >= DAILY_LIMIT {
            let window = Window::Daily;
            warn!(%window, count = daily.len(), "request refused");
            return Err(IntelError::RateLimitExceeded { window });
        }
        if minute >= MINUTE_LIMIT {
            let window = Window::Minute;
            warn!(%window, count = minute, "request refused");
            return Err(IntelError::RateLimitExceeded { window });
        }

        let mut kept = daily;
        kept.push(now);
        self.log.store(&kept)?;
        debug!(daily = kept.len(), minute = minute + 1, "request permitted");
        Ok(())
    }

    /// Counts for display; never writes the log.
    pub fn current_usage(&self) -> IntelResult<Usage> {
        let now = self.clock.now_ms();
        let log = self.log.load()?;
        Ok(Usage {
            daily: log.iter().filter(|ts| within(now, **ts, DAY_MS)).count(),
            minute: log.iter().filter(|ts| within(now, **ts, MINUTE_MS)).count(),
        })
    }
}

// Entries stamped after `now` belong to no window
fn within(now: i64, ts: i64, window: i64) -> bool {
    let age = now.saturating_sub(ts);
    (0..window).contains(&age)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::fake::FakeClock;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct MemoryLog {
        entries: RefCell<Vec<i64>>,
        writes: RefCell<usize>,
    }

    impl UsageLog for MemoryLog {
        fn load(&self) -> IntelResult<Vec<i64>> {
            Ok(self.entries.borrow().clone())
        }

        fn store(&self, timestamps: &[i64]) -> IntelResult<()> {
            *self.entries.borrow_mut() = timestamps.to_vec();
            *self.writes.borrow_mut() += 1;
            Ok(())
        }
    }

    const T0: i64 = 1_700_000_000_000;

    #[test]
    fn test_twenty_per_day_then_daily_refusal() {
        let log = MemoryLog::default();
        let clock = Rc::new(FakeClock::at(T0));
        let governor = Governor::new(&log, clock.clone());

        for _ in 0..DAILY_LIMIT {
            governor.check_and_record().unwrap();
            clock.advance(2 * MINUTE_MS);
        }

        let err = governor.check_and_record().unwrap_err();
        assert!(matches!(err, IntelError::RateLimitExceeded { window: Window::Daily }));
        assert_eq!(log.entries.borrow().len(), DAILY_LIMIT);
    }

    #[test]
    fn test_five_per_minute_then_minute_refusal() {
        let log = MemoryLog::default();
        let clock = Rc::new(FakeClock::at(T0));
        let governor = Governor::new(&log, clock.clone());

        for _ in 0..MINUTE_LIMIT {
            governor.check_and_record().unwrap();
            clock.advance(1_000);
        }

        let err = governor.check_and_record().unwrap_err();
        assert!(matches!(err, IntelError::RateLimitExceeded { window: Window::Minute }));
        assert_eq!(governor.current_usage().unwrap().daily, MINUTE_LIMIT);

        // A minute after the first burst entry the window has room again
        clock.set(T0 + MINUTE_MS);
        governor.check_and_record().unwrap();
    }

    #[test]
    fn test_daily_window_resets_after_24_hours() {
        let log = MemoryLog::default();
        let clock = Rc::new(FakeClock::at(T0));
        let governor = Governor::new(&log, clock.clone());

        for _ in 0..DAILY_LIMIT {
            governor.check_and_record().unwrap();
            clock.advance(2 * MINUTE_MS);
        }
        assert!(governor.check_and_record().is_err());

        clock.advance(DAY_MS);
        governor.check_and_record().unwrap();

        // Old entries were pruned on that write
        assert_eq!(log.entries.borrow().len(), 1);
    }

    #[test]
    fn test_boundary_age_is_outside_window() {
        let log = MemoryLog::default();
        *log.entries.borrow_mut() = vec![T0 - DAY_MS, T0 - MINUTE_MS, T0 - MINUTE_MS + 1];
        let governor = Governor::new(&log, FakeClock::at(T0));

        let usage = governor.current_usage().unwrap();
        assert_eq!(usage, Usage { daily: 2, minute: 1 });
    }

    #[test]
    fn test_refusal_records_nothing() {
        let log = MemoryLog::default();
        *log.entries.borrow_mut() = vec![T0; MINUTE_LIMIT];
        let governor = Governor::new(&log, FakeClock::at(T0));

        assert!(governor.check_and_record().is_err());
        assert_eq!(*log.writes.borrow(), 0);
        assert_eq!(log.entries.borrow().len(), MINUTE_LIMIT);
    }

    #[test]
    fn test_current_usage_does_not_prune() {
        let log = MemoryLog::default();
        *log.entries.borrow_mut() = vec![T0 - 2 * DAY_MS, T0 - 10];
        let governor = Governor::new(&log, FakeClock::at(T0));

        let usage = governor.current_usage().unwrap();
        assert_eq!(usage.daily, 1);
        assert_eq!(usage.minute, 1);
        assert_eq!(*log.writes.borrow(), 0);
        assert_eq!(log.entries.borrow().len(), 2);
    }

    #[test]
    fn test_out_of_range_entries_are_ignored() {
        let log = MemoryLog::default();
        *log.entries.borrow_mut() = vec![i64::MIN, i64::MAX, T0 + 5_000, T0 - 10];
        let governor = Governor::new(&log, FakeClock::at(T0));

        assert_eq!(governor.current_usage().unwrap(), Usage { daily: 1, minute: 1 });

        governor.check_and_record().unwrap();
        assert_eq!(*log.entries.borrow(), vec![T0 - 10, T0]);
    }

    #[test]
    fn test_log_survives_restart_via_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("intel.db");
        let clock = Rc::new(FakeClock::at(T0));

        {
            let db = crate::db::Database::open(&path).unwrap();
            db.init().unwrap();
            let governor = Governor::new(&db, clock.clone());
            for _ in 0..3 {
                governor.check_and_record().unwrap();
            }
        }

        let db = crate::db::Database::open(&path).unwrap();
        let governor = Governor::new(&db, clock.clone());
        assert_eq!(governor.current_usage().unwrap(), Usage { daily: 3, minute: 3 });
    }
}
