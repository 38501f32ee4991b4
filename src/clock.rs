use std::rc::Rc;

/// Source of "now" in epoch milliseconds.
pub trait Clock {
    fn now_ms(&self) -> i64;
}

impl<C: Clock + ?Sized> Clock for Rc<C> {
    fn now_ms(&self) -> i64 {
        (**self).now_ms()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

#[cfg(test)]
pub mod fake {
    use super::Clock;
    use std::cell::Cell;

    /// Settable clock for tests.
    #[derive(Debug, Default)]
    pub struct FakeClock {
        now: Cell<i64>,
    }

    impl FakeClock {
        pub fn at(now_ms: i64) -> Self {
            Self { now: Cell::new(now_ms) }
        }

        pub fn advance(&self, ms: i64) {
            self.now.set(self.now.get() + ms);
        }

        pub fn set(&self, now_ms: i64) {
            self.now.set(now_ms);
        }
    }

    impl Clock for FakeClock {
        fn now_ms(&self) -> i64 {
            self.now.get()
        }
    }
}
