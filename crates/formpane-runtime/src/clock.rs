//! Time sources for cooldowns, debouncing and rate limits.

use std::cell::Cell;
use std::rc::Rc;

use chrono::{DateTime, TimeDelta, Utc};

pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[cfg(feature = "system-clock")]
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[cfg(feature = "system-clock")]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Hand-advanced clock. Clones share the same instant.
#[derive(Debug, Clone)]
pub struct ManualClock {
    millis: Rc<Cell<i64>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            millis: Rc::new(Cell::new(start.timestamp_millis())),
        }
    }

    pub fn advance_ms(&self, ms: i64) {
        self.millis.set(self.millis.get() + ms);
    }

    pub fn advance(&self, delta: TimeDelta) {
        self.advance_ms(delta.num_milliseconds());
    }

    pub fn set(&self, at: DateTime<Utc>) {
        self.millis.set(at.timestamp_millis());
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(DateTime::<Utc>::UNIX_EPOCH)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.millis.get()).unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = ManualClock::default();
        let other = clock.clone();
        clock.advance_ms(1_500);
        assert_eq!(other.now().timestamp_millis(), 1_500);
        other.advance(TimeDelta::milliseconds(500));
        assert_eq!(clock.now().timestamp_millis(), 2_000);
    }
}
