//! Rate policies driven by explicit timestamps.

use chrono::{DateTime, TimeDelta, Utc};

/// Configured millisecond window as a `TimeDelta`, saturating at
/// `TimeDelta::MAX`.
pub(crate) fn millis(ms: u64) -> TimeDelta {
    i64::try_from(ms)
        .ok()
        .and_then(TimeDelta::try_milliseconds)
        .unwrap_or(TimeDelta::MAX)
}

/// `at + delta`, saturating at the last representable instant.
pub(crate) fn deadline_after(at: DateTime<Utc>, delta: TimeDelta) -> DateTime<Utc> {
    at.checked_add_signed(delta).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Classic token bucket. Starts full; refills continuously.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    capacity: f64,
    refill_per_sec: f64,
    tokens: f64,
    last_refill: Option<DateTime<Utc>>,
}

impl TokenBucket {
    pub fn new(capacity: u32, refill_per_sec: f64) -> Self {
        let capacity = f64::from(capacity.max(1));
        Self {
            capacity,
            refill_per_sec: if refill_per_sec.is_finite() {
                refill_per_sec.max(0.0)
            } else {
                0.0
            },
            tokens: capacity,
            last_refill: None,
        }
    }

    fn refill(&mut self, now: DateTime<Utc>) {
        if let Some(last) = self.last_refill {
            let elapsed_ms = (now - last).num_milliseconds();
            if elapsed_ms > 0 {
                let gained = elapsed_ms as f64 / 1000.0 * self.refill_per_sec;
                self.tokens = (self.tokens + gained).min(self.capacity);
            } else if elapsed_ms < 0 {
                // Clock went backwards; re-anchor without granting tokens.
                self.last_refill = Some(now);
                return;
            } else {
                return;
            }
        }
        self.last_refill = Some(now);
    }

    /// Take one token if available.
    pub fn try_acquire(&mut self, now: DateTime<Utc>) -> bool {
        self.refill(now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Whole tokens available at `now`.
    pub fn available(&mut self, now: DateTime<Utc>) -> u32 {
        self.refill(now);
        self.tokens.floor() as u32
    }

    pub fn capacity(&self) -> u32 {
        self.capacity as u32
    }
}

/// Trailing-edge debounce: each [`arm`](Debouncer::arm) pushes the
/// deadline out; [`fire`](Debouncer::fire) reports once it has passed.
#[derive(Debug, Clone)]
pub struct Debouncer {
    window: TimeDelta,
    deadline: Option<DateTime<Utc>>,
}

impl Debouncer {
    pub fn new(window: TimeDelta) -> Self {
        Self {
            window,
            deadline: None,
        }
    }

    pub fn arm(&mut self, now: DateTime<Utc>) -> DateTime<Utc> {
        let deadline = deadline_after(now, self.window);
        self.deadline = Some(deadline);
        deadline
    }

    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.deadline
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Disarm and return true when the deadline is due.
    pub fn fire(&mut self, now: DateTime<Utc>) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }
}
