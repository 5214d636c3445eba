//! Trailing-edge debounce bookkeeping.
//!
//! [`Debouncer`] only tracks time; it does not sleep or spawn anything. The
//! caller records requests and asks when the coalesced run is due.

use std::time::{Duration, Instant};

/// Coalesces bursts of requests into one trailing run.
///
/// A run becomes due once no request arrived for `delay`, or once `max_wait`
/// elapsed since the first request of the burst, whichever comes first.
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    max_wait: Duration,
    first_request: Option<Instant>,
    last_request: Option<Instant>,
    coalesced: u64,
}

impl Debouncer {
    pub fn new(delay: Duration, max_wait: Duration) -> Self {
        Self {
            delay,
            max_wait: max_wait.max(delay),
            first_request: None,
            last_request: None,
            coalesced: 0,
        }
    }

    /// Records a request made at `now`
    pub fn request(&mut self, now: Instant) {
        if self.first_request.is_none() {
            self.first_request = Some(now);
        } else {
            self.coalesced += 1;
        }
        self.last_request = Some(now);
    }

    /// Whether a request is waiting for its trailing run
    pub fn is_pending(&self) -> bool {
        self.first_request.is_some()
    }

    /// Instant at which the pending run becomes due
    pub fn deadline(&self) -> Option<Instant> {
        let first = self.first_request?;
        let last = self.last_request.unwrap_or(first);
        Some((last + self.delay).min(first + self.max_wait))
    }

    /// Whether the pending run is due at `now`
    pub fn is_due(&self, now: Instant) -> bool {
        self.deadline().is_some_and(|deadline| now >= deadline)
    }

    /// Time left until the pending run is due
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.deadline()
            .map(|deadline| deadline.saturating_duration_since(now))
    }

    /// Clears the pending burst. Returns true if one was pending.
    pub fn take(&mut self) -> bool {
        self.last_request = None;
        self.first_request.take().is_some()
    }

    /// Requests absorbed into an earlier pending run
    pub fn coalesced(&self) -> u64 {
        self.coalesced
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn test_idle_debouncer() {
        let debouncer = Debouncer::new(ms(100), ms(1000));
        assert!(!debouncer.is_pending());
        assert!(debouncer.deadline().is_none());
        assert!(!debouncer.is_due(Instant::now()));
    }

    #[test]
    fn test_trailing_edge() {
        let t0 = Instant::now();
        let mut debouncer = Debouncer::new(ms(100), ms(1000));

        debouncer.request(t0);
        assert!(!debouncer.is_due(t0 + ms(99)));
        assert!(debouncer.is_due(t0 + ms(100)));
    }

    #[test]
    fn test_burst_postpones_deadline() {
        let t0 = Instant::now();
        let mut debouncer = Debouncer::new(ms(100), ms(1000));

        debouncer.request(t0);
        debouncer.request(t0 + ms(60));
        debouncer.request(t0 + ms(120));

        assert!(!debouncer.is_due(t0 + ms(200)));
        assert!(debouncer.is_due(t0 + ms(220)));
        assert_eq!(debouncer.coalesced(), 2);
        assert_eq!(debouncer.remaining(t0 + ms(200)), Some(ms(20)));
    }

    #[test]
    fn test_max_wait_caps_postponement() {
        let t0 = Instant::now();
        let mut debouncer = Debouncer::new(ms(100), ms(250));

        for step in 0..10 {
            debouncer.request(t0 + ms(step * 50));
        }
        assert_eq!(debouncer.deadline(), Some(t0 + ms(250)));
    }

    #[test]
    fn test_take_resets_burst() {
        let t0 = Instant::now();
        let mut debouncer = Debouncer::new(ms(100), ms(1000));

        debouncer.request(t0);
        assert!(debouncer.take());
        assert!(!debouncer.take());
        assert!(!debouncer.is_pending());

        debouncer.request(t0 + ms(500));
        assert_eq!(debouncer.deadline(), Some(t0 + ms(600)));
    }
}
