//! Single-slot delayed trigger.

use std::time::{Duration, Instant};

/// Coalesces bursts of signals into one trigger after a quiet period.
///
/// Each signal cancels the pending trigger and schedules a new one `delay`
/// later. Polled from the thread that owns it, so the triggered action runs
/// on that thread.
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn signal(&mut self) {
        self.signal_at(Instant::now());
    }

    /// Reschedule the trigger for `now + delay`.
    pub fn signal_at(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    pub fn poll(&mut self) -> bool {
        self.poll_at(Instant::now())
    }

    /// Returns `true` exactly once per burst, when its quiet period has elapsed.
    pub fn poll_at(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_collapses_to_one_trigger() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(Duration::from_millis(300));

        let mut fired = 0;
        for i in 0..5 {
            let now = start + Duration::from_millis(i * 25);
            debouncer.signal_at(now);
            if debouncer.poll_at(now) {
                fired += 1;
            }
        }
        // Poll every 10ms for a second.
        for step in 0..100 {
            if debouncer.poll_at(start + Duration::from_millis(100 + step * 10)) {
                fired += 1;
            }
        }
        assert_eq!(fired, 1);
    }

    #[test]
    fn test_fires_only_after_quiet_period() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(Duration::from_millis(300));
        debouncer.signal_at(start);
        debouncer.signal_at(start + Duration::from_millis(100));

        assert!(!debouncer.poll_at(start + Duration::from_millis(350)));
        assert!(debouncer.poll_at(start + Duration::from_millis(400)));
        assert!(!debouncer.is_pending());
    }

    #[test]
    fn test_cancel() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(Duration::from_millis(300));
        debouncer.signal_at(start);
        debouncer.cancel();
        assert!(!debouncer.poll_at(start + Duration::from_secs(1)));
    }
}
