// Restart delays for listeners that tear down and rebind their socket

use std::time::Duration;

pub const INITIAL_DELAY: Duration = Duration::from_millis(50);
pub const MAX_DELAY: Duration = Duration::from_secs(5);

/// Doubling delay, capped, reset once a session has been healthy long enough
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    next: Duration,
    failures: u32,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(INITIAL_DELAY, MAX_DELAY)
    }
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            next: initial,
            failures: 0,
        }
    }

    /// Record a failure and return how long to wait before the next attempt
    pub fn fail(&mut self) -> Duration {
        let delay = self.next;
        self.next = (self.next * 2).min(self.max);
        self.failures += 1;
        delay
    }

    /// A session that lasted at least the cap counts as healthy
    pub fn session_ended(&mut self, lasted: Duration) {
        if lasted >= self.max {
            self.reset();
        }
    }

    pub fn reset(&mut self) {
        self.next = self.initial;
        self.failures = 0;
    }

    /// Failures since the last reset
    pub fn failures(&self) -> u32 {
        self.failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doubles_up_to_cap() {
        let mut backoff = Backoff::new(Duration::from_millis(50), Duration::from_millis(300));
        let delays: Vec<u64> = (0..6).map(|_| backoff.fail().as_millis() as u64).collect();
        assert_eq!(delays, vec![50, 100, 200, 300, 300, 300]);
        assert_eq!(backoff.failures(), 6);
    }

    #[test]
    fn test_short_session_keeps_backing_off() {
        let mut backoff = Backoff::default();
        backoff.fail();
        backoff.fail();
        backoff.session_ended(Duration::from_millis(10));
        assert_eq!(backoff.fail(), INITIAL_DELAY * 4);
    }

    #[test]
    fn test_healthy_session_resets() {
        let mut backoff = Backoff::default();
        for _ in 0..10 {
            backoff.fail();
        }
        backoff.session_ended(MAX_DELAY);
        assert_eq!(backoff.failures(), 0);
        assert_eq!(backoff.fail(), INITIAL_DELAY);
    }
}
