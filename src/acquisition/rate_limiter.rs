//! Coalescing of "new data" notifications.

use std::time::{Duration, Instant};

/// Accepts at most one update per interval; notifications inside the interval are
/// dropped. The clock restarts on every accepted update.
#[derive(Debug, Clone)]
pub struct UpdateLimiter {
    interval: Duration,
    last_accepted: Option<Instant>,
}

impl UpdateLimiter {
    /// Limiter with the given minimum interval.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_accepted: None,
        }
    }

    /// Minimum interval between accepted updates.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Should an update happen now?
    pub fn should_update(&mut self) -> bool {
        self.should_update_at(Instant::now())
    }

    /// Should an update happen at `now`? Accepting restarts the interval.
    pub fn should_update_at(&mut self, now: Instant) -> bool {
        match self.last_accepted {
            Some(last) if now.saturating_duration_since(last) <= self.interval => false,
            _ => {
                self.last_accepted = Some(now);
                true
            }
        }
    }

    /// Forget the last accepted update so the next one is accepted.
    pub fn reset(&mut self) {
        self.last_accepted = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coalesces_bursts() {
        let mut limiter = UpdateLimiter::new(Duration::from_millis(100));
        let t0 = Instant::now();
        assert!(limiter.should_update_at(t0));
        assert!(!limiter.should_update_at(t0 + Duration::from_millis(40)));
        assert!(!limiter.should_update_at(t0 + Duration::from_millis(100)));
        assert!(limiter.should_update_at(t0 + Duration::from_millis(101)));
        // interval restarts from the accepted tick
        assert!(!limiter.should_update_at(t0 + Duration::from_millis(150)));
    }

    #[test]
    fn test_reset() {
        let mut limiter = UpdateLimiter::new(Duration::from_secs(60));
        assert!(limiter.should_update());
        assert!(!limiter.should_update());
        limiter.reset();
        assert!(limiter.should_update());
    }
}
