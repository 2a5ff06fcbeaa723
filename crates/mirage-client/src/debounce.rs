use std::time::{Duration, Instant};

/// A single-shot rate gate: `try_fire` returns `true` at most once per
/// `interval`, used throughout the recovery taxonomy (spec §4.8) to keep a
/// flapping signal (keyframe requests, backpressure, adaptive fallback)
/// from firing more often than its cooldown allows.
#[derive(Debug, Clone, Copy)]
pub struct Debounce {
    interval: Duration,
    last_fired: Option<Instant>,
}

impl Debounce {
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_fired: None,
        }
    }

    /// Returns `true` if `interval` has elapsed since the last successful
    /// fire (or this is the first call), recording `now` as the new
    /// last-fired time in that case.
    pub fn try_fire(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last_fired {
            if now.saturating_duration_since(last) < self.interval {
                return false;
            }
        }
        self.last_fired = Some(now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_once_then_withholds_until_interval_elapses() {
        let mut d = Debounce::new(Duration::from_millis(500));
        let t0 = Instant::now();
        assert!(d.try_fire(t0));
        assert!(!d.try_fire(t0 + Duration::from_millis(100)));
        assert!(d.try_fire(t0 + Duration::from_millis(500)));
    }
}
