use std::time::{Duration, Instant};

/// Drives capture cadence off a monotonic clock (spec §4.3).
///
/// `should_emit_now` is a gate, not a scheduler: callers poll it on their own
/// loop (typically tied to the external video source's readiness) and only
/// pull a frame when it returns `true`.
pub struct CapturePacer {
    target_interval: Duration,
    last_emit: Option<Instant>,
}

impl CapturePacer {
    #[must_use]
    pub fn new(target_fps: u32) -> Self {
        Self {
            target_interval: target_interval_for_fps(target_fps),
            last_emit: None,
        }
    }

    /// Returns `true` if a frame should be captured now. The very first call
    /// always emits.
    pub fn should_emit_now(&mut self, now: Instant) -> bool {
        let should_emit = match self.last_emit {
            None => true,
            Some(last) => now.saturating_duration_since(last).as_secs_f64()
                >= 0.95 * self.target_interval.as_secs_f64(),
        };
        if should_emit {
            self.last_emit = Some(now);
        }
        should_emit
    }

    pub fn set_target_fps(&mut self, target_fps: u32) {
        self.target_interval = target_interval_for_fps(target_fps);
    }
}

fn target_interval_for_fps(target_fps: u32) -> Duration {
    Duration::from_secs_f64(1.0 / f64::from(target_fps.max(1)))
}
