use std::time::{Duration, Instant};

/// Fixed cadence the watchdog expects to be ticked at (spec §4.3).
pub const TICK_INTERVAL: Duration = Duration::from_millis(50);

/// Frame-gap threshold: no complete-frame delivery within this window marks
/// the encoder "in fallback mode" (spec §4.3, by target rate).
#[must_use]
pub fn frame_gap_threshold(target_fps: u32) -> Duration {
    match target_fps {
        120.. => Duration::from_millis(180),
        60..=119 => Duration::from_millis(300),
        30..=59 => Duration::from_millis(500),
        _ => Duration::from_millis(1500),
    }
}

/// Stall threshold: no delivery within this window emits a single
/// `capture_stall` signal (spec §4.3, by target rate).
#[must_use]
pub fn stall_threshold(target_fps: u32) -> Duration {
    match target_fps {
        120.. => Duration::from_millis(2500),
        60..=119 => Duration::from_millis(2000),
        30..=59 => Duration::from_millis(2500),
        _ => Duration::from_millis(4000),
    }
}

/// Fallback durations shorter than this are normal latency, not a reference
/// frame validity concern, and don't trigger a keyframe request.
const KEYFRAME_ON_RECOVERY_THRESHOLD: Duration = Duration::from_millis(200);

/// A signal raised by [`Watchdog::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogSignal {
    /// No delivery for `frame_gap_threshold`; encoder considered in fallback.
    EnteredFallback,
    /// No delivery for `stall_threshold`; a restart should be requested.
    CaptureStall { gap: Duration },
}

/// Classifies delivery state on a fixed 50ms cadence (spec §4.3).
pub struct Watchdog {
    target_fps: u32,
    last_delivery: Instant,
    in_fallback_mode: bool,
    fallback_since: Option<Instant>,
    stall_signal_pending: bool,
}

impl Watchdog {
    #[must_use]
    pub fn new(target_fps: u32, now: Instant) -> Self {
        Self {
            target_fps,
            last_delivery: now,
            in_fallback_mode: false,
            fallback_since: None,
            stall_signal_pending: false,
        }
    }

    pub fn set_target_fps(&mut self, target_fps: u32) {
        self.target_fps = target_fps;
    }

    /// Called on the fixed watchdog cadence; returns a signal if the
    /// delivery gap has just crossed a threshold.
    pub fn tick(&mut self, now: Instant) -> Option<WatchdogSignal> {
        let gap = now.saturating_duration_since(self.last_delivery);

        if gap >= stall_threshold(self.target_fps) && !self.stall_signal_pending {
            self.stall_signal_pending = true;
            tracing::warn!(?gap, target_fps = self.target_fps, "capture stall detected");
            return Some(WatchdogSignal::CaptureStall { gap });
        }

        if gap >= frame_gap_threshold(self.target_fps) && !self.in_fallback_mode {
            self.in_fallback_mode = true;
            self.fallback_since = Some(self.last_delivery);
            tracing::debug!(?gap, "capture entering fallback mode");
            return Some(WatchdogSignal::EnteredFallback);
        }

        None
    }

    /// Record a successfully delivered complete frame. Returns `true` if the
    /// encoder should be asked to emit a keyframe because the just-ended
    /// fallback window exceeded the recovery threshold.
    pub fn on_frame_delivered(&mut self, now: Instant) -> bool {
        self.last_delivery = now;
        self.stall_signal_pending = false;

        let Some(since) = self.fallback_since.take() else {
            return false;
        };
        self.in_fallback_mode = false;
        now.saturating_duration_since(since) > KEYFRAME_ON_RECOVERY_THRESHOLD
    }

    #[must_use]
    pub fn in_fallback_mode(&self) -> bool {
        self.in_fallback_mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholds_scale_with_target_rate() {
        assert_eq!(frame_gap_threshold(144), Duration::from_millis(180));
        assert_eq!(frame_gap_threshold(60), Duration::from_millis(300));
        assert_eq!(frame_gap_threshold(30), Duration::from_millis(500));
        assert_eq!(frame_gap_threshold(15), Duration::from_millis(1500));
        assert_eq!(stall_threshold(144), Duration::from_millis(2500));
        assert_eq!(stall_threshold(60), Duration::from_millis(2000));
        assert_eq!(stall_threshold(30), Duration::from_millis(2500));
        assert_eq!(stall_threshold(15), Duration::from_millis(4000));
    }

    #[test]
    fn enters_fallback_then_stalls_once() {
        let t0 = Instant::now();
        let mut wd = Watchdog::new(60, t0);

        assert_eq!(wd.tick(t0 + Duration::from_millis(300)), Some(WatchdogSignal::EnteredFallback));
        assert!(wd.in_fallback_mode());

        // Already in fallback mode, ticking again before stall threshold
        // produces nothing.
        assert_eq!(wd.tick(t0 + Duration::from_millis(600)), None);

        let stall_at = t0 + Duration::from_millis(2000);
        match wd.tick(stall_at) {
            Some(WatchdogSignal::CaptureStall { gap }) => assert_eq!(gap, Duration::from_millis(2000)),
            other => panic!("expected CaptureStall, got {other:?}"),
        }

        // A second tick past the threshold does not repeat the signal.
        assert_eq!(wd.tick(t0 + Duration::from_millis(2050)), None);
    }

    #[test]
    fn short_fallback_recovery_does_not_request_keyframe() {
        let t0 = Instant::now();
        let mut wd = Watchdog::new(60, t0);
        wd.tick(t0 + Duration::from_millis(300));
        assert!(wd.in_fallback_mode());

        let needs_keyframe = wd.on_frame_delivered(t0 + Duration::from_millis(350));
        assert!(!needs_keyframe);
        assert!(!wd.in_fallback_mode());
    }

    #[test]
    fn long_fallback_recovery_requests_keyframe() {
        let t0 = Instant::now();
        let mut wd = Watchdog::new(60, t0);
        wd.tick(t0 + Duration::from_millis(300));

        let needs_keyframe = wd.on_frame_delivered(t0 + Duration::from_millis(600));
        assert!(needs_keyframe);
        assert!(!wd.in_fallback_mode());
    }

    #[test]
    fn on_frame_delivered_clears_stall_pending() {
        let t0 = Instant::now();
        let mut wd = Watchdog::new(60, t0);
        wd.tick(t0 + Duration::from_millis(2000));
        wd.on_frame_delivered(t0 + Duration::from_millis(2010));

        // After recovery, the gap clock restarts; ticking shortly after
        // should not immediately re-signal a stall.
        assert_eq!(wd.tick(t0 + Duration::from_millis(2060)), None);
    }
}
