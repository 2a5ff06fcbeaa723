use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Sliding window over which overload observations accumulate (spec §4.8).
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(3);

/// Queue-drop count threshold for the drops+recoveries branch of the
/// adaptive-fallback condition (spec §4.8: "≥ 12 queue drops and ≥ 2
/// recovery requests"). Hand-tuned per spec §9, kept configurable.
const DEFAULT_DROP_THRESHOLD: u32 = 12;
/// Recovery-request threshold paired with [`DEFAULT_DROP_THRESHOLD`].
const DEFAULT_RECOVERY_THRESHOLD: u32 = 2;
/// Decode-threshold-event count that alone fires adaptive fallback (spec
/// §4.8: "OR ≥ 2 decode-threshold events").
const DEFAULT_DECODE_THRESHOLD_EVENTS: u32 = 2;

/// Cooldown between successive adaptive-fallback signals (spec §4.8:
/// "cooldown between signals"). Hand-tuned per §9.
pub const DEFAULT_SIGNAL_COOLDOWN: Duration = Duration::from_secs(5);

/// Accumulates a 3-second sliding window of overload observations (queue
/// drops, decode-error-threshold events, recovery requests) and decides when
/// to fire the adaptive-fallback signal that steps bitrate down (spec §4.8).
pub struct OverloadAccountant {
    window: Duration,
    drop_threshold: u32,
    recovery_threshold: u32,
    decode_threshold_events_threshold: u32,
    signal_cooldown: Duration,
    queue_drops: VecDeque<Instant>,
    decode_threshold_events: VecDeque<Instant>,
    recovery_requests: VecDeque<Instant>,
    last_signal: Option<Instant>,
}

impl OverloadAccountant {
    #[must_use]
    pub fn new(window: Duration, signal_cooldown: Duration) -> Self {
        Self {
            window,
            drop_threshold: DEFAULT_DROP_THRESHOLD,
            recovery_threshold: DEFAULT_RECOVERY_THRESHOLD,
            decode_threshold_events_threshold: DEFAULT_DECODE_THRESHOLD_EVENTS,
            signal_cooldown,
            queue_drops: VecDeque::new(),
            decode_threshold_events: VecDeque::new(),
            recovery_requests: VecDeque::new(),
            last_signal: None,
        }
    }

    pub fn record_queue_drop(&mut self, now: Instant) {
        self.queue_drops.push_back(now);
    }

    pub fn record_decode_threshold_event(&mut self, now: Instant) {
        self.decode_threshold_events.push_back(now);
    }

    pub fn record_recovery_request(&mut self, now: Instant) {
        self.recovery_requests.push_back(now);
    }

    fn prune(&mut self, now: Instant) {
        let window = self.window;
        let cutoff = |queue: &mut VecDeque<Instant>| {
            while let Some(&front) = queue.front() {
                if now.saturating_duration_since(front) > window {
                    queue.pop_front();
                } else {
                    break;
                }
            }
        };
        cutoff(&mut self.queue_drops);
        cutoff(&mut self.decode_threshold_events);
        cutoff(&mut self.recovery_requests);
    }

    /// Evaluate whether the adaptive-fallback signal should fire now. Prunes
    /// stale observations first, then checks both branches of the
    /// condition, subject to the signal cooldown.
    pub fn check(&mut self, now: Instant) -> bool {
        self.prune(now);

        if let Some(last) = self.last_signal {
            if now.saturating_duration_since(last) < self.signal_cooldown {
                return false;
            }
        }

        let drop_branch = self.queue_drops.len() as u32 >= self.drop_threshold
            && self.recovery_requests.len() as u32 >= self.recovery_threshold;
        let decode_branch =
            self.decode_threshold_events.len() as u32 >= self.decode_threshold_events_threshold;

        let fires = drop_branch || decode_branch;
        if fires {
            tracing::info!(
                queue_drops = self.queue_drops.len(),
                recovery_requests = self.recovery_requests.len(),
                decode_threshold_events = self.decode_threshold_events.len(),
                "adaptive fallback signal"
            );
            self.last_signal = Some(now);
        }
        fires
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_on_drops_and_recoveries_branch() {
        let mut acc = OverloadAccountant::new(DEFAULT_WINDOW, DEFAULT_SIGNAL_COOLDOWN);
        let t0 = Instant::now();
        for i in 0..12 {
            acc.record_queue_drop(t0 + Duration::from_millis(i));
        }
        acc.record_recovery_request(t0);
        acc.record_recovery_request(t0 + Duration::from_millis(1));
        assert!(acc.check(t0 + Duration::from_millis(100)));
    }

    #[test]
    fn does_not_fire_below_drop_count() {
        let mut acc = OverloadAccountant::new(DEFAULT_WINDOW, DEFAULT_SIGNAL_COOLDOWN);
        let t0 = Instant::now();
        for i in 0..11 {
            acc.record_queue_drop(t0 + Duration::from_millis(i));
        }
        acc.record_recovery_request(t0);
        acc.record_recovery_request(t0 + Duration::from_millis(1));
        assert!(!acc.check(t0 + Duration::from_millis(100)));
    }

    #[test]
    fn fires_on_decode_threshold_events_alone() {
        let mut acc = OverloadAccountant::new(DEFAULT_WINDOW, DEFAULT_SIGNAL_COOLDOWN);
        let t0 = Instant::now();
        acc.record_decode_threshold_event(t0);
        acc.record_decode_threshold_event(t0 + Duration::from_millis(10));
        assert!(acc.check(t0 + Duration::from_millis(20)));
    }

    #[test]
    fn observations_outside_window_are_pruned() {
        let mut acc = OverloadAccountant::new(DEFAULT_WINDOW, DEFAULT_SIGNAL_COOLDOWN);
        let t0 = Instant::now();
        for i in 0..12 {
            acc.record_queue_drop(t0 + Duration::from_millis(i));
        }
        acc.record_recovery_request(t0);
        acc.record_recovery_request(t0 + Duration::from_millis(1));

        let later = t0 + DEFAULT_WINDOW + Duration::from_secs(1);
        assert!(!acc.check(later));
    }

    #[test]
    fn cooldown_withholds_repeat_signal() {
        let mut acc = OverloadAccountant::new(DEFAULT_WINDOW, DEFAULT_SIGNAL_COOLDOWN);
        let t0 = Instant::now();
        acc.record_decode_threshold_event(t0);
        acc.record_decode_threshold_event(t0 + Duration::from_millis(1));
        assert!(acc.check(t0 + Duration::from_millis(2)));

        acc.record_decode_threshold_event(t0 + Duration::from_millis(10));
        acc.record_decode_threshold_event(t0 + Duration::from_millis(11));
        assert!(!acc.check(t0 + Duration::from_millis(12)));
    }
}
