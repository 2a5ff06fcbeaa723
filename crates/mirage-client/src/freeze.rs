use std::time::{Duration, Instant};

/// Consecutive freeze recoveries at or above this streak escalate to a full
/// session reset rather than another keyframe request (spec §4.8).
const ESCALATION_STREAK: u32 = 3;

/// Outcome of [`FreezeMonitor::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreezeSignal {
    /// Presentation has stalled; request a keyframe.
    KeyframeRequest,
    /// Third consecutive recovery attempt within cooldown; the owner should
    /// tear down and reinitialize decoder + reassembler + pipeline.
    FullReset,
}

/// Detects presentation stalls and escalates repeated freezes to a full
/// session reset (spec §4.8 "Freeze").
///
/// "No progress" is tracked by the caller feeding in the latest presentation
/// sequence number on every successful enqueue; the monitor itself only
/// measures elapsed time since the last observed advance.
pub struct FreezeMonitor {
    freeze_timeout: Duration,
    recovery_cooldown: Duration,
    last_progress: Instant,
    last_sequence: Option<u64>,
    consecutive_recoveries: u32,
    last_recovery: Option<Instant>,
}

impl FreezeMonitor {
    #[must_use]
    pub fn new(freeze_timeout: Duration, recovery_cooldown: Duration, now: Instant) -> Self {
        Self {
            freeze_timeout,
            recovery_cooldown,
            last_progress: now,
            last_sequence: None,
            consecutive_recoveries: 0,
            last_recovery: None,
        }
    }

    /// Record that the presentation sequence advanced to `sequence`. Resets
    /// the stall clock and, if this is genuine forward progress (not a
    /// repeat of the last-seen sequence), clears the escalation streak.
    pub fn record_progress(&mut self, sequence: u64, now: Instant) {
        if self.last_sequence != Some(sequence) {
            self.last_sequence = Some(sequence);
            self.last_progress = now;
            self.consecutive_recoveries = 0;
        }
    }

    /// Evaluate the freeze condition. `pending_frames` reflects whether the
    /// reassembler currently has frames in flight — a stall with nothing
    /// pending is just an idle stream, not a freeze.
    pub fn tick(&mut self, now: Instant, pending_frames: bool) -> Option<FreezeSignal> {
        if !pending_frames {
            return None;
        }
        if now.saturating_duration_since(self.last_progress) < self.freeze_timeout {
            return None;
        }
        if let Some(last) = self.last_recovery {
            if now.saturating_duration_since(last) < self.recovery_cooldown {
                return None;
            }
        }

        self.last_recovery = Some(now);
        self.consecutive_recoveries += 1;

        if self.consecutive_recoveries >= ESCALATION_STREAK {
            tracing::warn!(
                streak = self.consecutive_recoveries,
                "freeze recovery escalating to full session reset"
            );
            self.consecutive_recoveries = 0;
            Some(FreezeSignal::FullReset)
        } else {
            tracing::debug!(streak = self.consecutive_recoveries, "freeze detected, requesting keyframe");
            Some(FreezeSignal::KeyframeRequest)
        }
    }
}
