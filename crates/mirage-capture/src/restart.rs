use std::time::{Duration, Instant};

/// Consecutive-restart window: restarts outside this window don't count
/// toward the backoff streak (spec §4.3).
const RESET_WINDOW: Duration = Duration::from_secs(20);

/// Backoff schedule by streak position, capped at the last entry.
const BACKOFF_SCHEDULE: [Duration; 3] = [
    Duration::from_secs(3),
    Duration::from_secs(6),
    Duration::from_secs(12),
];
const BACKOFF_CAP: Duration = Duration::from_secs(18);

/// A streak of 3 or more consecutive restarts escalates to an epoch bump.
const ESCALATION_STREAK: u32 = 3;

/// Outcome of [`RestartPolicy::record_restart`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartDecision {
    pub backoff: Duration,
    /// If `true`, the encoder should bump epoch, flush in-flight frames, and
    /// force a reset-style keyframe. If `false`, only a flush-style keyframe
    /// is requested, with no epoch change.
    pub escalate: bool,
    pub streak: u32,
}

/// Tracks a stream's consecutive capture-restart streak and computes
/// exponential backoff with escalation (spec §4.3).
pub struct RestartPolicy {
    streak: u32,
    last_restart: Option<Instant>,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl RestartPolicy {
    #[must_use]
    pub fn new() -> Self {
        Self {
            streak: 0,
            last_restart: None,
        }
    }

    /// Record a restart triggered by a stall signal and return the backoff
    /// cooldown and whether this streak escalates to an epoch bump.
    pub fn record_restart(&mut self, now: Instant) -> RestartDecision {
        let within_window = self
            .last_restart
            .is_some_and(|last| now.saturating_duration_since(last) < RESET_WINDOW);

        self.streak = if within_window { self.streak + 1 } else { 1 };
        self.last_restart = Some(now);

        let backoff = BACKOFF_SCHEDULE
            .get((self.streak - 1) as usize)
            .copied()
            .unwrap_or(BACKOFF_CAP);
        let escalate = self.streak >= ESCALATION_STREAK;

        tracing::info!(streak = self.streak, ?backoff, escalate, "capture restart scheduled");

        RestartDecision {
            backoff,
            escalate,
            streak: self.streak,
        }
    }

    #[must_use]
    pub fn streak(&self) -> u32 {
        self.streak
    }
}
