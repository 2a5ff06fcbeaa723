use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Sliding window over which transient decode errors are counted (spec
/// §4.6: "1-second count").
const ERROR_WINDOW: Duration = Duration::from_secs(1);

/// Errors within [`ERROR_WINDOW`] at or above this count trip
/// [`DecodeSignal::ErrorThreshold`] (spec §4.6: "e.g. 5", configurable per
/// §9 Open Questions).
const DEFAULT_ERROR_THRESHOLD: u32 = 5;

/// Bounded submission slots, scaled to target rate (spec §4.6: "2 slots at
/// 60 fps, 3 at 120 fps").
#[must_use]
pub fn submission_limit_for(target_fps: u32) -> u32 {
    match target_fps {
        120.. => 3,
        _ => 2,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("decoder has {in_flight} submissions outstanding, at its limit of {limit}")]
    SubmissionLimitReached { in_flight: u32, limit: u32 },
}

/// A fault or health signal raised by [`DecoderSession`] bookkeeping, mapped
/// by the owning stream controller onto recovery actions (spec §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeSignal {
    /// Transient decode error count exceeded the threshold within the
    /// sliding window. Controller maps this to a keyframe request plus a
    /// reassembler reset.
    ErrorThreshold { count: u32 },
    /// A dimension change was inferred from a decoded image. Controller
    /// resets the reassembler's expected dimension token.
    DimensionChange,
    /// Decoder is in keyframe-only mode with no successful decode since —
    /// considered unhealthy ("input blocking").
    InputBlocked,
}

/// Submission admission and decode-error accounting for a single stream's
/// decoder (spec §4.6). Owns no hardware state; the hardware decoder itself
/// is an external collaborator reached through [`crate::HardwareDecoder`].
pub struct DecoderSession {
    submission_limit: u32,
    in_flight: u32,
    error_threshold: u32,
    recent_errors: VecDeque<Instant>,
    keyframe_only_since: Option<Instant>,
    last_decode: Option<Instant>,
}

impl DecoderSession {
    #[must_use]
    pub fn new(target_fps: u32) -> Self {
        Self {
            submission_limit: submission_limit_for(target_fps),
            in_flight: 0,
            error_threshold: DEFAULT_ERROR_THRESHOLD,
            recent_errors: VecDeque::new(),
            keyframe_only_since: None,
            last_decode: None,
        }
    }

    #[must_use]
    pub fn with_error_threshold(mut self, error_threshold: u32) -> Self {
        self.error_threshold = error_threshold;
        self
    }

    pub fn set_target_fps(&mut self, target_fps: u32) {
        self.submission_limit = submission_limit_for(target_fps);
    }

    #[must_use]
    pub fn in_flight(&self) -> u32 {
        self.in_flight
    }

    /// Admit one submission to the hardware decoder (spec §4.6 submission
    /// semaphore).
    pub fn admit(&mut self) -> Result<(), DecodeError> {
        if self.in_flight >= self.submission_limit {
            return Err(DecodeError::SubmissionLimitReached {
                in_flight: self.in_flight,
                limit: self.submission_limit,
            });
        }
        self.in_flight += 1;
        Ok(())
    }

    /// Release a submission slot once the hardware decoder returns (success
    /// or error) for a previously admitted frame.
    pub fn release(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
    }

    /// Record a successfully decoded frame, clearing the input-blocked
    /// condition.
    pub fn record_decode_success(&mut self, now: Instant) {
        self.last_decode = Some(now);
    }

    /// Record a transient decode error; returns [`DecodeSignal::ErrorThreshold`]
    /// if the sliding-window count has just reached the threshold.
    pub fn record_error(&mut self, now: Instant) -> Option<DecodeSignal> {
        self.recent_errors.push_back(now);
        while let Some(&front) = self.recent_errors.front() {
            if now.saturating_duration_since(front) > ERROR_WINDOW {
                self.recent_errors.pop_front();
            } else {
                break;
            }
        }

        let count = self.recent_errors.len() as u32;
        if count == self.error_threshold {
            tracing::warn!(count, threshold = self.error_threshold, "decode error threshold reached");
            return Some(DecodeSignal::ErrorThreshold { count });
        }
        None
    }

    /// A dimension change was inferred from decoded output (spec §4.6).
    #[must_use]
    pub fn dimension_change_detected(&self) -> DecodeSignal {
        DecodeSignal::DimensionChange
    }

    /// Notify the session that the reassembler entered keyframe-only mode,
    /// starting the input-blocking clock.
    pub fn on_keyframe_only_mode_entered(&mut self, now: Instant) {
        self.keyframe_only_since.get_or_insert(now);
    }

    /// Notify the session that keyframe-only mode was exited.
    pub fn on_keyframe_only_mode_exited(&mut self) {
        self.keyframe_only_since = None;
    }

    /// Whether the decoder is unhealthy: in keyframe-only mode with no
    /// successful decode since that mode began (spec §4.6 "input
    /// blocking").
    #[must_use]
    pub fn is_input_blocked(&self) -> bool {
        match self.keyframe_only_since {
            None => false,
            Some(since) => match self.last_decode {
                None => true,
                Some(last) => last < since,
            },
        }
    }
}
