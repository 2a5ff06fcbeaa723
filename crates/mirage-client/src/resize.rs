use std::time::{Duration, Instant};

/// Longest side cap a resolved drawable size is clamped to, aspect preserved
/// (spec §4.8, matching the host-side cap in §4.9).
const MAX_WIDTH: f64 = 5120.0;
const MAX_HEIGHT: f64 = 2880.0;

/// Debounce between successive drawable-size-changed notifications before a
/// resize is actually negotiated (spec §4.8).
pub const RESIZE_DEBOUNCE: Duration = Duration::from_millis(200);

/// If no `confirm_resize` arrives within this long of entering `awaiting`,
/// the state machine falls back to `idle` rather than hanging forever (spec
/// §4.8, §5 "timeouts on resize confirmation (2s)").
pub const RESIZE_FALLBACK_TIMEOUT: Duration = Duration::from_secs(2);

/// Tail a confirmed resize lingers before returning to `idle`, giving the
/// renderer time to pick up the new size (spec §4.8).
pub const CONFIRM_TAIL: Duration = Duration::from_millis(50);

/// Smallest aspect-ratio or scale delta worth renegotiating over (spec
/// §4.8: "differs by more than 0.01").
const CHANGE_THRESHOLD: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeState {
    Idle,
    Awaiting { expected: (u32, u32) },
    Confirmed { final_size: (u32, u32) },
}

/// A negotiated size change the caller should send as a
/// [`mirage_transport::ControlMessage::ResolutionChange`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeEvent {
    pub width: u32,
    pub height: u32,
}

/// Clamp a raw pixel size to [`MAX_WIDTH`]x[`MAX_HEIGHT`] preserving aspect,
/// then round to the nearest even pixel in both dimensions (spec §4.8, §8
/// worked example: 6000x3750 at 16:10 resolves to 4608x2880).
#[must_use]
pub fn clamp_and_align(width: u32, height: u32) -> (u32, u32) {
    let w = f64::from(width.max(1));
    let h = f64::from(height.max(1));
    let factor = (MAX_WIDTH / w).min(MAX_HEIGHT / h).min(1.0);
    let target_w = (w * factor).round() as u32;
    let target_h = (h * factor).round() as u32;
    (align_even(target_w), align_even(target_h))
}

fn align_even(v: u32) -> u32 {
    let v = v.max(2);
    if v % 2 == 0 {
        v
    } else {
        v - 1
    }
}

/// Resolve the negotiated stream size from a drawable's raw pixel size and a
/// per-stream relative scale, clamped to 1.0 (spec §4.8).
#[must_use]
pub fn resolve_target(pixel_size: (u32, u32), scale: f32) -> (u32, u32) {
    let scale = f64::from(scale.clamp(0.0, 1.0));
    let w = (f64::from(pixel_size.0) * scale).round() as u32;
    let h = (f64::from(pixel_size.1) * scale).round() as u32;
    clamp_and_align(w.max(1), h.max(1))
}

fn aspect(size: (u32, u32)) -> f64 {
    f64::from(size.0) / f64::from(size.1.max(1))
}

/// Client-side resize state machine (spec §4.8): debounces drawable-size
/// notifications, resolves a clamped target size, and tracks
/// awaiting/confirmed/idle transitions with their own timeouts.
pub struct ResizeController {
    state: ResizeState,
    state_since: Instant,
    last_sent: Option<(u32, u32)>,
    pending_debounce: Option<(Instant, (u32, u32), f32)>,
    seen_first_size: bool,
}

impl ResizeController {
    #[must_use]
    pub fn new(now: Instant) -> Self {
        Self {
            state: ResizeState::Idle,
            state_since: now,
            last_sent: None,
            pending_debounce: None,
            seen_first_size: false,
        }
    }

    #[must_use]
    pub fn state(&self) -> ResizeState {
        self.state
    }

    /// Notify the controller of a new drawable pixel size and relative
    /// scale. The very first call seeds the expected size directly
    /// (establishing the stream's initial dimensions); later calls are
    /// debounced by [`RESIZE_DEBOUNCE`] before a target is resolved.
    pub fn drawable_size_changed(&mut self, pixel_size: (u32, u32), scale: f32, now: Instant) {
        if !self.seen_first_size {
            self.seen_first_size = true;
            self.last_sent = Some(pixel_size);
            return;
        }
        self.pending_debounce = Some((now, pixel_size, scale));
    }

    /// Client confirmed the resolution the host actually negotiated
    /// (possibly clamped further by the host's own caps).
    pub fn confirm_resize(&mut self, final_size: (u32, u32), now: Instant) {
        if matches!(self.state, ResizeState::Awaiting { .. }) {
            self.state = ResizeState::Confirmed { final_size };
            self.state_since = now;
        }
    }

    /// Periodic tick: resolves due debounces and expires stale
    /// awaiting/confirmed states. Returns a [`ResizeEvent`] to dispatch if
    /// the debounce just resolved into a materially different target size.
    pub fn tick(&mut self, now: Instant) -> Option<ResizeEvent> {
        let mut event = None;

        if let Some((armed_at, pixel_size, scale)) = self.pending_debounce {
            if now.saturating_duration_since(armed_at) >= RESIZE_DEBOUNCE {
                self.pending_debounce = None;
                let target = resolve_target(pixel_size, scale);
                if self.materially_different(target) {
                    self.last_sent = Some(target);
                    self.state = ResizeState::Awaiting { expected: target };
                    self.state_since = now;
                    event = Some(ResizeEvent { width: target.0, height: target.1 });
                }
            }
        }

        match self.state {
            ResizeState::Awaiting { .. } if now.saturating_duration_since(self.state_since) >= RESIZE_FALLBACK_TIMEOUT => {
                self.state = ResizeState::Idle;
            }
            ResizeState::Confirmed { .. } if now.saturating_duration_since(self.state_since) >= CONFIRM_TAIL => {
                self.state = ResizeState::Idle;
            }
            _ => {}
        }

        event
    }

    fn materially_different(&self, target: (u32, u32)) -> bool {
        match self.last_sent {
            None => true,
            Some(last) => {
                let pixel_delta = last != target;
                let aspect_delta = (aspect(target) - aspect(last)).abs() > CHANGE_THRESHOLD;
                let scale_delta = {
                    let last_scale = f64::from(last.0) / f64::from(target.0.max(1));
                    (last_scale - 1.0).abs() > CHANGE_THRESHOLD
                };
                pixel_delta || aspect_delta || scale_delta
            }
        }
    }
}
