use std::sync::{Arc, Mutex};
use std::time::Instant;

use mirage_decode::{DecodeSignal, DecodedImage};
use mirage_present::PresentationEntry;
use mirage_types::DimensionToken;
use mirage_wire::FrameHeader;

use crate::controller::{ControllerSignal, FeedPacketOutcome, StreamController};
use crate::resize::ResizeEvent;

/// Shared inner state between the handle and whichever task owns mutation.
type Shared = Arc<Mutex<StreamController>>;

fn lock(shared: &Shared) -> std::sync::MutexGuard<'_, StreamController> {
    shared.lock().unwrap_or_else(|e| {
        tracing::warn!("stream controller: mutex was poisoned, recovering");
        e.into_inner()
    })
}

/// Cheaply `Clone`-able handle onto a [`StreamController`], mirroring the
/// teacher's `EgfxBridge`/`EgfxController` split: the controller itself owns
/// no task, so every method here just locks, mutates, and returns.
#[derive(Clone)]
pub struct StreamControllerHandle {
    shared: Shared,
}

impl StreamControllerHandle {
    #[must_use]
    pub fn new(now: Instant) -> Self {
        Self { shared: Arc::new(Mutex::new(StreamController::new(now))) }
    }

    #[must_use]
    pub fn from_controller(controller: StreamController) -> Self {
        Self { shared: Arc::new(Mutex::new(controller)) }
    }

    pub fn set_expected_dimension_token(&self, token: DimensionToken) {
        lock(&self.shared).set_expected_dimension_token(token);
    }

    pub fn feed_packet(&self, header: &FrameHeader, payload: &[u8], now: Instant) -> FeedPacketOutcome {
        lock(&self.shared).feed_packet(header, payload, now)
    }

    pub fn on_decoded(&self, image: DecodedImage, now: Instant) -> Vec<ControllerSignal> {
        lock(&self.shared).on_decoded(image, now)
    }

    pub fn on_decode_signal(&self, signal: DecodeSignal, now: Instant) -> Vec<ControllerSignal> {
        lock(&self.shared).on_decode_signal(signal, now)
    }

    pub fn dequeue(&self) -> Option<PresentationEntry> {
        lock(&self.shared).dequeue()
    }

    pub fn drawable_size_changed(&self, pixel_size: (u32, u32), scale: f32, now: Instant) {
        lock(&self.shared).drawable_size_changed(pixel_size, scale, now);
    }

    pub fn confirm_resize(&self, final_size: (u32, u32), now: Instant) {
        lock(&self.shared).confirm_resize(final_size, now);
    }

    pub fn tick(&self, now: Instant) -> Vec<ControllerSignal> {
        lock(&self.shared).tick(now)
    }

    pub fn apply_full_reset(&self, now: Instant) {
        lock(&self.shared).apply_full_reset(now);
    }

    #[must_use]
    pub fn presentation_depth(&self) -> usize {
        lock(&self.shared).presentation_depth()
    }
}

/// Resolve a [`ControllerSignal::Resize`] payload, if any, out of a signal
/// batch. Convenience for callers that only care about the resize target.
#[must_use]
pub fn resize_target(signals: &[ControllerSignal]) -> Option<ResizeEvent> {
    signals.iter().find_map(|s| match s {
        ControllerSignal::Resize(event) => Some(*event),
        _ => None,
    })
}
