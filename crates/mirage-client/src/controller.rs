use std::time::{Duration, Instant};

use mirage_decode::{DecodeSignal, DecodeWorkItem, DecodedImage};
use mirage_present::{EnqueueOutcome, PresentationEntry, PresentationQueue};
use mirage_reassembly::{IngestOutcome, Reassembler};
use mirage_types::DimensionToken;
use mirage_wire::FrameHeader;

use crate::debounce::Debounce;
use crate::freeze::{FreezeMonitor, FreezeSignal};
use crate::overload::OverloadAccountant;
use crate::resize::{ResizeController, ResizeEvent};

/// At most one keyframe request is dispatched within any window this wide,
/// regardless of which recovery path triggered it (spec §4.8, invariant 9).
pub const KEYFRAME_DEBOUNCE: Duration = Duration::from_millis(500);

/// Cooldown specific to backpressure-triggered keyframe requests, separate
/// from the shared [`KEYFRAME_DEBOUNCE`] (spec §4.8).
pub const BACKPRESSURE_COOLDOWN: Duration = Duration::from_secs(1);

/// Cooldown between freeze-recovery attempts (spec §5: "freeze recovery
/// (3 s)").
pub const FREEZE_RECOVERY_COOLDOWN: Duration = Duration::from_secs(3);

/// Default duration of no presentation progress before input is considered
/// blocked. Not pinned by the spec text; hand-tuned per §9 and exposed as
/// configurable via [`crate::ClientConfig`].
pub const DEFAULT_FREEZE_TIMEOUT: Duration = Duration::from_millis(1500);

/// Presentation queue depth above which backpressure is considered active.
/// Deliberately below the present queue's own harder emergency-trim arm
/// depth (9) so backpressure recovery has a chance to act first.
pub const DEFAULT_BACKPRESSURE_SOFT_LIMIT: usize = 6;

/// A signal the owner (host-facing control-channel plumbing) should act on:
/// dispatch a control-plane message, or reinitialize local pipeline state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerSignal {
    /// Send `KeyframeRequest(streamID)` on the control channel.
    KeyframeRequest,
    /// Tear down and reinitialize the decoder, reassembler, and
    /// presentation queue for this stream.
    FullReset,
    /// Step bitrate down per the adaptive-fallback policy (spec §4.8).
    AdaptiveFallback,
    /// Send a `ResolutionChange` with the given target size.
    Resize(ResizeEvent),
}

/// Outcome of [`StreamController::feed_packet`].
#[derive(Debug)]
pub struct FeedPacketOutcome {
    /// Present when a frame completed reassembly and should be submitted to
    /// the decoder feeder, in the order returned (spec §4.8 "Frame
    /// pipeline": consumption must stay strictly ordered).
    pub decode_item: Option<DecodeWorkItem>,
    pub signals: Vec<ControllerSignal>,
}

/// Client-side stream controller (spec §4.8): owns the reassembler,
/// presentation queue, resize state machine, freeze monitor, and overload
/// accountant for one stream, and maps their raw observations onto the
/// recovery taxonomy's debounced signals.
pub struct StreamController {
    reassembler: Reassembler,
    presentation: PresentationQueue,
    resize: ResizeController,
    freeze: FreezeMonitor,
    overload: OverloadAccountant,
    keyframe_debounce: Debounce,
    backpressure_cooldown: Debounce,
    backpressure_soft_limit: usize,
}

impl StreamController {
    #[must_use]
    pub fn new(now: Instant) -> Self {
        Self::with_freeze_timeout(DEFAULT_FREEZE_TIMEOUT, now)
    }

    #[must_use]
    pub fn with_freeze_timeout(freeze_timeout: Duration, now: Instant) -> Self {
        Self {
            reassembler: Reassembler::new(),
            presentation: PresentationQueue::new(),
            resize: ResizeController::new(now),
            freeze: FreezeMonitor::new(freeze_timeout, FREEZE_RECOVERY_COOLDOWN, now),
            overload: OverloadAccountant::new(
                crate::overload::DEFAULT_WINDOW,
                crate::overload::DEFAULT_SIGNAL_COOLDOWN,
            ),
            keyframe_debounce: Debounce::new(KEYFRAME_DEBOUNCE),
            backpressure_cooldown: Debounce::new(BACKPRESSURE_COOLDOWN),
            backpressure_soft_limit: DEFAULT_BACKPRESSURE_SOFT_LIMIT,
        }
    }

    #[must_use]
    pub fn presentation_depth(&self) -> usize {
        self.presentation.depth()
    }

    #[must_use]
    pub fn in_keyframe_only_mode(&self) -> bool {
        self.reassembler.in_keyframe_only_mode()
    }

    /// Seed the reassembler's expected dimension token, e.g. from a
    /// `StreamStarted` control message (spec §6).
    pub fn set_expected_dimension_token(&mut self, token: DimensionToken) {
        self.reassembler.update_expected_dimension_token(token);
    }

    /// Try to dispatch a keyframe request through the shared debounce,
    /// recording it with the overload accountant either way so repeated
    /// *attempts* still count toward adaptive fallback even when debounced.
    fn request_keyframe(&mut self, now: Instant, signals: &mut Vec<ControllerSignal>) {
        self.overload.record_recovery_request(now);
        if self.keyframe_debounce.try_fire(now) {
            signals.push(ControllerSignal::KeyframeRequest);
        }
    }

    /// Feed one received datagram's header and (already decrypted) payload
    /// through the reassembler (spec §4.8 `feed_packet`).
    pub fn feed_packet(&mut self, header: &FrameHeader, payload: &[u8], now: Instant) -> FeedPacketOutcome {
        let mut signals = Vec::new();

        let outcome = self.reassembler.ingest(header, payload, now);
        let decode_item = match outcome {
            IngestOutcome::Dropped(_) | IngestOutcome::Pending => None,
            IngestOutcome::Complete(frame) => Some(DecodeWorkItem {
                frame_number: frame.frame_number,
                data: frame.data,
                presentation_time_ns: frame.timestamp_ns,
                is_keyframe: frame.keyframe,
                content_rect: frame.content_rect,
            }),
        };

        FeedPacketOutcome { decode_item, signals }
    }

    /// Feed a successfully decoded image into the presentation queue,
    /// updating the freeze monitor, backpressure check, and overload
    /// accounting (spec §4.7, §4.8).
    pub fn on_decoded(&mut self, image: DecodedImage, now: Instant) -> Vec<ControllerSignal> {
        let mut signals = Vec::new();
        let frame_number = u64::from(image.frame_number);

        match self.presentation.enqueue(image) {
            EnqueueOutcome::Appended => {}
            EnqueueOutcome::Trimmed { dropped } => {
                for _ in 0..dropped {
                    self.overload.record_queue_drop(now);
                }
            }
        }

        // A successful decode is forward progress regardless of whether the
        // entry survives an emergency trim: the stream is not frozen.
        self.freeze.record_progress(frame_number, now);

        if self.presentation.depth() > self.backpressure_soft_limit && self.backpressure_cooldown.try_fire(now) {
            self.request_keyframe(now, &mut signals);
        }

        if self.overload.check(now) {
            signals.push(ControllerSignal::AdaptiveFallback);
        }

        signals
    }

    /// Pull the oldest presentation entry for rendering (spec §4.7
    /// `dequeue`).
    pub fn dequeue(&mut self) -> Option<PresentationEntry> {
        self.presentation.dequeue()
    }

    /// Map a signal raised by the decoder session (spec §4.6) onto the
    /// recovery taxonomy.
    pub fn on_decode_signal(&mut self, signal: DecodeSignal, now: Instant) -> Vec<ControllerSignal> {
        let mut signals = Vec::new();
        match signal {
            DecodeSignal::ErrorThreshold { count } => {
                tracing::warn!(count, "decode error threshold: resetting reassembler, requesting keyframe");
                self.overload.record_decode_threshold_event(now);
                self.reassembler.enter_keyframe_only_mode(now);
                self.request_keyframe(now, &mut signals);
            }
            DecodeSignal::DimensionChange => {
                self.reassembler.enter_keyframe_only_mode(now);
            }
            DecodeSignal::InputBlocked => {
                self.request_keyframe(now, &mut signals);
            }
        }

        if self.overload.check(now) {
            signals.push(ControllerSignal::AdaptiveFallback);
        }
        signals
    }

    /// Notify the resize state machine of a new drawable pixel size (spec
    /// §4.8 `drawable_size_changed`).
    pub fn drawable_size_changed(&mut self, pixel_size: (u32, u32), scale: f32, now: Instant) {
        self.resize.drawable_size_changed(pixel_size, scale, now);
    }

    /// Host confirmed the resolution it actually negotiated (spec §4.8
    /// `confirm_resize`).
    pub fn confirm_resize(&mut self, final_size: (u32, u32), now: Instant) {
        self.resize.confirm_resize(final_size, now);
    }

    /// Periodic tick: garbage-collects stale reassembler fragments, resolves
    /// due resize debounces, and evaluates the freeze monitor. Should be
    /// called on a steady cadence (e.g. alongside the capture watchdog's
    /// 50 ms tick, spec §4.3).
    pub fn tick(&mut self, now: Instant) -> Vec<ControllerSignal> {
        let mut signals = Vec::new();

        if self.reassembler.garbage_collect(now) {
            self.request_keyframe(now, &mut signals);
        }

        if let Some(event) = self.resize.tick(now) {
            signals.push(ControllerSignal::Resize(event));
        }

        let pending = self.reassembler.pending_len() > 0;
        match self.freeze.tick(now, pending) {
            Some(FreezeSignal::KeyframeRequest) => self.request_keyframe(now, &mut signals),
            Some(FreezeSignal::FullReset) => signals.push(ControllerSignal::FullReset),
            None => {}
        }

        if self.overload.check(now) {
            signals.push(ControllerSignal::AdaptiveFallback);
        }

        signals
    }

    /// Tear down and reinitialize the reassembler and presentation queue in
    /// place, e.g. in response to [`ControllerSignal::FullReset`]. The
    /// decoder itself is reinitialized by the owner (external hardware
    /// resource, spec §9).
    pub fn apply_full_reset(&mut self, now: Instant) {
        tracing::warn!("stream controller: applying full reset");
        self.reassembler = Reassembler::new();
        self.presentation = PresentationQueue::new();
        self.freeze = FreezeMonitor::new(DEFAULT_FREEZE_TIMEOUT, FREEZE_RECOVERY_COOLDOWN, now);
    }
}
