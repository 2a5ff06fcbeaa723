use std::time::{Duration, Instant};

use mirage_capture::{
    frame_gap_threshold, stall_threshold, CaptureSink, CaptureSource, CaptureSourceError, CapturePacer,
    CapturedFrame, RestartDecision, RestartPolicy, Watchdog, WatchdogSignal,
};
use mirage_crypto::SessionKey;
use mirage_encode::{ChangeClassification, EncoderConfig, EncoderSession, HardwareEncodeError, HardwareEncoder};
use mirage_sender::{DropReason, PacketSender, PumpEvent, WorkItem};
use mirage_types::{DimensionToken, Epoch, Generation, StreamId, StreamMetricsSnapshot};
use tokio::sync::mpsc;

use crate::config::HostConfig;
use crate::scale::resolve_stream_scale;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    #[error("capture source failed to start: {0}")]
    CaptureStartFailed(CaptureSourceError),
    #[error("hardware encoder rejected a frame: {0}")]
    EncodeFailed(HardwareEncodeError),
}

/// A signal the stream owner should act on: reschedule the capture source
/// or propagate a fatal error up to `StreamStopped` (spec §4.3, §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostSignal {
    /// The watchdog declared a capture stall; the owner should stop and,
    /// after `backoff`, restart the capture source out-of-band (spec
    /// §4.3). `escalate` mirrors what this context already applied to its
    /// own encoder/sender state (epoch bump, reset-style keyframe).
    RestartScheduled { backoff: Duration, escalate: bool },
    /// An unrecoverable encoder fault; the owner should tear the stream
    /// down and emit `StreamStopped(error)` (spec §7 `fatal`).
    Fatal,
}

/// Host-side stream context (spec §4.9): composes the capture pacer,
/// watchdog, restart policy, encoder session, and packet sender for one
/// active stream. Owns no task itself — the owner drives it by forwarding
/// captured frames and ticking the watchdog on a steady cadence, mirroring
/// [`mirage_decode::DecoderFeeder`]'s sync-core/async-wrapper split.
pub struct StreamContext {
    stream_id: StreamId,
    capture: Box<dyn CaptureSource>,
    encoder: Box<dyn HardwareEncoder>,
    encoder_session: EncoderSession,
    pacer: CapturePacer,
    watchdog: Watchdog,
    restart_policy: RestartPolicy,
    sender: PacketSender,
    base_size: (u32, u32),
    stream_scale: f32,
    uncapped_scale: bool,
    target_frame_rate: u32,
    dimension_token: DimensionToken,
    epoch: Epoch,
    is_resizing: bool,
    encoding_allowed: bool,
    next_frame_number: u32,
    next_sequence: u32,
    metrics: StreamMetricsSnapshot,
}

impl StreamContext {
    /// Create the encoder session at `base_size` scaled by the config's
    /// `stream_scale`, and preheat it (spec §4.9 `start`, first half: the
    /// session is created but encoding is held off until
    /// [`Self::allow_encoding_after_registration`] is called).
    #[must_use]
    pub fn create(
        stream_id: StreamId,
        config: &HostConfig,
        capture: Box<dyn CaptureSource>,
        encoder: Box<dyn HardwareEncoder>,
        base_size: (u32, u32),
        master_secret: &[u8],
        now: Instant,
    ) -> Self {
        let stream_scale = config.encode.stream_scale;
        let uncapped_scale = config.encode.uncapped_scale;
        let (width, height) = resolve_stream_scale(base_size, stream_scale, uncapped_scale);
        let target_frame_rate = config.capture.target_frame_rate;

        let encoder_config = EncoderConfig {
            width,
            height,
            frame_rate: target_frame_rate,
            bitrate_kbps: config.encode.bitrate_kbps,
            pixel_format: config.encode.pixel_format.into(),
            color_space: config.encode.color_space.into(),
            key_frame_interval: config.encode.key_frame_interval,
        };
        let encoder_session = EncoderSession::create(encoder_config);

        let session_key = config
            .sender
            .media_encryption_enabled
            .then(|| SessionKey::derive(master_secret, stream_id));
        let mut sender = PacketSender::new(
            stream_id,
            config.encode.bitrate_kbps,
            config.sender.burst_capacity_bytes,
            session_key,
            now,
        );
        sender.set_max_packet_size(config.sender.max_packet_size);

        tracing::info!(stream_id = stream_id.get(), width, height, target_frame_rate, "stream context created");

        Self {
            stream_id,
            capture,
            encoder,
            encoder_session,
            pacer: CapturePacer::new(target_frame_rate),
            watchdog: Watchdog::new(target_frame_rate, now),
            restart_policy: RestartPolicy::new(),
            sender,
            base_size,
            stream_scale,
            uncapped_scale,
            target_frame_rate,
            dimension_token: DimensionToken::new(0),
            epoch: Epoch::new(0),
            is_resizing: false,
            encoding_allowed: false,
            next_frame_number: 0,
            next_sequence: 0,
            metrics: StreamMetricsSnapshot::new(),
        }
    }

    #[must_use]
    pub fn output_dimensions(&self) -> (u32, u32) {
        let cfg = self.encoder_session.config();
        (cfg.width, cfg.height)
    }

    #[must_use]
    pub fn dimension_token(&self) -> DimensionToken {
        self.dimension_token
    }

    #[must_use]
    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    #[must_use]
    pub fn generation(&self) -> Generation {
        self.sender.generation()
    }

    #[must_use]
    pub fn metrics(&self) -> StreamMetricsSnapshot {
        self.metrics
    }

    #[must_use]
    pub fn is_resizing(&self) -> bool {
        self.is_resizing
    }

    #[must_use]
    pub fn is_encoding_allowed(&self) -> bool {
        self.encoding_allowed
    }

    /// Start the capture source, handing it a sink the owner drains
    /// (spec §4.9 `start`, second half). Encoding itself stays gated
    /// until registration is observed.
    pub fn start(&mut self) -> Result<mpsc::UnboundedReceiver<CapturedFrame>, HostError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.capture
            .start(CaptureSink::new(tx))
            .map_err(HostError::CaptureStartFailed)?;
        Ok(rx)
    }

    /// The client has completed UDP registration; frames may now flow
    /// (spec §4.9, §6).
    pub fn allow_encoding_after_registration(&mut self) {
        tracing::info!(stream_id = self.stream_id.get(), "registration observed, encoding enabled");
        self.encoding_allowed = true;
    }

    /// Feed one frame delivered by the capture source through the pacer
    /// and encoder (spec §4.3, §4.4, §4.9). Returns `None` when the frame
    /// is silently dropped (encoding not yet allowed, paced out, or the
    /// encoder is at its in-flight limit — spec §7 `encoder_busy`).
    pub fn on_captured_frame(&mut self, frame: CapturedFrame, now: Instant) -> Result<Option<HostSignal>, HostError> {
        if !self.encoding_allowed || !self.pacer.should_emit_now(now) {
            return Ok(None);
        }

        if self.watchdog.on_frame_delivered(now) {
            tracing::debug!(stream_id = self.stream_id.get(), "long fallback recovered: forcing keyframe");
            self.encoder_session.force_keyframe(false);
        }

        let Ok(admission) = self.encoder_session.admit() else {
            tracing::trace!(stream_id = self.stream_id.get(), "encoder at in-flight limit: dropping frame");
            return Ok(None);
        };

        let result = self.encoder.encode(&frame, admission.must_be_keyframe);
        self.encoder_session.release();

        let encoded = result.map_err(HostError::EncodeFailed)?;
        self.enqueue_encoded(encoded);
        Ok(None)
    }

    fn enqueue_encoded(&mut self, encoded: mirage_encode::EncodedFrame) {
        let capacity = mirage_wire::payload_capacity(self.sender.max_packet_size()).max(1);
        let fragment_count = encoded.data.len().div_ceil(capacity).max(1) as u32;

        let frame_number = self.next_frame_number;
        self.next_frame_number = self.next_frame_number.wrapping_add(1);
        let sequence_start = self.next_sequence;
        self.next_sequence = self.next_sequence.wrapping_add(fragment_count);

        self.sender.enqueue(WorkItem {
            frame_number,
            generation: self.sender.generation(),
            sequence_start,
            dimension_token: self.dimension_token,
            epoch: self.epoch,
            content_rect: encoded.content_rect,
            timestamp_ns: encoded.pts_ns,
            keyframe: encoded.is_keyframe,
            payload: encoded.data,
        });
    }

    /// Pump the rate-limited send queue, recording dropped frames toward
    /// diagnostics (spec §4.5, §7 `send_overrun`).
    pub fn pump_sender(&mut self, now: Instant) -> Vec<PumpEvent> {
        let events = self.sender.pump(now);
        for event in &events {
            if let PumpEvent::Dropped { reason: DropReason::RateLimitedNonKeyframe, .. } = event {
                self.metrics.record_queue_drops(1);
            }
        }
        events
    }

    /// Tick the watchdog on its fixed 50ms cadence (spec §4.3). On a
    /// capture stall, applies the restart policy's decision locally
    /// (keyframe forcing, epoch bump on escalation, generation bump) and
    /// returns a signal telling the owner to actually restart the capture
    /// source after the computed backoff.
    pub fn tick_watchdog(&mut self, now: Instant) -> Option<HostSignal> {
        match self.watchdog.tick(now) {
            Some(WatchdogSignal::EnteredFallback) => None,
            Some(WatchdogSignal::CaptureStall { .. }) => {
                self.metrics.record_capture_stall();
                let RestartDecision { backoff, escalate, streak } = self.restart_policy.record_restart(now);
                tracing::warn!(stream_id = self.stream_id.get(), streak, escalate, "capture stall: scheduling restart");
                self.encoder_session.force_keyframe(escalate);
                if escalate {
                    self.epoch = self.epoch.next();
                    self.sender.bump_generation("capture restart escalation");
                }
                Some(HostSignal::RestartScheduled { backoff, escalate })
            }
            None => None,
        }
    }

    fn apply_resize(&mut self, width: u32, height: u32) {
        self.is_resizing = true;
        self.dimension_token = self.dimension_token.next();
        self.sender.bump_generation("dimension change");

        let classification = self.encoder_session.update_dimensions(width, height);
        tracing::info!(
            stream_id = self.stream_id.get(),
            width,
            height,
            ?classification,
            "stream output dimensions updated"
        );
        self.encoder_session.force_keyframe(false);
        self.is_resizing = false;
    }

    /// The capture source's native resolution changed (spec §4.9
    /// `update_dimensions`).
    pub fn update_dimensions(&mut self, width: u32, height: u32) {
        self.apply_resize(width, height);
    }

    /// The client requested a `ResolutionChange` (spec §4.9
    /// `update_resolution`, §6).
    pub fn update_resolution(&mut self, width: u32, height: u32) {
        self.apply_resize(width, height);
    }

    /// The client requested a `StreamScaleChange` (spec §4.9
    /// `update_stream_scale`): re-resolve output dimensions from the base
    /// capture size and the new scale, then apply as a resize.
    pub fn update_stream_scale(&mut self, scale: f32) {
        self.stream_scale = scale;
        let (width, height) = resolve_stream_scale(self.base_size, scale, self.uncapped_scale);
        self.apply_resize(width, height);
    }

    pub fn update_frame_rate(&mut self, frame_rate: u32) {
        self.target_frame_rate = frame_rate;
        self.pacer.set_target_fps(frame_rate);
        self.watchdog.set_target_fps(frame_rate);
        let classification = self.encoder_session.update_frame_rate(frame_rate);
        tracing::info!(stream_id = self.stream_id.get(), frame_rate, ?classification, "frame rate updated");
    }

    pub fn update_bitrate(&mut self, bitrate_kbps: u32) {
        let classification = self.encoder_session.update_bitrate_only(bitrate_kbps);
        debug_assert_eq!(classification, ChangeClassification::CheapInPlaceUpdate);
        self.sender.set_target_bitrate_kbps(bitrate_kbps);
    }

    pub fn request_keyframe(&mut self) {
        self.encoder_session.force_keyframe(false);
    }

    /// Stop capture, drain the sender, and stop the encoder (spec §4.9
    /// `stop`). Returns how many still-queued items were discarded
    /// unsent.
    pub fn stop(&mut self) -> usize {
        tracing::info!(stream_id = self.stream_id.get(), "stopping stream context");
        self.capture.stop();
        let dropped = self.sender.drain();
        self.encoder.stop();
        dropped
    }
}

/// Thresholds the watchdog currently applies, exposed for diagnostics and
/// tests without reaching into `mirage_capture` directly.
#[must_use]
pub fn watchdog_thresholds(target_fps: u32) -> (Duration, Duration) {
    (frame_gap_threshold(target_fps), stall_threshold(target_fps))
}
