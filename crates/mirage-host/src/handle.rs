use std::sync::{Arc, Mutex};
use std::time::Instant;

use mirage_capture::{CaptureSource, CapturedFrame, CaptureSourceError};
use mirage_encode::HardwareEncoder;
use mirage_sender::PumpEvent;
use mirage_types::{DimensionToken, Epoch, Generation, StreamId, StreamMetricsSnapshot};
use tokio::sync::mpsc;

use crate::config::HostConfig;
use crate::context::{HostError, HostSignal, StreamContext};

type Shared = Arc<Mutex<StreamContext>>;

fn lock(shared: &Shared) -> std::sync::MutexGuard<'_, StreamContext> {
    shared.lock().unwrap_or_else(|e| {
        tracing::warn!("stream context: mutex was poisoned, recovering");
        e.into_inner()
    })
}

/// Cheaply `Clone`-able handle onto a [`StreamContext`], mirroring
/// [`mirage_client::StreamControllerHandle`]: the context owns no task
/// itself, so every method here just locks, mutates, and returns.
#[derive(Clone)]
pub struct StreamContextHandle {
    shared: Shared,
}

impl StreamContextHandle {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        stream_id: StreamId,
        config: &HostConfig,
        capture: Box<dyn CaptureSource>,
        encoder: Box<dyn HardwareEncoder>,
        base_size: (u32, u32),
        master_secret: &[u8],
        now: Instant,
    ) -> Self {
        let context = StreamContext::create(stream_id, config, capture, encoder, base_size, master_secret, now);
        Self { shared: Arc::new(Mutex::new(context)) }
    }

    pub fn start(&self) -> Result<mpsc::UnboundedReceiver<CapturedFrame>, HostError> {
        lock(&self.shared).start()
    }

    pub fn allow_encoding_after_registration(&self) {
        lock(&self.shared).allow_encoding_after_registration();
    }

    pub fn on_captured_frame(&self, frame: CapturedFrame, now: Instant) -> Result<Option<HostSignal>, HostError> {
        lock(&self.shared).on_captured_frame(frame, now)
    }

    pub fn pump_sender(&self, now: Instant) -> Vec<PumpEvent> {
        lock(&self.shared).pump_sender(now)
    }

    pub fn tick_watchdog(&self, now: Instant) -> Option<HostSignal> {
        lock(&self.shared).tick_watchdog(now)
    }

    pub fn update_dimensions(&self, width: u32, height: u32) {
        lock(&self.shared).update_dimensions(width, height);
    }

    pub fn update_resolution(&self, width: u32, height: u32) {
        lock(&self.shared).update_resolution(width, height);
    }

    pub fn update_stream_scale(&self, scale: f32) {
        lock(&self.shared).update_stream_scale(scale);
    }

    pub fn update_frame_rate(&self, frame_rate: u32) {
        lock(&self.shared).update_frame_rate(frame_rate);
    }

    pub fn update_bitrate(&self, bitrate_kbps: u32) {
        lock(&self.shared).update_bitrate(bitrate_kbps);
    }

    pub fn request_keyframe(&self) {
        lock(&self.shared).request_keyframe();
    }

    pub fn stop(&self) -> usize {
        lock(&self.shared).stop()
    }

    #[must_use]
    pub fn output_dimensions(&self) -> (u32, u32) {
        lock(&self.shared).output_dimensions()
    }

    #[must_use]
    pub fn dimension_token(&self) -> DimensionToken {
        lock(&self.shared).dimension_token()
    }

    #[must_use]
    pub fn epoch(&self) -> Epoch {
        lock(&self.shared).epoch()
    }

    #[must_use]
    pub fn generation(&self) -> Generation {
        lock(&self.shared).generation()
    }

    #[must_use]
    pub fn metrics(&self) -> StreamMetricsSnapshot {
        lock(&self.shared).metrics()
    }

    #[must_use]
    pub fn is_resizing(&self) -> bool {
        lock(&self.shared).is_resizing()
    }

    #[must_use]
    pub fn is_encoding_allowed(&self) -> bool {
        lock(&self.shared).is_encoding_allowed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mirage_encode::{EncodedFrame, HardwareEncodeError};
    use mirage_types::ContentRect;

    struct NullCapture;
    impl CaptureSource for NullCapture {
        fn start(&mut self, _sink: mirage_capture::CaptureSink) -> Result<(), CaptureSourceError> {
            Ok(())
        }
        fn stop(&mut self) {}
    }

    struct PassthroughEncoder;
    impl HardwareEncoder for PassthroughEncoder {
        fn encode(&mut self, frame: &CapturedFrame, force_keyframe: bool) -> Result<EncodedFrame, HardwareEncodeError> {
            Ok(EncodedFrame {
                data: frame.data.clone(),
                is_keyframe: force_keyframe,
                pts_ns: frame.timestamp_ns,
                content_rect: ContentRect::full_frame(),
            })
        }
        fn stop(&mut self) {}
    }

    #[test]
    fn handle_clones_share_state() {
        let now = Instant::now();
        let config = HostConfig::default();
        let handle = StreamContextHandle::create(
            StreamId::from(1),
            &config,
            Box::new(NullCapture),
            Box::new(PassthroughEncoder),
            (1920, 1080),
            b"test secret",
            now,
        );
        let clone = handle.clone();
        clone.allow_encoding_after_registration();
        assert!(handle.is_encoding_allowed());
    }
}
