use std::sync::Arc;
use std::time::{Duration, Instant};

use mirage_capture::{CaptureSink, CaptureSource, CaptureSourceError, CapturedFrame};
use mirage_decode::{DecodeWorkItem, DecodedImage, HardwareDecoder};
use mirage_encode::{EncodedFrame, HardwareEncodeError, HardwareEncoder};
use mirage_types::ContentRect;

/// Software capture source standing in for a platform ScreenCast/PipeWire
/// pipeline (spec §9 "Unsafe bridges"): emits synthetic frames of solid,
/// slowly-cycling color on a timer, entirely in-process.
pub struct SyntheticCapture {
    width: u32,
    height: u32,
    target_fps: u32,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl SyntheticCapture {
    #[must_use]
    pub fn new(width: u32, height: u32, target_fps: u32) -> Self {
        Self { width, height, target_fps, task: None }
    }
}

impl CaptureSource for SyntheticCapture {
    fn start(&mut self, sink: CaptureSink) -> Result<(), CaptureSourceError> {
        let width = self.width;
        let height = self.height;
        let period = Duration::from_secs_f64(1.0 / f64::from(self.target_fps.max(1)));
        let frame_bytes = (width * height * 4) as usize;

        let task = tokio::spawn(async move {
            let start = Instant::now();
            let mut interval = tokio::time::interval(period);
            let mut tick: u8 = 0;
            loop {
                interval.tick().await;
                let data = vec![tick; frame_bytes];
                let timestamp_ns = start.elapsed().as_nanos() as u64;
                if !sink.deliver(CapturedFrame { data, width, height, timestamp_ns }) {
                    break;
                }
                tick = tick.wrapping_add(1);
            }
        });
        self.task = Some(task);
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Software "encoder" that passes the captured bytes straight through,
/// tagging keyframes exactly as [`mirage_encode::EncoderSession`] directs.
/// Stands in for VAAPI/NVENC/software H.264 (spec §9).
pub struct PassthroughEncoder;

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

/// Software "decoder" mirroring [`PassthroughEncoder`] on the client side:
/// treats the reassembled bytes as already-decoded pixels.
pub struct PassthroughDecoder {
    width: u32,
    height: u32,
}

impl PassthroughDecoder {
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl HardwareDecoder for PassthroughDecoder {
    fn submit(&mut self, item: &DecodeWorkItem) -> Result<DecodedImage, mirage_decode::FaultKind> {
        Ok(DecodedImage {
            frame_number: item.frame_number,
            width: self.width,
            height: self.height,
            presentation_time_ns: item.presentation_time_ns,
            content_rect: item.content_rect,
            pixels: Arc::from(item.data.clone().into_boxed_slice()),
        })
    }

    fn stop(&mut self) {}
}
