use tokio::sync::mpsc;

/// A single captured video frame handed from the external capture source to
/// the pacer (spec §3, §9 "Unsafe bridges"; grounded in the teacher's own
/// `rdp_capture::frame::CapturedFrame`).
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    /// Raw pixel data in the encoder's configured pixel format.
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp_ns: u64,
}

/// Cheaply `Clone`-able sink the capture source delivers frames through.
/// `deliver` must never block: spec §5 requires the capture-delivery
/// callback (called synchronously by the platform capture source) to copy
/// the payload into an owned buffer and enqueue it, nothing more.
#[derive(Clone)]
pub struct CaptureSink {
    tx: mpsc::UnboundedSender<CapturedFrame>,
}

impl CaptureSink {
    #[must_use]
    pub fn new(tx: mpsc::UnboundedSender<CapturedFrame>) -> Self {
        Self { tx }
    }

    /// Returns `false` if the owning pacer has stopped listening.
    pub fn deliver(&self, frame: CapturedFrame) -> bool {
        self.tx.send(frame).is_ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CaptureSourceError {
    #[error("capture source failed to start")]
    StartFailed,
}

/// Abstract external video source (spec §9 "Unsafe bridges to private OS
/// display APIs"): a platform ScreenCast/PipeWire/virtual-display pipeline
/// lives behind this trait. The core depends only on `start`/`stop`.
pub trait CaptureSource: Send {
    fn start(&mut self, sink: CaptureSink) -> Result<(), CaptureSourceError>;
    fn stop(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullSource;
    impl CaptureSource for NullSource {
        fn start(&mut self, _sink: CaptureSink) -> Result<(), CaptureSourceError> {
            Ok(())
        }
        fn stop(&mut self) {}
    }

    #[test]
    fn sink_delivery_fails_once_receiver_dropped() {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = CaptureSink::new(tx);
        drop(rx);
        assert!(!sink.deliver(CapturedFrame { data: vec![], width: 1, height: 1, timestamp_ns: 0 }));
    }

    #[test]
    fn trait_object_is_object_safe() {
        let mut source: Box<dyn CaptureSource> = Box::new(NullSource);
        let (tx, _rx) = mpsc::unbounded_channel();
        assert!(source.start(CaptureSink::new(tx)).is_ok());
        source.stop();
    }
}
