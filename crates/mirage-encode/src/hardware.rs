use mirage_capture::CapturedFrame;

use crate::session::EncodedFrame;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum HardwareEncodeError {
    #[error("hardware encoder rejected the frame")]
    Rejected,
}

/// Abstract hardware encoder contract (spec §9 "Unsafe bridges" pattern):
/// the real VAAPI/NVENC/software encoder lives outside this core. Mirrors
/// [`mirage_decode::HardwareDecoder`]'s shape on the opposite end of the
/// pipeline.
pub trait HardwareEncoder: Send {
    /// Encode one captured frame. `force_keyframe` is `true` when
    /// [`crate::EncoderSession::admit`] determined this frame must be an
    /// IDR (cadence, forced, or start-of-session).
    fn encode(
        &mut self,
        frame: &CapturedFrame,
        force_keyframe: bool,
    ) -> Result<EncodedFrame, HardwareEncodeError>;

    fn stop(&mut self);
}
