/// Error taxonomy shared across the pipeline (spec §7).
///
/// Every variant except [`ErrorKind::Fatal`] is recovered locally by the
/// component that owns it, leaving a counter or metric; `Fatal` propagates
/// to the stream owner, which tears the stream down and emits
/// `StreamStopped(error)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ErrorKind {
    /// Bad magic/version/CRC. Dropped silently; counted for diagnostics.
    #[error("malformed packet")]
    MalformedPacket,

    /// Frame carries a dimension token other than the one currently
    /// expected. Dropped, no counter escalation.
    #[error("stale dimension token")]
    StaleDimension,

    /// Frame carries an epoch older than the one currently observed.
    /// Dropped, no counter escalation.
    #[error("stale epoch")]
    StaleEpoch,

    /// Counted; threshold triggers keyframe request + reassembler reset.
    #[error("decode error")]
    DecodeError,

    /// Signaled once per stall window; triggers restart with backoff.
    #[error("capture stall")]
    CaptureStall,

    /// In-flight limit reached; frame dropped at the capture pacer.
    #[error("encoder busy")]
    EncoderBusy,

    /// Sender dropped non-keyframe frames under sustained rate-limit
    /// pressure.
    #[error("send overrun")]
    SendOverrun,

    /// Encoder/decoder create failure or unrecoverable session state.
    #[error("fatal pipeline error")]
    Fatal,
}

impl ErrorKind {
    /// Whether this error kind must propagate to the stream owner.
    #[must_use]
    pub fn is_fatal(self) -> bool {
        matches!(self, Self::Fatal)
    }
}
