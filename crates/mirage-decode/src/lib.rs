//! Single-threaded FIFO decoder feeder, submission admission, and
//! decode-error accounting (spec §4.6).

mod feeder;
mod session;

pub use feeder::{spawn_feeder, DecodeWorkItem, DecodedImage, DecoderFeeder, FeedOutcome, HardwareDecoder};
pub use session::{submission_limit_for, DecodeError, DecodeSignal, DecoderSession};

/// Why a hardware decode submission failed. The hardware decoder itself is
/// an external collaborator (spec §9); this taxonomy is the minimum the
/// session needs to classify errors as transient vs. a dimension change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// A transient decode error (corrupt bitstream, missing reference).
    /// Counted toward the 1-second error threshold.
    Transient,
    /// The decoded image's dimensions differ from what was expected.
    DimensionChange,
}
