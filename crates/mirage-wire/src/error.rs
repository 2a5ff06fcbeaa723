/// Failures from parsing a frame header off the wire.
///
/// Per spec §4.1, a magic or version mismatch is a hard failure (the caller
/// should treat the datagram as not-ours and stop processing it); a CRC
/// mismatch on the payload is a silent drop handled one layer up, once the
/// payload bytes are available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum HeaderError {
    #[error("buffer too short for a frame header: need {expected}, got {actual}")]
    TooShort { expected: usize, actual: usize },

    #[error("magic mismatch: expected {expected:#010x}, got {actual:#010x}")]
    BadMagic { expected: u32, actual: u32 },

    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u8),
}
