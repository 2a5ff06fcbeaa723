//! Wire codec for the mirage stream pipeline: the fixed 61-byte frame
//! header, its flags, and CRC32 payload validation (spec §4.1).

mod crc;
mod cursor;
mod error;
mod flags;
mod header;

pub use crc::{checksum, validate};
pub use error::HeaderError;
pub use flags::FrameFlags;
pub use header::{FrameHeader, DEFAULT_MAX_PACKET_SIZE, HEADER_LEN, MAGIC, VERSION};

/// Maximum payload bytes per datagram for a given `max_packet_size`.
#[must_use]
pub fn payload_capacity(max_packet_size: usize) -> usize {
    max_packet_size.saturating_sub(HEADER_LEN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_payload_capacity() {
        assert_eq!(payload_capacity(DEFAULT_MAX_PACKET_SIZE), 1200 - HEADER_LEN);
    }
}
