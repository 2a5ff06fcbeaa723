use mirage_types::{ContentRect, DimensionToken, Epoch, StreamId};

use crate::cursor::{ReadCursor, WriteCursor};
use crate::error::HeaderError;
use crate::flags::FrameFlags;

/// Protocol magic: ASCII "MIRG" (spec §6: `0x4D495247`).
pub const MAGIC: u32 = 0x4D49_5247;

/// Current wire protocol version.
pub const VERSION: u8 = 1;

/// Serialized header size in bytes (spec §4.1).
pub const HEADER_LEN: usize = 61;

/// Default maximum UDP datagram size, chosen to stay under the IPv6
/// minimum MTU (spec §4.1).
pub const DEFAULT_MAX_PACKET_SIZE: usize = 1200;

/// The fixed 61-byte frame header, field order and byte order exactly as
/// specified in spec §3/§4.1. Always little-endian on the wire regardless
/// of host endianness (spec §9).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameHeader {
    pub version: u8,
    pub flags: FrameFlags,
    pub stream_id: StreamId,
    pub sequence: u32,
    pub timestamp_ns: u64,
    pub frame_number: u32,
    pub fragment_index: u16,
    pub fragment_count: u16,
    pub payload_length: u32,
    pub frame_byte_count: u32,
    pub checksum: u32,
    pub content_rect: ContentRect,
    pub dimension_token: DimensionToken,
    pub epoch: Epoch,
}

impl FrameHeader {
    /// Serialize into exactly [`HEADER_LEN`] bytes, in declared field order.
    #[must_use]
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut buf = Vec::with_capacity(HEADER_LEN);
        let mut cursor = WriteCursor::new(&mut buf);

        cursor.write_u32(MAGIC);
        cursor.write_u8(self.version);
        cursor.write_u16(self.flags.to_u16());
        cursor.write_u16(self.stream_id.get());
        cursor.write_u32(self.sequence);
        cursor.write_u64(self.timestamp_ns);
        cursor.write_u32(self.frame_number);
        cursor.write_u16(self.fragment_index);
        cursor.write_u16(self.fragment_count);
        cursor.write_u32(self.payload_length);
        cursor.write_u32(self.frame_byte_count);
        cursor.write_u32(self.checksum);
        for component in self.content_rect.to_array() {
            cursor.write_f32(component);
        }
        cursor.write_u16(self.dimension_token.value());
        cursor.write_u16(self.epoch.value());

        debug_assert_eq!(buf.len(), HEADER_LEN);
        let mut out = [0u8; HEADER_LEN];
        out.copy_from_slice(&buf);
        out
    }

    /// Parse a header from the front of `bytes`. Rejects magic and version
    /// mismatch as hard failures; does not validate the payload checksum
    /// (the caller does that once it has the payload — see
    /// [`crate::crc::validate`]).
    pub fn decode(bytes: &[u8]) -> Result<Self, HeaderError> {
        if bytes.len() < HEADER_LEN {
            return Err(HeaderError::TooShort {
                expected: HEADER_LEN,
                actual: bytes.len(),
            });
        }

        let mut cursor = ReadCursor::new(&bytes[..HEADER_LEN]);

        let magic = cursor.read_u32().expect("length checked above");
        if magic != MAGIC {
            return Err(HeaderError::BadMagic {
                expected: MAGIC,
                actual: magic,
            });
        }

        let version = cursor.read_u8().expect("length checked above");
        if version != VERSION {
            return Err(HeaderError::UnsupportedVersion(version));
        }

        let flags = FrameFlags::from_u16(cursor.read_u16().expect("length checked above"));
        let stream_id = StreamId::from(cursor.read_u16().expect("length checked above"));
        let sequence = cursor.read_u32().expect("length checked above");
        let timestamp_ns = cursor.read_u64().expect("length checked above");
        let frame_number = cursor.read_u32().expect("length checked above");
        let fragment_index = cursor.read_u16().expect("length checked above");
        let fragment_count = cursor.read_u16().expect("length checked above");
        let payload_length = cursor.read_u32().expect("length checked above");
        let frame_byte_count = cursor.read_u32().expect("length checked above");
        let checksum = cursor.read_u32().expect("length checked above");
        let mut rect = [0f32; 4];
        for component in &mut rect {
            *component = cursor.read_f32().expect("length checked above");
        }
        let dimension_token =
            DimensionToken::new(cursor.read_u16().expect("length checked above"));
        let epoch = Epoch::new(cursor.read_u16().expect("length checked above"));

        Ok(Self {
            version,
            flags,
            stream_id,
            sequence,
            timestamp_ns,
            frame_number,
            fragment_index,
            fragment_count,
            payload_length,
            frame_byte_count,
            checksum,
            content_rect: ContentRect::from_array(rect),
            dimension_token,
            epoch,
        })
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::any;

    use super::*;

    fn sample_header() -> FrameHeader {
        FrameHeader {
            version: VERSION,
            flags: FrameFlags::KEYFRAME | FrameFlags::END_OF_FRAME,
            stream_id: StreamId::from(7),
            sequence: 42,
            timestamp_ns: 123_456_789,
            frame_number: 5,
            fragment_index: 0,
            fragment_count: 1,
            payload_length: 1000,
            frame_byte_count: 1000,
            checksum: 0xDEAD_BEEF,
            content_rect: ContentRect::full_frame(),
            dimension_token: DimensionToken::new(2),
            epoch: Epoch::new(1),
        }
    }

    #[test]
    fn encode_is_exactly_61_bytes() {
        assert_eq!(sample_header().encode().len(), HEADER_LEN);
    }

    #[test]
    fn round_trip() {
        let header = sample_header();
        let bytes = header.encode();
        let decoded = FrameHeader::decode(&bytes).unwrap();
        assert_eq!(header, decoded);
    }

    #[test]
    fn rejects_short_buffer() {
        let bytes = [0u8; 10];
        assert_eq!(
            FrameHeader::decode(&bytes),
            Err(HeaderError::TooShort {
                expected: HEADER_LEN,
                actual: 10
            })
        );
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = sample_header().encode();
        bytes[0] = !bytes[0];
        assert!(matches!(
            FrameHeader::decode(&bytes),
            Err(HeaderError::BadMagic { .. })
        ));
    }

    #[test]
    fn rejects_bad_version() {
        let mut bytes = sample_header().encode();
        bytes[4] = 0xFF;
        assert_eq!(
            FrameHeader::decode(&bytes),
            Err(HeaderError::UnsupportedVersion(0xFF))
        );
    }

    #[test]
    fn little_endian_field_layout() {
        let header = sample_header();
        let bytes = header.encode();
        // magic "MIRG" = 0x4D495247, little-endian on the wire → bytes
        // [0x47, 0x52, 0x49, 0x4D].
        assert_eq!(&bytes[0..4], &[0x47, 0x52, 0x49, 0x4D]);
        // streamID at offset 7 (after magic[4] + version[1] + flags[2]).
        assert_eq!(u16::from_le_bytes([bytes[7], bytes[8]]), 7);
    }

    proptest::proptest! {
        #[test]
        fn round_trip_prop(
            stream_id in any::<u16>(),
            sequence in any::<u32>(),
            timestamp_ns in any::<u64>(),
            frame_number in any::<u32>(),
            fragment_index in any::<u16>(),
            fragment_count in any::<u16>(),
            payload_length in any::<u32>(),
            frame_byte_count in any::<u32>(),
            checksum in any::<u32>(),
            dimension_token in any::<u16>(),
            epoch in any::<u16>(),
        ) {
            let header = FrameHeader {
                version: VERSION,
                flags: FrameFlags::KEYFRAME,
                stream_id: StreamId::from(stream_id),
                sequence,
                timestamp_ns,
                frame_number,
                fragment_index,
                fragment_count,
                payload_length,
                frame_byte_count,
                checksum,
                content_rect: ContentRect::full_frame(),
                dimension_token: DimensionToken::new(dimension_token),
                epoch: Epoch::new(epoch),
            };
            let bytes = header.encode();
            let decoded = FrameHeader::decode(&bytes).unwrap();
            prop_assert_eq!(header, decoded);
        }
    }
}
