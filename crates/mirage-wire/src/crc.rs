//! CRC32 (IEEE 802.3, polynomial `0xEDB88320`) over fragment payloads.
//!
//! `crc32fast` implements this exact variant (initial value `0xFFFFFFFF`,
//! final XOR `0xFFFFFFFF`) — the same one used by zlib/gzip/PNG — so no
//! hand-rolled table is needed.

/// Compute the CRC32 of `payload`.
#[must_use]
pub fn checksum(payload: &[u8]) -> u32 {
    crc32fast::hash(payload)
}

/// Validate that `expected` matches the CRC32 of `payload`.
#[must_use]
pub fn validate(payload: &[u8], expected: u32) -> bool {
    checksum(payload) == expected
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_matching_checksum() {
        let payload = b"the quick brown fox";
        let sum = checksum(payload);
        assert!(validate(payload, sum));
    }

    #[test]
    fn rejects_single_bit_mutation() {
        let payload = b"the quick brown fox".to_vec();
        let sum = checksum(&payload);

        let mut mutated = payload.clone();
        mutated[0] ^= 0x01;
        assert!(!validate(&mutated, sum));
    }

    #[test]
    fn matches_known_ieee_vector() {
        // "123456789" is the canonical CRC-32/ISO-HDLC (= IEEE 802.3) test
        // vector; the expected value 0xCBF43926 is the standard check value.
        assert_eq!(checksum(b"123456789"), 0xCBF4_3926);
    }
}
