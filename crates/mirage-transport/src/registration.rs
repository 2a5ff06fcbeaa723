use mirage_types::StreamId;
use rand::RngCore;

/// Registration tokens are opaque 16-byte values minted by the (external)
/// discovery/rendezvous layer; this crate only carries and compares them
/// (spec §4.11, §6).
pub const REGISTRATION_TOKEN_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistrationToken([u8; REGISTRATION_TOKEN_LEN]);

impl RegistrationToken {
    #[must_use]
    pub fn new(bytes: [u8; REGISTRATION_TOKEN_LEN]) -> Self {
        Self(bytes)
    }

    /// Generate a random token. Used by the demo harness standing in for
    /// the external discovery layer that would normally mint these.
    #[must_use]
    pub fn random() -> Self {
        let mut bytes = [0u8; REGISTRATION_TOKEN_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; REGISTRATION_TOKEN_LEN] {
        &self.0
    }
}

/// The per-stream registration datagram that must precede any video data
/// (spec §6: "a per-stream registration datagram carrying the session's
/// `udp_registration_token` precedes any video").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistrationDatagram {
    pub stream_id: StreamId,
    pub token: RegistrationToken,
}

impl RegistrationDatagram {
    const ENCODED_LEN: usize = 2 + REGISTRATION_TOKEN_LEN;

    #[must_use]
    pub fn encode(&self) -> [u8; Self::ENCODED_LEN] {
        let mut out = [0u8; Self::ENCODED_LEN];
        out[0..2].copy_from_slice(&self.stream_id.get().to_le_bytes());
        out[2..].copy_from_slice(&self.token.0);
        out
    }

    #[must_use]
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::ENCODED_LEN {
            return None;
        }
        let stream_id = StreamId::from(u16::from_le_bytes([bytes[0], bytes[1]]));
        let mut token_bytes = [0u8; REGISTRATION_TOKEN_LEN];
        token_bytes.copy_from_slice(&bytes[2..Self::ENCODED_LEN]);
        Some(Self {
            stream_id,
            token: RegistrationToken::new(token_bytes),
        })
    }
}

/// Host-side gate: the host must not emit frames until registration is
/// observed with the expected token (spec §6).
pub struct RegistrationGate {
    expected: RegistrationToken,
    observed: bool,
}

impl RegistrationGate {
    #[must_use]
    pub fn new(expected: RegistrationToken) -> Self {
        Self {
            expected,
            observed: false,
        }
    }

    /// Process an inbound registration datagram. Returns whether the
    /// gate is now open (registration observed with a matching token).
    pub fn observe(&mut self, datagram: &RegistrationDatagram) -> bool {
        if datagram.token == self.expected {
            if !self.observed {
                tracing::info!(stream_id = datagram.stream_id.get(), "UDP registration observed");
            }
            self.observed = true;
        }
        self.observed
    }

    #[must_use]
    pub fn is_registered(&self) -> bool {
        self.observed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_datagram_round_trips() {
        let token = RegistrationToken::new([7u8; REGISTRATION_TOKEN_LEN]);
        let datagram = RegistrationDatagram {
            stream_id: StreamId::from(42),
            token,
        };
        let bytes = datagram.encode();
        let decoded = RegistrationDatagram::decode(&bytes).unwrap();
        assert_eq!(decoded, datagram);
    }

    #[test]
    fn gate_stays_closed_until_matching_token_observed() {
        let expected = RegistrationToken::new([1u8; REGISTRATION_TOKEN_LEN]);
        let mut gate = RegistrationGate::new(expected);
        assert!(!gate.is_registered());

        let wrong = RegistrationDatagram {
            stream_id: StreamId::from(1),
            token: RegistrationToken::new([2u8; REGISTRATION_TOKEN_LEN]),
        };
        assert!(!gate.observe(&wrong));
        assert!(!gate.is_registered());

        let right = RegistrationDatagram {
            stream_id: StreamId::from(1),
            token: expected,
        };
        assert!(gate.observe(&right));
        assert!(gate.is_registered());
    }

    #[test]
    fn decode_rejects_short_buffer() {
        assert!(RegistrationDatagram::decode(&[0u8; 4]).is_none());
    }
}
