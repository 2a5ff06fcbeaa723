use bitflags::bitflags;

bitflags! {
    /// Per-fragment flags carried in the frame header (spec §3 `FrameFlags`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FrameFlags: u16 {
        /// Frame is a self-contained keyframe (IDR); set on every fragment
        /// of a keyframe, not only the first.
        const KEYFRAME       = 1 << 0;
        /// Set on the final fragment of a frame.
        const END_OF_FRAME   = 1 << 1;
        /// Frame carries encoder parameter-set data (SPS/PPS equivalent).
        const PARAMETER_SET  = 1 << 2;
        /// Signals a discontinuity to the receiver (distinct from epoch
        /// bump; informational).
        const DISCONTINUITY  = 1 << 3;
        /// Frame should be prioritized by the sender's scheduling, if any.
        const PRIORITY       = 1 << 4;
        /// Frame originates from a login/greeter display rather than a
        /// user desktop session.
        const LOGIN_DISPLAY  = 1 << 5;
        /// Frame originates from a full desktop stream rather than a
        /// single window.
        const DESKTOP_STREAM = 1 << 6;
        /// Diagnostic metadata only — see spec §9 Open Questions. No
        /// defined repeat cadence; a receiver must not assign it behavior.
        const REPEATED_FRAME = 1 << 7;
        /// Fragment carries FEC parity data rather than frame payload.
        /// Parity-block construction is out of scope; implementations may
        /// stub parity fragments and still satisfy every wire invariant.
        const FEC_PARITY     = 1 << 8;
    }
}

impl FrameFlags {
    #[must_use]
    pub fn to_u16(self) -> u16 {
        self.bits()
    }

    /// Construct from a raw `u16`, preserving unknown bits rather than
    /// rejecting them — a newer sender may set flags this receiver
    /// doesn't understand yet, and unknown flags must be ignorable.
    #[must_use]
    pub fn from_u16(bits: u16) -> Self {
        Self::from_bits_retain(bits)
    }
}
