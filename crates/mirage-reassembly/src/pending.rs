use std::time::Instant;

use mirage_types::{DimensionToken, Epoch};

/// A frame in the process of being gathered from fragments.
///
/// Invariant (spec §3): all fragments of one frame share an identical
/// `dimension_token` + `epoch` + `frame_byte_count`; this is enforced by
/// [`super::Reassembler::ingest`] reallocating the slot whenever a fragment
/// disagrees with the frame already in progress.
pub struct PendingFrame {
    pub frame_number: u32,
    pub dimension_token: DimensionToken,
    pub epoch: Epoch,
    pub frame_byte_count: u32,
    pub keyframe: bool,
    pub created_at: Instant,
    slots: Vec<Option<Vec<u8>>>,
    received_count: u16,
}

impl PendingFrame {
    pub fn new(
        frame_number: u32,
        dimension_token: DimensionToken,
        epoch: Epoch,
        frame_byte_count: u32,
        fragment_count: u16,
        keyframe: bool,
        now: Instant,
    ) -> Self {
        Self {
            frame_number,
            dimension_token,
            epoch,
            frame_byte_count,
            keyframe,
            created_at: now,
            slots: vec![None; fragment_count as usize],
            received_count: 0,
        }
    }

    pub fn fragment_count(&self) -> u16 {
        self.slots.len() as u16
    }

    pub fn received_count(&self) -> u16 {
        self.received_count
    }

    pub fn is_complete(&self) -> bool {
        self.received_count as usize == self.slots.len()
    }

    /// Store a fragment if that slot hasn't been seen yet. Returns `true`
    /// if this call completed the frame.
    pub fn store(&mut self, fragment_index: u16, payload: &[u8]) -> bool {
        let Some(slot) = self.slots.get_mut(fragment_index as usize) else {
            return false;
        };
        if slot.is_none() {
            *slot = Some(payload.to_vec());
            self.received_count += 1;
        }
        self.is_complete()
    }

    /// Concatenate fragments in strictly increasing index order and
    /// truncate to `frame_byte_count` (spec invariant 5: fragment closure).
    ///
    /// Returns `None` if any slot is still empty (caller must check
    /// [`Self::is_complete`] first, but this stays defensive).
    pub fn concatenate(&self) -> Option<Vec<u8>> {
        let mut out = Vec::new();
        for slot in &self.slots {
            out.extend_from_slice(slot.as_deref()?);
        }
        out.truncate(self.frame_byte_count as usize);
        Some(out)
    }
}
