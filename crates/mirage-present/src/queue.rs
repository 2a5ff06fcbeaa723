use std::collections::VecDeque;

use mirage_decode::DecodedImage;

/// Queue depth at or above which sustained pressure starts arming the
/// emergency trim (spec §4.7: "implementation uses depth ≥ 9 ... as arming
/// signal").
const OVERLOAD_ARM_DEPTH: usize = 9;

/// Consecutive over-threshold enqueues required to arm the trim before the
/// next over-threshold enqueue fires it. Calibrated against spec §8's
/// worked boundary scenario (13 sequential enqueues with no intervening
/// dequeue → drop 9 oldest → safe depth 4, oldest surviving sequence 10):
/// depth first reaches 9 at the 9th enqueue; arming after 4 consecutive
/// over-threshold enqueues (depths 9, 10, 11, 12) and firing on the 5th
/// (depth 13) reproduces that example exactly. The threshold tuple is
/// hand-tuned per spec §9 and kept configurable rather than hard-coded.
const DEFAULT_ARM_STREAK: u32 = 4;

/// Depth an emergency trim reduces the queue to, keeping the freshest
/// entries (spec §4.7).
const SAFE_DEPTH: usize = 4;

/// One decoded frame awaiting presentation, with a monotonic sequence
/// number assigned on enqueue (spec §3 "Presentation entry").
#[derive(Debug, Clone)]
pub struct PresentationEntry {
    pub sequence: u64,
    pub image: DecodedImage,
}

/// Outcome of a single [`PresentationQueue::enqueue`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// Entry appended normally.
    Appended,
    /// The queue was over threshold and has just been trimmed to
    /// [`SAFE_DEPTH`]; carries the number of entries dropped.
    Trimmed { dropped: usize },
}

/// Per-stream ordered, pull-based presentation queue (spec §4.7). Sustained
/// pressure above [`OVERLOAD_ARM_DEPTH`] arms an emergency trim; the trim
/// itself fires on the next enqueue that is still over threshold, dropping
/// the oldest entries down to [`SAFE_DEPTH`].
pub struct PresentationQueue {
    entries: VecDeque<PresentationEntry>,
    next_sequence: u64,
    arm_streak: u32,
    over_threshold_streak: u32,
    trim_armed: bool,
}

impl Default for PresentationQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl PresentationQueue {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: VecDeque::new(),
            next_sequence: 0,
            arm_streak: DEFAULT_ARM_STREAK,
            over_threshold_streak: 0,
            trim_armed: false,
        }
    }

    #[must_use]
    pub fn with_arm_streak(mut self, arm_streak: u32) -> Self {
        self.arm_streak = arm_streak;
        self
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.entries.len()
    }

    /// Append a decoded image, assigning it the next strictly-increasing
    /// sequence number. May trigger an emergency trim if the queue has
    /// been sustained over [`OVERLOAD_ARM_DEPTH`] for long enough.
    pub fn enqueue(&mut self, image: DecodedImage) -> EnqueueOutcome {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.entries.push_back(PresentationEntry { sequence, image });

        if self.depth() < OVERLOAD_ARM_DEPTH {
            self.over_threshold_streak = 0;
            self.trim_armed = false;
            return EnqueueOutcome::Appended;
        }

        if self.trim_armed {
            let dropped = self.depth().saturating_sub(SAFE_DEPTH);
            for _ in 0..dropped {
                self.entries.pop_front();
            }
            self.over_threshold_streak = 0;
            self.trim_armed = false;
            tracing::warn!(dropped, "presentation queue emergency trim");
            return EnqueueOutcome::Trimmed { dropped };
        }

        self.over_threshold_streak += 1;
        if self.over_threshold_streak >= self.arm_streak {
            self.trim_armed = true;
        }
        EnqueueOutcome::Appended
    }

    /// Pull the oldest entry, if any (spec §4.7 `dequeue`).
    pub fn dequeue(&mut self) -> Option<PresentationEntry> {
        let entry = self.entries.pop_front();
        if self.depth() < OVERLOAD_ARM_DEPTH {
            self.over_threshold_streak = 0;
            self.trim_armed = false;
        }
        entry
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sequence number of the oldest surviving entry, if any.
    #[must_use]
    pub fn oldest_sequence(&self) -> Option<u64> {
        self.entries.front().map(|e| e.sequence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mirage_types::ContentRect;
    use std::sync::Arc;

    fn image(frame_number: u32) -> DecodedImage {
        DecodedImage {
            frame_number,
            width: 1920,
            height: 1080,
            presentation_time_ns: u64::from(frame_number),
            content_rect: ContentRect::full_frame(),
            pixels: Arc::from(vec![0u8; 4].into_boxed_slice()),
        }
    }

    #[test]
    fn dequeue_order_matches_enqueue_order() {
        let mut q = PresentationQueue::new();
        q.enqueue(image(1));
        q.enqueue(image(2));
        q.enqueue(image(3));
        assert_eq!(q.dequeue().unwrap().image.frame_number, 1);
        assert_eq!(q.dequeue().unwrap().image.frame_number, 2);
        assert_eq!(q.dequeue().unwrap().image.frame_number, 3);
        assert!(q.dequeue().is_none());
    }

    #[test]
    fn sequence_numbers_strictly_increase() {
        let mut q = PresentationQueue::new();
        q.enqueue(image(1));
        let s0 = q.entries.back().unwrap().sequence;
        q.enqueue(image(2));
        let s1 = q.entries.back().unwrap().sequence;
        assert!(s1 > s0);
    }

    #[test]
    fn emergency_trim_reaches_safe_depth_after_thirteen_enqueues() {
        let mut q = PresentationQueue::new();
        let mut last_outcome = EnqueueOutcome::Appended;
        for n in 1..=13 {
            last_outcome = q.enqueue(image(n));
        }
        assert_eq!(last_outcome, EnqueueOutcome::Trimmed { dropped: 9 });
        assert_eq!(q.depth(), SAFE_DEPTH);
        // Sequences 0..13 (zero-indexed) were enqueued for frames 1..13;
        // oldest surviving should be new_max(12) - safe_depth(4) + 1 = 9.
        assert_eq!(q.oldest_sequence(), Some(9));
    }

    #[test]
    fn drops_only_contiguous_oldest_entries() {
        let mut q = PresentationQueue::new();
        for n in 1..=13 {
            q.enqueue(image(n));
        }
        let mut seen = Vec::new();
        while let Some(entry) = q.dequeue() {
            seen.push(entry.sequence);
        }
        let mut sorted = seen.clone();
        sorted.sort_unstable();
        assert_eq!(seen, sorted, "surviving entries must stay in increasing sequence order");
    }

    #[test]
    fn depth_below_threshold_never_trims() {
        let mut q = PresentationQueue::new();
        for n in 1..=8 {
            assert_eq!(q.enqueue(image(n)), EnqueueOutcome::Appended);
        }
    }

    #[test]
    fn dequeuing_back_under_threshold_resets_the_arm_streak() {
        let mut q = PresentationQueue::new();
        for n in 1..=12 {
            q.enqueue(image(n));
        }
        // Streak is at 4 (depths 9, 10, 11, 12) and armed. Dequeuing down
        // to depth 8 (below the arm depth) resets the streak entirely.
        for _ in 0..4 {
            q.dequeue();
        }
        assert_eq!(q.depth(), 8);

        // Climbing back to depth 13 needs a fresh run of over-threshold
        // enqueues; it must not trim immediately just because it was
        // armed before the reset.
        for n in 100..104 {
            assert_eq!(q.enqueue(image(n)), EnqueueOutcome::Appended);
        }
        assert_eq!(q.depth(), 12);
    }

    #[test]
    fn drops_stream_independent_queues_separately() {
        let mut a = PresentationQueue::new();
        let mut b = PresentationQueue::new();
        for n in 1..=13 {
            a.enqueue(image(n));
        }
        b.enqueue(image(1));
        assert_eq!(a.depth(), SAFE_DEPTH);
        assert_eq!(b.depth(), 1);
    }
}
