use std::collections::VecDeque;
use std::time::Instant;

use mirage_crypto::SessionKey;
use mirage_types::{ContentRect, DimensionToken, Epoch, Generation, StreamId};
use mirage_wire::{checksum, payload_capacity, FrameFlags, FrameHeader, DEFAULT_MAX_PACKET_SIZE};

use crate::bucket::TokenBucket;

/// One encoded frame awaiting fragmentation and send.
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub frame_number: u32,
    pub generation: Generation,
    pub sequence_start: u32,
    pub dimension_token: DimensionToken,
    pub epoch: Epoch,
    pub content_rect: ContentRect,
    pub timestamp_ns: u64,
    pub keyframe: bool,
    /// Unencrypted encoded frame bytes, not yet fragmented.
    pub payload: Vec<u8>,
}

/// One outbound UDP datagram: a 61-byte header followed by the (possibly
/// encrypted) fragment payload.
#[derive(Debug, Clone)]
pub struct Datagram {
    pub header: FrameHeader,
    pub payload: Vec<u8>,
}

impl Datagram {
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(mirage_wire::HEADER_LEN + self.payload.len());
        out.extend_from_slice(&self.header.encode());
        out.extend_from_slice(&self.payload);
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    StaleGeneration,
    RateLimitedNonKeyframe,
}

#[derive(Debug)]
pub enum PumpEvent {
    Sent { frame_number: u32, datagrams: Vec<Datagram> },
    Dropped { frame_number: u32, reason: DropReason },
}

/// Fragments, rate-limits, and tags outbound frames with generation/epoch
/// (spec §4.5).
pub struct PacketSender {
    stream_id: StreamId,
    queue: VecDeque<WorkItem>,
    generation: Generation,
    max_packet_size: usize,
    bucket: TokenBucket,
    session_key: Option<SessionKey>,
    next_flags: FrameFlags,
}

impl PacketSender {
    #[must_use]
    pub fn new(
        stream_id: StreamId,
        target_bitrate_kbps: u32,
        burst_capacity_bytes: f64,
        session_key: Option<SessionKey>,
        now: Instant,
    ) -> Self {
        let refill_rate = f64::from(target_bitrate_kbps) * 1000.0 / 8.0;
        Self {
            stream_id,
            queue: VecDeque::new(),
            generation: Generation::new(0),
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
            bucket: TokenBucket::new(refill_rate, burst_capacity_bytes, now),
            session_key,
            next_flags: FrameFlags::empty(),
        }
    }

    pub fn set_target_bitrate_kbps(&mut self, target_bitrate_kbps: u32) {
        self.bucket
            .set_rate(f64::from(target_bitrate_kbps) * 1000.0 / 8.0);
    }

    /// Set the maximum UDP datagram size, changing how many fragments a
    /// subsequently-fragmented frame is split into (spec §6 config surface
    /// "max packet size (bytes)").
    pub fn set_max_packet_size(&mut self, max_packet_size: usize) {
        self.max_packet_size = max_packet_size;
    }

    #[must_use]
    pub fn max_packet_size(&self) -> usize {
        self.max_packet_size
    }

    /// Stamp additional flags (e.g. `LOGIN_DISPLAY`, `DESKTOP_STREAM`) onto
    /// every fragment of subsequently enqueued frames.
    pub fn set_stream_flags(&mut self, flags: FrameFlags) {
        self.next_flags = flags;
    }

    pub fn enqueue(&mut self, item: WorkItem) {
        self.queue.push_back(item);
    }

    /// Discard every currently-queued item without sending it, returning
    /// how many were dropped. Used by the stream owner on `stop` (spec
    /// §4.9: "drain sender") — outstanding items already handed to the
    /// hardware encoder are not this queue's concern.
    pub fn drain(&mut self) -> usize {
        let dropped = self.queue.len();
        self.queue.clear();
        dropped
    }

    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Mark all currently enqueued items stale and drop them immediately
    /// (spec §4.5: `bump_generation`).
    pub fn bump_generation(&mut self, reason: &str) -> Generation {
        self.generation = self.generation.next();
        let dropped = self.queue.len();
        self.queue.clear();
        tracing::info!(reason, dropped, new_generation = self.generation.value(), "bumped sender generation");
        self.generation
    }

    #[must_use]
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Process as many head-of-queue items as the rate limiter currently
    /// allows. Keyframes are never dropped for rate pressure, only waited
    /// on; non-keyframes are dropped whole under sustained pressure.
    pub fn pump(&mut self, now: Instant) -> Vec<PumpEvent> {
        let mut events = Vec::new();

        while let Some(item) = self.queue.front() {
            if item.generation.is_stale(self.generation) {
                let item = self.queue.pop_front().expect("front checked above");
                tracing::trace!(frame_number = item.frame_number, "dropping stale-generation frame");
                events.push(PumpEvent::Dropped {
                    frame_number: item.frame_number,
                    reason: DropReason::StaleGeneration,
                });
                continue;
            }

            let cost = item.payload.len() as f64;
            if self.bucket.try_consume(cost, now) {
                let item = self.queue.pop_front().expect("front checked above");
                let frame_number = item.frame_number;
                let datagrams = self.fragment(item);
                events.push(PumpEvent::Sent { frame_number, datagrams });
            } else if item.keyframe {
                // Never drop or partially send a keyframe; wait for tokens.
                break;
            } else {
                let item = self.queue.pop_front().expect("front checked above");
                tracing::debug!(frame_number = item.frame_number, "rate pressure: dropping non-keyframe frame");
                events.push(PumpEvent::Dropped {
                    frame_number: item.frame_number,
                    reason: DropReason::RateLimitedNonKeyframe,
                });
            }
        }

        events
    }

    fn fragment(&self, item: WorkItem) -> Vec<Datagram> {
        let capacity = payload_capacity(self.max_packet_size).max(1);
        let frame_byte_count = item.payload.len() as u32;
        let fragment_count = item.payload.chunks(capacity).count().max(1) as u16;

        item.payload
            .chunks(capacity.max(1))
            .enumerate()
            .map(|(i, chunk)| {
                let sequence = item.sequence_start + i as u32;
                let sealed = match &self.session_key {
                    Some(key) => key
                        .seal(sequence, chunk)
                        .expect("AEAD seal over a bounded in-memory chunk cannot fail"),
                    None => chunk.to_vec(),
                };
                let frame_checksum = checksum(&sealed);

                let mut flags = self.next_flags;
                if item.keyframe {
                    flags |= FrameFlags::KEYFRAME;
                }
                if i as u16 + 1 == fragment_count {
                    flags |= FrameFlags::END_OF_FRAME;
                }

                let header = FrameHeader {
                    version: mirage_wire::VERSION,
                    flags,
                    stream_id: self.stream_id,
                    sequence,
                    timestamp_ns: item.timestamp_ns,
                    frame_number: item.frame_number,
                    fragment_index: i as u16,
                    fragment_count,
                    payload_length: sealed.len() as u32,
                    frame_byte_count,
                    checksum: frame_checksum,
                    content_rect: item.content_rect,
                    dimension_token: item.dimension_token,
                    epoch: item.epoch,
                };

                Datagram { header, payload: sealed }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn work_item(frame_number: u32, generation: Generation, keyframe: bool, payload: Vec<u8>) -> WorkItem {
        WorkItem {
            frame_number,
            generation,
            sequence_start: frame_number * 100,
            dimension_token: DimensionToken::new(0),
            epoch: Epoch::new(0),
            content_rect: ContentRect::full_frame(),
            timestamp_ns: 0,
            keyframe,
            payload,
        }
    }

    #[test]
    fn fragments_frame_larger_than_payload_capacity() {
        let now = Instant::now();
        let mut sender = PacketSender::new(StreamId::from(1), 100_000, 1_000_000.0, None, now);
        let capacity = payload_capacity(DEFAULT_MAX_PACKET_SIZE);
        let payload = vec![7u8; capacity * 2 + 10];
        sender.enqueue(work_item(1, Generation::new(0), true, payload));

        let events = sender.pump(now);
        assert_eq!(events.len(), 1);
        match &events[0] {
            PumpEvent::Sent { datagrams, .. } => {
                assert_eq!(datagrams.len(), 3);
                assert!(datagrams.last().unwrap().header.flags.contains(FrameFlags::END_OF_FRAME));
                assert!(datagrams.iter().all(|d| d.header.flags.contains(FrameFlags::KEYFRAME)));
            }
            other => panic!("expected Sent, got {other:?}"),
        }
    }

    #[test]
    fn stale_generation_items_are_dropped_without_send() {
        let now = Instant::now();
        let mut sender = PacketSender::new(StreamId::from(1), 100_000, 1_000_000.0, None, now);
        sender.enqueue(work_item(1, Generation::new(0), false, vec![1, 2, 3]));
        sender.bump_generation("resolution changed");

        let events = sender.pump(now);
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0],
            PumpEvent::Dropped { reason: DropReason::StaleGeneration, .. }
        ));
    }

    #[test]
    fn rate_pressure_drops_non_keyframe_but_waits_on_keyframe() {
        let now = Instant::now();
        // Tiny burst capacity and refill rate so the bucket is immediately
        // exhausted after the first frame.
        let mut sender = PacketSender::new(StreamId::from(1), 1, 10.0, None, now);
        sender.enqueue(work_item(1, Generation::new(0), false, vec![0u8; 10]));
        sender.enqueue(work_item(2, Generation::new(0), false, vec![0u8; 10]));
        sender.enqueue(work_item(3, Generation::new(0), true, vec![0u8; 10]));

        let events = sender.pump(now);
        // First frame consumes the entire burst; second is dropped for rate
        // pressure; the keyframe is left queued rather than dropped.
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], PumpEvent::Sent { .. }));
        assert!(matches!(
            events[1],
            PumpEvent::Dropped { reason: DropReason::RateLimitedNonKeyframe, .. }
        ));
        assert_eq!(sender.queue_len(), 1);
    }

    #[test]
    fn drain_clears_queue_and_reports_count() {
        let now = Instant::now();
        let mut sender = PacketSender::new(StreamId::from(1), 100_000, 1_000_000.0, None, now);
        sender.enqueue(work_item(1, Generation::new(0), false, vec![1, 2, 3]));
        sender.enqueue(work_item(2, Generation::new(0), false, vec![4, 5, 6]));
        assert_eq!(sender.drain(), 2);
        assert_eq!(sender.queue_len(), 0);
    }

    #[test]
    fn encrypted_payload_checksum_covers_ciphertext() {
        let now = Instant::now();
        let key = SessionKey::derive(b"session secret", StreamId::from(1));
        let mut sender = PacketSender::new(StreamId::from(1), 100_000, 1_000_000.0, Some(key), now);
        sender.enqueue(work_item(1, Generation::new(0), true, vec![1, 2, 3, 4]));

        let events = sender.pump(now);
        match &events[0] {
            PumpEvent::Sent { datagrams, .. } => {
                let dg = &datagrams[0];
                assert_ne!(dg.payload, vec![1, 2, 3, 4]);
                assert_eq!(dg.header.checksum, mirage_wire::checksum(&dg.payload));
            }
            other => panic!("expected Sent, got {other:?}"),
        }
    }
}
