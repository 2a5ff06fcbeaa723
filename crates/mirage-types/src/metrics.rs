/// Per-stream counters backing the `StreamMetrics` control message (spec
/// §6). Plain `u64` counters with increment helpers — no external metrics
/// crate, since the spec's Non-goals exclude an observability surface
/// beyond what the recovery taxonomy itself needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreamMetricsSnapshot {
    pub malformed_packets: u64,
    pub stale_dimension_drops: u64,
    pub stale_epoch_drops: u64,
    pub decode_errors: u64,
    pub capture_stalls: u64,
    pub queue_drops: u64,
    pub keyframe_requests: u64,
}

impl StreamMetricsSnapshot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_malformed_packet(&mut self) {
        self.malformed_packets += 1;
    }

    pub fn record_stale_dimension_drop(&mut self) {
        self.stale_dimension_drops += 1;
    }

    pub fn record_stale_epoch_drop(&mut self) {
        self.stale_epoch_drops += 1;
    }

    pub fn record_decode_error(&mut self) {
        self.decode_errors += 1;
    }

    pub fn record_capture_stall(&mut self) {
        self.capture_stalls += 1;
    }

    pub fn record_queue_drops(&mut self, n: u64) {
        self.queue_drops += n;
    }

    pub fn record_keyframe_request(&mut self) {
        self.keyframe_requests += 1;
    }
}

impl std::ops::Add for StreamMetricsSnapshot {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            malformed_packets: self.malformed_packets + other.malformed_packets,
            stale_dimension_drops: self.stale_dimension_drops + other.stale_dimension_drops,
            stale_epoch_drops: self.stale_epoch_drops + other.stale_epoch_drops,
            decode_errors: self.decode_errors + other.decode_errors,
            capture_stalls: self.capture_stalls + other.capture_stalls,
            queue_drops: self.queue_drops + other.queue_drops,
            keyframe_requests: self.keyframe_requests + other.keyframe_requests,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn increments_are_independent_per_field() {
        let mut m = StreamMetricsSnapshot::new();
        m.record_malformed_packet();
        m.record_decode_error();
        m.record_decode_error();
        assert_eq!(m.malformed_packets, 1);
        assert_eq!(m.decode_errors, 2);
        assert_eq!(m.capture_stalls, 0);
    }

    #[test]
    fn add_sums_every_field() {
        let mut a = StreamMetricsSnapshot::new();
        a.record_capture_stall();
        let mut b = StreamMetricsSnapshot::new();
        b.record_capture_stall();
        b.record_queue_drops(9);
        let sum = a + b;
        assert_eq!(sum.capture_stalls, 2);
        assert_eq!(sum.queue_drops, 9);
    }
}
