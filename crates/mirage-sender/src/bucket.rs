use std::time::Instant;

/// Token bucket rate limiter, refilled continuously at the configured
/// target bitrate and allowing bursts up to one frame (spec §4.5).
pub struct TokenBucket {
    capacity: f64,
    tokens: f64,
    refill_rate_bytes_per_sec: f64,
    last_refill: Instant,
}

impl TokenBucket {
    #[must_use]
    pub fn new(refill_rate_bytes_per_sec: f64, burst_capacity_bytes: f64, now: Instant) -> Self {
        Self {
            capacity: burst_capacity_bytes,
            tokens: burst_capacity_bytes,
            refill_rate_bytes_per_sec,
            last_refill: now,
        }
    }

    pub fn set_rate(&mut self, refill_rate_bytes_per_sec: f64) {
        self.refill_rate_bytes_per_sec = refill_rate_bytes_per_sec;
    }

    pub fn set_burst_capacity(&mut self, burst_capacity_bytes: f64) {
        self.capacity = burst_capacity_bytes;
        self.tokens = self.tokens.min(self.capacity);
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate_bytes_per_sec).min(self.capacity);
        self.last_refill = now;
    }

    /// Attempt to withdraw `cost` bytes worth of tokens. Refills first.
    pub fn try_consume(&mut self, cost: f64, now: Instant) -> bool {
        self.refill(now);
        if self.tokens >= cost {
            self.tokens -= cost;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn allows_one_burst_up_to_capacity() {
        let t0 = Instant::now();
        let mut bucket = TokenBucket::new(1000.0, 5000.0, t0);
        assert!(bucket.try_consume(5000.0, t0));
        assert!(!bucket.try_consume(1.0, t0));
    }

    #[test]
    fn refills_over_time() {
        let t0 = Instant::now();
        let mut bucket = TokenBucket::new(1000.0, 1000.0, t0);
        assert!(bucket.try_consume(1000.0, t0));
        assert!(!bucket.try_consume(100.0, t0 + Duration::from_millis(50)));
        assert!(bucket.try_consume(100.0, t0 + Duration::from_millis(150)));
    }

    #[test]
    fn never_refills_past_capacity() {
        let t0 = Instant::now();
        let mut bucket = TokenBucket::new(1000.0, 500.0, t0);
        assert!(bucket.try_consume(200.0, t0));
        assert!(!bucket.try_consume(400.0, t0 + Duration::from_secs(10)));
        assert!(bucket.try_consume(500.0, t0 + Duration::from_secs(10)));
    }
}
