use std::time::Instant;

/// Continuous-refill token bucket.
///
/// Capacity is `max(1, ceil(rate))` and the bucket starts full, so a fresh
/// requester may burst up to one second's worth of permits.
#[derive(Debug)]
pub(crate) struct TokenBucket {
    rate: f64,
    capacity: f64,
    tokens: f64,
    last: Instant,
}

impl TokenBucket {
    pub(crate) fn new(rate: f64) -> Self {
        let capacity = rate.ceil().max(1.0);
        Self {
            rate,
            capacity,
            tokens: capacity,
            last: Instant::now(),
        }
    }

    pub(crate) fn try_take(&mut self) -> bool {
        self.refill(Instant::now());

        if self.tokens < 1.0 {
            return false;
        }
        self.tokens -= 1.0;
        true
    }

    pub(crate) fn available(&self) -> f64 {
        self.tokens
    }

    /// Refilled to capacity, i.e. indistinguishable from a new bucket.
    pub(crate) fn is_idle(&mut self) -> bool {
        self.refill(Instant::now());
        self.tokens >= self.capacity
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last).as_secs_f64();
        if elapsed <= 0.0 {
            return;
        }
        self.tokens = (self.tokens + elapsed * self.rate).min(self.capacity);
        self.last = now;
    }
}
