//! Lazy token bucket

use std::time::{Duration, Instant};

/// Outcome of an admission check
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RateDecision {
    /// Admitted; `remaining` tokens are left after the debit
    Allowed { remaining: f64 },
    /// Rejected; a token becomes available after `retry_after`
    Limited { retry_after: Duration },
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }
}

/// Per-client budget, refilled on access rather than by a timer
#[derive(Debug, Clone)]
pub struct RateBucket {
    capacity: f64,
    tokens: f64,
    refill_per_second: f64,
    last_refill: Instant,
}

impl RateBucket {
    /// A full bucket
    pub fn new(capacity: f64, refill_per_second: f64, now: Instant) -> Self {
        Self {
            capacity,
            tokens: capacity,
            refill_per_second,
            last_refill: now,
        }
    }

    /// Tokens currently available (as of the last refill)
    pub fn tokens(&self) -> f64 {
        self.tokens
    }

    /// Refill for the time elapsed since the last call, then try to debit one token
    ///
    /// A rejected request consumes nothing.
    pub fn try_acquire(&mut self, now: Instant) -> RateDecision {
        self.refill(now);

        if self.tokens < 1.0 {
            let missing = 1.0 - self.tokens;
            let retry_after = Duration::try_from_secs_f64(missing / self.refill_per_second)
                .unwrap_or(Duration::MAX);
            return RateDecision::Limited { retry_after };
        }

        self.tokens -= 1.0;
        RateDecision::Allowed {
            remaining: self.tokens,
        }
    }

    fn refill(&mut self, now: Instant) {
        // Instants observed out of order never drain the bucket
        let elapsed = now.saturating_duration_since(self.last_refill);
        self.tokens =
            (self.tokens + elapsed.as_secs_f64() * self.refill_per_second).min(self.capacity);
        self.last_refill = self.last_refill.max(now);
    }
}
