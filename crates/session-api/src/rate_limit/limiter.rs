//! Per-client bucket table

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use session_common::RateLimitConfig;

use super::bucket::{RateBucket, RateDecision};

/// Source of the current instant
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    base: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.offset.lock() += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + *self.offset.lock()
    }
}

type SharedBucket = Arc<Mutex<RateBucket>>;

/// Token-bucket admission control keyed by client
///
/// The table lock is shared for lookups and exclusive only while inserting a
/// bucket for a client seen for the first time; inserting never touches other
/// entries. Each bucket has its own lock, held only for the refill-and-debit
/// arithmetic. Buckets live for the lifetime of the limiter.
pub struct RateLimiter {
    buckets: RwLock<HashMap<String, SharedBucket>>,
    capacity: f64,
    refill_per_second: f64,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Default bucket ceiling
    pub const DEFAULT_CAPACITY: f64 = 10.0;
    /// Default refill rate (tokens per second)
    pub const DEFAULT_REFILL_PER_SECOND: f64 = 0.4;

    pub fn new(capacity: f64, refill_per_second: f64) -> Self {
        Self::with_clock(capacity, refill_per_second, Arc::new(SystemClock))
    }

    pub fn with_clock(capacity: f64, refill_per_second: f64, clock: Arc<dyn Clock>) -> Self {
        Self {
            buckets: RwLock::new(HashMap::new()),
            capacity,
            refill_per_second,
            clock,
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.capacity, config.refill_per_second)
    }

    /// Admit or reject one request from `key`
    pub fn check(&self, key: &str) -> RateDecision {
        let bucket = self.bucket(key);
        let mut bucket = bucket.lock();
        bucket.try_acquire(self.clock.now())
    }

    /// Number of clients with a bucket
    pub fn tracked_clients(&self) -> usize {
        self.buckets.read().len()
    }

    /// Tokens left for a client, if it has been seen
    pub fn available(&self, key: &str) -> Option<f64> {
        self.buckets
            .read()
            .get(key)
            .map(|bucket| bucket.lock().tokens())
    }

    fn bucket(&self, key: &str) -> SharedBucket {
        if let Some(bucket) = self.buckets.read().get(key) {
            return Arc::clone(bucket);
        }

        let mut buckets = self.buckets.write();
        // Another request may have created it while we waited for the write lock
        let bucket = buckets.entry(key.to_string()).or_insert_with(|| {
            Arc::new(Mutex::new(RateBucket::new(
                self.capacity,
                self.refill_per_second,
                self.clock.now(),
            )))
        });
        Arc::clone(bucket)
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY, Self::DEFAULT_REFILL_PER_SECOND)
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("capacity", &self.capacity)
            .field("refill_per_second", &self.refill_per_second)
            .field("tracked_clients", &self.tracked_clients())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter() -> (RateLimiter, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let limiter = RateLimiter::with_clock(10.0, 0.4, clock.clone());
        (limiter, clock)
    }

    #[test]
    fn test_burst_then_steady_refill() {
        let (limiter, clock) = limiter();

        for _ in 0..10 {
            assert!(limiter.check("10.0.0.1").is_allowed());
        }
        assert!(!limiter.check("10.0.0.1").is_allowed());

        clock.advance(Duration::from_millis(2500));
        assert!(limiter.check("10.0.0.1").is_allowed());
        assert!(!limiter.check("10.0.0.1").is_allowed());
    }

    #[test]
    fn test_clients_are_independent() {
        let (limiter, _clock) = limiter();

        for _ in 0..10 {
            limiter.check("10.0.0.1");
        }
        assert!(!limiter.check("10.0.0.1").is_allowed());
        assert!(limiter.check("10.0.0.2").is_allowed());
    }

    #[test]
    fn test_new_clients_do_not_reset_existing_buckets() {
        let (limiter, _clock) = limiter();

        for _ in 0..10 {
            limiter.check("10.0.0.1");
        }
        for i in 0..100 {
            limiter.check(&format!("192.168.0.{i}"));
        }

        assert_eq!(limiter.tracked_clients(), 101);
        assert!(!limiter.check("10.0.0.1").is_allowed());
    }

    #[test]
    fn test_concurrent_first_requests_share_one_bucket() {
        let (limiter, _clock) = limiter();
        let admitted = std::sync::atomic::AtomicUsize::new(0);

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    if limiter.check("10.9.9.9").is_allowed() {
                        admitted.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                    }
                });
            }
        });

        assert_eq!(admitted.into_inner(), 8);
        assert_eq!(limiter.tracked_clients(), 1);
        assert_eq!(limiter.available("10.9.9.9"), Some(2.0));
    }

    #[test]
    fn test_concurrent_flood_admits_exactly_capacity() {
        let (limiter, _clock) = limiter();
        let admitted = std::sync::atomic::AtomicUsize::new(0);

        std::thread::scope(|scope| {
            for _ in 0..32 {
                scope.spawn(|| {
                    if limiter.check("10.7.7.7").is_allowed() {
                        admitted.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                    }
                });
            }
        });

        assert_eq!(admitted.into_inner(), 10);
    }
}
