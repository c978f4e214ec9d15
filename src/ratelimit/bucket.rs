//! Token bucket limiter primitive.

use std::fmt;
use std::num::NonZeroU32;
use std::time::Duration;

use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};

/// Longest span a full bucket may take to refill.
///
/// The limiter keeps its state in nanoseconds in a `u64`; refill periods are
/// shortened so that `period * burst` stays within this horizon.
const REFILL_HORIZON: Duration = Duration::from_secs(250 * 365 * 24 * 60 * 60);

/// A limiter consulted before each outbound call.
#[async_trait]
pub trait Throttle: Send + Sync + fmt::Debug {
    /// Take a token if one is available right now.
    fn try_accept(&self) -> bool;

    /// Take a token, waiting as long as necessary.
    ///
    /// Never resolves when [`Throttle::can_admit`] is false.
    async fn accept(&self);

    /// Whether this limiter can ever hand out a token.
    fn can_admit(&self) -> bool;

    /// Sustained rate in tokens per second.
    fn qps(&self) -> f32;

    /// Bucket capacity.
    fn burst(&self) -> i64;
}

/// A token bucket that refills at `qps` tokens per second up to `burst` tokens.
///
/// A bucket with `burst < 1` never hands out a token.
pub struct TokenBucket {
    qps: f32,
    burst: i64,
    limiter: Option<DefaultDirectRateLimiter>,
}

impl TokenBucket {
    /// Create a full bucket.
    pub fn new(qps: f32, burst: i64) -> Self {
        let limiter = u32::try_from(burst.max(0))
            .unwrap_or(u32::MAX)
            .try_into()
            .ok()
            .and_then(|burst: NonZeroU32| {
                Quota::with_period(refill_period(qps, burst)).map(|quota| quota.allow_burst(burst))
            })
            .map(RateLimiter::direct);

        Self {
            qps,
            burst,
            limiter,
        }
    }
}

/// Time to refill one token, bounded so the whole bucket fits [`REFILL_HORIZON`].
fn refill_period(qps: f32, burst: NonZeroU32) -> Duration {
    let max_nanos = REFILL_HORIZON.as_nanos() as u64 / u64::from(burst.get());
    let nanos = 1e9 / f64::from(qps);

    if nanos < max_nanos as f64 {
        Duration::from_nanos((nanos as u64).max(1))
    } else {
        // Covers overflowing and non-finite periods.
        Duration::from_nanos(max_nanos)
    }
}

#[async_trait]
impl Throttle for TokenBucket {
    fn try_accept(&self) -> bool {
        self.limiter
            .as_ref()
            .map_or(false, |limiter| limiter.check().is_ok())
    }

    async fn accept(&self) {
        match &self.limiter {
            Some(limiter) => limiter.until_ready().await,
            None => std::future::pending().await,
        }
    }

    fn can_admit(&self) -> bool {
        self.limiter.is_some()
    }

    fn qps(&self) -> f32 {
        self.qps
    }

    fn burst(&self) -> i64 {
        self.burst
    }
}

impl fmt::Debug for TokenBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenBucket")
            .field("qps", &self.qps)
            .field("burst", &self.burst)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_bucket_starts_full() {
        let bucket = TokenBucket::new(1.0, 5);
        assert_eq!(bucket.qps(), 1.0);
        assert_eq!(bucket.burst(), 5);
        assert!(bucket.can_admit());

        for _ in 0..5 {
            assert!(bucket.try_accept());
        }
        assert!(!bucket.try_accept());
    }

    #[test]
    fn test_refill_over_time() {
        let bucket = TokenBucket::new(100.0, 1);
        assert!(bucket.try_accept());
        assert!(!bucket.try_accept());

        std::thread::sleep(Duration::from_millis(30));
        assert!(bucket.try_accept());
    }

    #[test]
    fn test_refill_is_capped_at_burst() {
        let bucket = TokenBucket::new(1000.0, 3);
        assert!(bucket.try_accept());

        std::thread::sleep(Duration::from_millis(20));
        for _ in 0..3 {
            assert!(bucket.try_accept());
        }
        assert!(!bucket.try_accept());
    }

    #[tokio::test]
    async fn test_accept_waits_for_refill() {
        let bucket = TokenBucket::new(50.0, 1);
        bucket.accept().await;

        let start = Instant::now();
        bucket.accept().await;
        assert!(start.elapsed() >= Duration::from_millis(15));
    }

    #[test]
    fn test_non_positive_burst_never_admits() {
        for burst in [0, -3] {
            let bucket = TokenBucket::new(100.0, burst);
            assert_eq!(bucket.burst(), burst);
            assert!(!bucket.can_admit());
            assert!(!bucket.try_accept());
        }
    }

    #[tokio::test]
    async fn test_non_positive_burst_accept_never_resolves() {
        let bucket = TokenBucket::new(100.0, 0);
        let result = tokio::time::timeout(Duration::from_millis(20), bucket.accept()).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_extreme_rates_do_not_overflow() {
        let slow = TokenBucket::new(1e-20, 5);
        for _ in 0..5 {
            assert!(slow.try_accept());
        }
        assert!(!slow.try_accept());

        let fast = TokenBucket::new(f32::MAX, 1);
        assert!(fast.try_accept());

        let huge_burst = TokenBucket::new(1e-3, i64::MAX);
        assert!(huge_burst.try_accept());
    }

    #[test]
    fn test_refill_period_bounds() {
        let one = NonZeroU32::new(1).unwrap();
        assert_eq!(refill_period(2.0, one), Duration::from_millis(500));
        assert_eq!(refill_period(f32::MAX, one), Duration::from_nanos(1));
        assert_eq!(refill_period(1e-20, one), REFILL_HORIZON);

        let ten = NonZeroU32::new(10).unwrap();
        assert_eq!(refill_period(1e-20, ten), REFILL_HORIZON / 10);
    }
}
