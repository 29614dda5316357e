//! Per-tenant token-bucket `RateLimiter` (spec §4.4): burst =
//! `ingestion_burst_size_bytes`, fill rate =
//! `ingestion_rate_bytes / healthy_instances`, healthy-instance count
//! re-read every refresh interval rather than on every call.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use distributor_core::limits::LimitsProvider;
use distributor_core::limiter::RateLimiter;
use distributor_core::ring::HealthyInstanceCounter;
use parking_lot::Mutex;

const RATE_REFRESH_INTERVAL: Duration = Duration::from_secs(10);

struct BucketState {
    tokens: f64,
    last_refill: Instant,
    effective_rate: f64,
    rate_refreshed_at: Instant,
}

/// The concrete token bucket. `allow_n` never blocks: denial leaves the
/// bucket untouched (spec §4.4 contract), and the caller surfaces
/// `ResourceExhausted` with the current effective rate for the
/// human-readable message spec §7 requires.
pub struct TokenBucketRateLimiter {
    buckets: DashMap<String, Mutex<BucketState>>,
    limits: Arc<dyn LimitsProvider>,
    healthy: Arc<dyn HealthyInstanceCounter>,
}

impl TokenBucketRateLimiter {
    pub fn new(limits: Arc<dyn LimitsProvider>, healthy: Arc<dyn HealthyInstanceCounter>) -> Self {
        Self { buckets: DashMap::new(), limits, healthy }
    }

    fn effective_rate(&self, global_rate: f64) -> f64 {
        global_rate / self.healthy.healthy_instance_count().max(1) as f64
    }
}

impl RateLimiter for TokenBucketRateLimiter {
    fn allow_n(&self, tenant_id: &str, n: u64) -> Result<(), f64> {
        let limits = self.limits.limits_for(tenant_id);
        let now = Instant::now();

        let entry = self.buckets.entry(tenant_id.to_string()).or_insert_with(|| {
            Mutex::new(BucketState {
                tokens: limits.ingestion_burst_size_bytes,
                last_refill: now,
                effective_rate: self.effective_rate(limits.ingestion_rate_bytes),
                rate_refreshed_at: now,
            })
        });
        let mut state = entry.lock();

        if now.saturating_duration_since(state.rate_refreshed_at) >= RATE_REFRESH_INTERVAL {
            state.effective_rate = self.effective_rate(limits.ingestion_rate_bytes);
            state.rate_refreshed_at = now;
        }

        let elapsed = now.saturating_duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * state.effective_rate).min(limits.ingestion_burst_size_bytes);
        state.last_refill = now;

        if state.tokens >= n as f64 {
            state.tokens -= n as f64;
            Ok(())
        } else {
            Err(state.effective_rate)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use distributor_core::limits::{StaticLimits, TenantLimits};

    struct FixedHealthy(usize);
    impl HealthyInstanceCounter for FixedHealthy {
        fn healthy_instance_count(&self) -> usize {
            self.0
        }
    }

    fn limiter_with(rate: f64, burst: f64, healthy: usize) -> TokenBucketRateLimiter {
        let limits = Arc::new(StaticLimits(TenantLimits {
            ingestion_rate_bytes: rate,
            ingestion_burst_size_bytes: burst,
            ..TenantLimits::default()
        }));
        TokenBucketRateLimiter::new(limits, Arc::new(FixedHealthy(healthy)))
    }

    #[test]
    fn denies_when_request_exceeds_burst() {
        let limiter = limiter_with(1000.0, 1000.0, 1);
        assert!(limiter.allow_n("t1", 2000).is_err());
    }

    #[test]
    fn admits_within_burst_and_consumes_tokens() {
        let limiter = limiter_with(1000.0, 1000.0, 1);
        assert!(limiter.allow_n("t1", 500).is_ok());
        assert!(limiter.allow_n("t1", 500).is_ok());
        assert!(limiter.allow_n("t1", 1).is_err());
    }

    #[test]
    fn denial_does_not_consume_tokens() {
        let limiter = limiter_with(1000.0, 1000.0, 1);
        assert!(limiter.allow_n("t1", 2000).is_err());
        assert!(limiter.allow_n("t1", 1000).is_ok());
    }

    #[test]
    fn effective_rate_divides_by_healthy_instance_count() {
        let limiter = limiter_with(1000.0, 1000.0, 4);
        assert!(limiter.allow_n("t1", 1000).is_ok());
        let err = limiter.allow_n("t1", 1).unwrap_err();
        assert!((err - 250.0).abs() < f64::EPSILON);
    }
}
