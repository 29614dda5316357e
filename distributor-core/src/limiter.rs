//! Rate limiter contract consumed by the request pipeline (spec §4.4).

/// Per-tenant token-bucket gate.
///
/// # Contract
/// `allow_n` must be atomic per tenant and must not consume tokens on
/// denial (spec §4.4, §8 invariant — denial is side-effect-free so a
/// retried request isn't double-charged).
pub trait RateLimiter: Send + Sync {
    /// Attempt to admit `n` bytes for `tenant_id`. Returns `Ok(())` if
    /// admitted, or `Err(current_limit_bytes_per_sec)` if denied, so the
    /// caller can build the human-readable message required by spec §7.
    fn allow_n(&self, tenant_id: &str, n: u64) -> Result<(), f64>;
}
