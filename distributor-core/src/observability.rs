//! Minimal observability facade, mirroring the teacher's
//! `spark-core::observability::ObservabilityFacade` pattern: an
//! object-safe trait the pipeline depends on, with a no-op default so
//! tests and light deployments don't need a real metrics backend wired
//! in.

use crate::limits::DiscardReason;

/// Metrics surface the request pipeline and ring membership emit to.
///
/// # What
/// Kept intentionally small — just the counters/gauges spec §4.1 and §4.3
/// name explicitly — rather than a generic `record(name, value)` escape
/// hatch, so call sites stay self-documenting.
pub trait MetricsSink: Send + Sync {
    fn inc_discarded_profiles(&self, tenant_id: &str, reason: DiscardReason, count: u64);
    fn inc_discarded_bytes(&self, tenant_id: &str, reason: DiscardReason, bytes: u64);
    fn set_healthy_instances(&self, count: usize);
    fn set_replication_factor(&self, factor: usize);
}

/// Discards every observation; used in tests and as a safe default before
/// a real backend is wired in.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopMetricsSink;

impl MetricsSink for NoopMetricsSink {
    fn inc_discarded_profiles(&self, _tenant_id: &str, _reason: DiscardReason, _count: u64) {}
    fn inc_discarded_bytes(&self, _tenant_id: &str, _reason: DiscardReason, _bytes: u64) {}
    fn set_healthy_instances(&self, _count: usize) {}
    fn set_replication_factor(&self, _factor: usize) {}
}
