//! Prometheus-backed `MetricsSink` (spec §7: `discarded_profiles` /
//! `discarded_bytes` counters labeled by reason and tenant).

use distributor_core::limits::DiscardReason;
use distributor_core::observability::MetricsSink;
use prometheus::{IntCounterVec, IntGauge, Opts, Registry};

pub struct PrometheusMetricsSink {
    discarded_profiles: IntCounterVec,
    discarded_bytes: IntCounterVec,
    healthy_instances: IntGauge,
    replication_factor: IntGauge,
}

impl PrometheusMetricsSink {
    pub fn new(registry: &Registry) -> prometheus::Result<Self> {
        let discarded_profiles = IntCounterVec::new(
            Opts::new("distributor_discarded_profiles_total", "Profiles discarded before replication"),
            &["tenant", "reason"],
        )?;
        let discarded_bytes = IntCounterVec::new(
            Opts::new("distributor_discarded_bytes_total", "Raw bytes discarded before replication"),
            &["tenant", "reason"],
        )?;
        let healthy_instances = IntGauge::new(
            "distributor_ring_healthy_instances",
            "Number of distributor peers currently considered healthy",
        )?;
        let replication_factor = IntGauge::new(
            "distributor_replication_factor",
            "Configured replication factor",
        )?;
        registry.register(Box::new(discarded_profiles.clone()))?;
        registry.register(Box::new(discarded_bytes.clone()))?;
        registry.register(Box::new(healthy_instances.clone()))?;
        registry.register(Box::new(replication_factor.clone()))?;
        Ok(Self { discarded_profiles, discarded_bytes, healthy_instances, replication_factor })
    }
}

impl MetricsSink for PrometheusMetricsSink {
    fn inc_discarded_profiles(&self, tenant_id: &str, reason: DiscardReason, count: u64) {
        self.discarded_profiles.with_label_values(&[tenant_id, reason.as_str()]).inc_by(count);
    }

    fn inc_discarded_bytes(&self, tenant_id: &str, reason: DiscardReason, bytes: u64) {
        self.discarded_bytes.with_label_values(&[tenant_id, reason.as_str()]).inc_by(bytes);
    }

    fn set_healthy_instances(&self, count: usize) {
        self.healthy_instances.set(count as i64);
    }

    fn set_replication_factor(&self, factor: usize) {
        self.replication_factor.set(factor as i64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_without_duplicate_metric_errors() {
        let registry = Registry::new();
        assert!(PrometheusMetricsSink::new(&registry).is_ok());
    }

    #[test]
    fn discard_counters_accumulate_by_label() {
        let registry = Registry::new();
        let sink = PrometheusMetricsSink::new(&registry).unwrap();
        sink.inc_discarded_profiles("t1", DiscardReason::RateLimited, 2);
        sink.inc_discarded_profiles("t1", DiscardReason::RateLimited, 3);
        assert_eq!(sink.discarded_profiles.with_label_values(&["t1", "rate_limited"]).get(), 5);
    }
}
