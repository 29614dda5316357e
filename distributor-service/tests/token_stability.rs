//! Cross-component contract: the same (tenant, series-labels) must always
//! resolve to the same ingester address, across independently constructed
//! pipelines sharing the same ring membership (spec §8's deterministic
//! token-to-placement property) — not just within a single process run.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use distributor_core::error::DistributorError;
use distributor_core::limiter::RateLimiter;
use distributor_core::limits::StaticLimits;
use distributor_core::model::{ProfileSample, ProfileSeries, PushRequest, RawProfileType};
use distributor_core::observability::NoopMetricsSink;
use distributor_core::pool::{ConnectionPool, IngesterClient};
use distributor_core::LabelPair;
use distributor_ring::{DefaultIngesterRingClient, RingMembership};
use distributor_service::Distributor;

struct AlwaysAllow;

impl RateLimiter for AlwaysAllow {
    fn allow_n(&self, _tenant_id: &str, _n: u64) -> Result<(), f64> {
        Ok(())
    }
}

struct RecordingClient;

#[async_trait]
impl IngesterClient for RecordingClient {
    async fn push(&self, _request: PushRequest) -> Result<(), DistributorError> {
        Ok(())
    }
}

struct RecordingPool {
    addrs: Arc<Mutex<HashSet<String>>>,
}

#[async_trait]
impl ConnectionPool for RecordingPool {
    async fn get(&self, addr: &str) -> Result<Arc<dyn IngesterClient>, DistributorError> {
        self.addrs.lock().unwrap().insert(addr.to_string());
        Ok(Arc::new(RecordingClient))
    }
}

fn built_membership() -> Arc<RingMembership> {
    let mut membership = RingMembership::new(Duration::from_secs(30), 10);
    membership.register_self("distributor-a".into(), "10.0.0.1:9095".into(), "zone-a".into(), 16);
    membership.heartbeat("distributor-a");
    membership.upsert_peer(distributor_ring::MembershipEntry {
        instance_id: "distributor-b".into(),
        addr: "10.0.0.2:9095".into(),
        zone: "zone-a".into(),
        tokens: (0..16u32).map(|i| i * 6151).collect(),
        state: distributor_core::ring::InstanceState::Active,
        last_heartbeat: std::time::Instant::now(),
    });
    Arc::new(membership)
}

fn otel_sample() -> ProfileSample {
    // An opaque (non-pprof) format sidesteps gzip/protobuf construction:
    // this test is about routing stability, not the codec.
    ProfileSample::new(vec![1, 2, 3], RawProfileType::Otel)
}

async fn push_through_a_fresh_pipeline(membership: Arc<RingMembership>, series: ProfileSeries) -> HashSet<String> {
    let addrs = Arc::new(Mutex::new(HashSet::new()));
    let distributor = Distributor::new(
        Arc::new(StaticLimits::default()),
        Arc::new(AlwaysAllow),
        Arc::new(DefaultIngesterRingClient::new(membership, 1)),
        Arc::new(RecordingPool { addrs: addrs.clone() }),
        Arc::new(NoopMetricsSink),
        Duration::from_secs(1),
    );
    distributor.push(Some("tenant-1"), PushRequest::new(vec![series])).await.unwrap();
    let result = addrs.lock().unwrap().clone();
    result
}

#[tokio::test]
async fn same_series_labels_route_to_the_same_address_across_separate_pipelines() {
    let membership = built_membership();
    let series = ProfileSeries::new(vec![LabelPair::new("service_name", "svc")], vec![otel_sample()]);

    let first = push_through_a_fresh_pipeline(membership.clone(), series.clone()).await;
    let second = push_through_a_fresh_pipeline(membership, series).await;

    assert_eq!(first, second);
    assert_eq!(first.len(), 1, "replication factor of 1 must route to exactly one address");
}

#[tokio::test]
async fn different_series_labels_can_route_differently() {
    let membership = built_membership();
    let series_a = ProfileSeries::new(vec![LabelPair::new("service_name", "svc-a")], vec![otel_sample()]);
    let series_b = ProfileSeries::new(vec![LabelPair::new("service_name", "svc-b")], vec![otel_sample()]);

    let addrs_a = push_through_a_fresh_pipeline(membership.clone(), series_a).await;
    let addrs_b = push_through_a_fresh_pipeline(membership, series_b).await;

    // Not asserting inequality (a collision is legal with only two ring
    // members) — just that each resolves to exactly one valid address.
    assert_eq!(addrs_a.len(), 1);
    assert_eq!(addrs_b.len(), 1);
}
