//! Ingester ring contracts: replication set selection and membership
//! health, consumed by the request pipeline but implemented elsewhere
//! (concretely, by `distributor-ring`).
//!
//! # Where
//! Mirrors the split the teacher draws between `spark-core::cluster`
//! (trait-only contracts) and `spark-switch` (the concrete orchestration
//! crate that implements them): this module only defines the shapes the
//! pipeline depends on.

use async_trait::async_trait;

use crate::error::DistributorError;

/// A peer instance as seen by the ring: network address, health state and
/// zone (for zone-aware replica placement).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct InstanceDesc {
    pub addr: String,
    pub state: InstanceState,
    pub zone: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InstanceState {
    Joining,
    Active,
    Leaving,
    Left,
}

impl InstanceState {
    pub fn is_healthy(self) -> bool {
        matches!(self, InstanceState::Active)
    }
}

/// The ring operation a token lookup is performed for; mirrors the
/// teacher's habit of threading an explicit intent enum through lookup
/// APIs (see `spark-core::transport::ConnectionIntent`) rather than
/// overloading one function for reads and writes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RingOp {
    Write,
    Read,
}

/// The set of instances chosen to receive (or serve) one series.
///
/// # Invariant
/// `min_success + max_errors == instances.len()` for every
/// `ReplicationSet` produced by a conforming `IngesterRingClient`
/// (spec §3, §8 invariant 3).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplicationSet {
    pub instances: Vec<InstanceDesc>,
    pub min_success: usize,
    pub max_errors: usize,
}

impl ReplicationSet {
    /// Clamps `max_errors` to `instances.len()` so the
    /// `min_success + max_errors == instances.len()` invariant (spec §3,
    /// §8 invariant 3) holds even when the ring could not find as many
    /// healthy instances as the configured replication factor calls for.
    pub fn new(instances: Vec<InstanceDesc>, max_errors: usize) -> Self {
        let max_errors = max_errors.min(instances.len());
        let min_success = instances.len() - max_errors;
        Self {
            instances,
            min_success,
            max_errors,
        }
    }
}

/// A stable, tenant-scoped subset of the full ring (spec §4.6).
pub trait SubRing: Send + Sync {
    /// Deterministic clockwise walk from `token`, collecting the next
    /// `replication_factor` distinct healthy instances.
    fn get(&self, token: u32, op: RingOp) -> Result<ReplicationSet, DistributorError>;
}

/// The ingester ring client consumed by the request pipeline.
///
/// # What
/// - `shuffle_shard`: a stable subset of at least `shard_size` instances
///   derived from `tenant_id` as seed; `shard_size == 0` returns the whole
///   ring.
/// - `replication_factor`: the configured RF, used to size
///   `ReplicationSet`s even before a lookup is performed.
///
/// # Contract
/// Implementations must be `Send + Sync` so a single client can be shared
/// across every fan-out task spawned by the pipeline (spec §5).
#[async_trait]
pub trait IngesterRingClient: Send + Sync {
    fn shuffle_shard(&self, tenant_id: &str, shard_size: usize) -> Box<dyn SubRing>;

    fn replication_factor(&self) -> usize;
}

/// Observes how many ring peers are currently healthy, read by the rate
/// limiter on every refresh tick (spec §4.3, §4.4).
pub trait HealthyInstanceCounter: Send + Sync {
    /// Always `>= 1` so downstream division never hits zero (spec §3
    /// invariant: `effective rate = globalRate / max(1, healthy_instance_count)`).
    fn healthy_instance_count(&self) -> usize;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replication_set_invariant_holds() {
        let instances = vec![
            InstanceDesc { addr: "a".into(), state: InstanceState::Active, zone: "z1".into() },
            InstanceDesc { addr: "b".into(), state: InstanceState::Active, zone: "z1".into() },
            InstanceDesc { addr: "c".into(), state: InstanceState::Active, zone: "z1".into() },
        ];
        let set = ReplicationSet::new(instances, 1);
        assert_eq!(set.min_success + set.max_errors, set.instances.len());
        assert_eq!(set.min_success, 2);
    }
}
