//! Consistent hash ring: clockwise token lookup (`Get`) and tenant-seeded
//! shuffle-sharding (spec §4.6).

use std::collections::BTreeMap;

use distributor_core::error::DistributorError;
use distributor_core::ring::{InstanceDesc, ReplicationSet, RingOp, SubRing};
use distributor_core::token::token_for;
use distributor_core::LabelPair;

use crate::membership::RingToken;

/// A snapshot of the ring restricted to one ordered `token -> instance`
/// mapping. Both the full ring and every tenant's shuffle-shard subset are
/// represented by this same type; `shuffle_shard` simply builds one with
/// fewer distinct instances.
pub struct ConsistentHashRing {
    tokens: BTreeMap<u32, InstanceDesc>,
    replication_factor: usize,
}

impl ConsistentHashRing {
    pub fn from_tokens(tokens: &[RingToken], replication_factor: usize) -> Self {
        let mut map = BTreeMap::new();
        for t in tokens {
            map.insert(t.token, t.instance.clone());
        }
        Self { tokens: map, replication_factor }
    }

    fn quorum_max_errors(&self) -> usize {
        let quorum = self.replication_factor / 2 + 1;
        self.replication_factor.saturating_sub(quorum)
    }

    /// Distinct instance addresses currently present in this ring, in
    /// token order (stable, not sorted by address).
    pub fn distinct_instances(&self) -> Vec<InstanceDesc> {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for instance in self.tokens.values() {
            if seen.insert(instance.addr.clone()) {
                out.push(instance.clone());
            }
        }
        out
    }

    /// Walk clockwise from `token`, collecting up to `want` distinct
    /// instances (deduplicated by address since one instance owns many
    /// tokens), wrapping around the ring once.
    fn walk(&self, token: u32, want: usize) -> Vec<InstanceDesc> {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        let after = self.tokens.range(token..).map(|(_, v)| v);
        let before = self.tokens.range(..token).map(|(_, v)| v);
        for instance in after.chain(before) {
            if out.len() >= want {
                break;
            }
            if seen.insert(instance.addr.clone()) {
                out.push(instance.clone());
            }
        }
        out
    }
}

impl SubRing for ConsistentHashRing {
    fn get(&self, token: u32, _op: RingOp) -> Result<ReplicationSet, DistributorError> {
        if self.tokens.is_empty() {
            return Err(DistributorError::unavailable("ring has no healthy instances"));
        }
        let instances = self.walk(token, self.replication_factor);
        Ok(ReplicationSet::new(instances, self.quorum_max_errors()))
    }
}

/// Builds the tenant-scoped subset ring consumed by
/// `IngesterRingClient::shuffle_shard` (spec §4.6): a deterministic
/// clockwise walk seeded by `fnv1a32(tenant_id)`, collecting `shard_size`
/// distinct instances and restricting the ring to only their tokens.
/// `shard_size == 0`, or a shard size at least as large as the ring,
/// returns the full ring unrestricted.
pub fn shuffle_shard(full: &ConsistentHashRing, tenant_id: &str, shard_size: usize) -> ConsistentHashRing {
    let distinct = full.distinct_instances();
    if shard_size == 0 || shard_size >= distinct.len() {
        return ConsistentHashRing {
            tokens: full.tokens.clone(),
            replication_factor: full.replication_factor,
        };
    }
    let seed = token_for(tenant_id, &[LabelPair::new("purpose", "shuffle_shard")]);
    let chosen = full.walk(seed, shard_size);
    let chosen_addrs: std::collections::HashSet<&str> = chosen.iter().map(|i| i.addr.as_str()).collect();
    let tokens = full
        .tokens
        .iter()
        .filter(|(_, instance)| chosen_addrs.contains(instance.addr.as_str()))
        .map(|(token, instance)| (*token, instance.clone()))
        .collect();
    ConsistentHashRing { tokens, replication_factor: full.replication_factor }
}

#[cfg(test)]
mod tests {
    use super::*;
    use distributor_core::ring::InstanceState;

    fn token(token: u32, addr: &str) -> RingToken {
        RingToken {
            token,
            instance: InstanceDesc { addr: addr.into(), state: InstanceState::Active, zone: "z".into() },
        }
    }

    #[test]
    fn get_returns_unavailable_on_empty_ring() {
        let ring = ConsistentHashRing::from_tokens(&[], 3);
        assert!(ring.get(0, RingOp::Write).is_err());
    }

    #[test]
    fn get_collects_distinct_instances_clockwise() {
        let tokens = vec![token(10, "a"), token(20, "b"), token(30, "c"), token(40, "a")];
        let ring = ConsistentHashRing::from_tokens(&tokens, 2);
        let set = ring.get(15, RingOp::Write).unwrap();
        assert_eq!(set.instances.len(), 2);
        assert_eq!(set.instances[0].addr, "b");
        assert_eq!(set.instances[1].addr, "c");
    }

    #[test]
    fn get_wraps_around_the_ring() {
        let tokens = vec![token(10, "a"), token(20, "b"), token(30, "c")];
        let ring = ConsistentHashRing::from_tokens(&tokens, 2);
        let set = ring.get(25, RingOp::Write).unwrap();
        assert_eq!(set.instances[0].addr, "c");
        assert_eq!(set.instances[1].addr, "a");
    }

    #[test]
    fn replication_set_quorum_matches_majority_rule() {
        let tokens = vec![token(10, "a"), token(20, "b"), token(30, "c")];
        let ring = ConsistentHashRing::from_tokens(&tokens, 3);
        let set = ring.get(0, RingOp::Write).unwrap();
        assert_eq!(set.min_success, 2);
        assert_eq!(set.max_errors, 1);
    }

    #[test]
    fn shuffle_shard_is_deterministic_for_same_tenant() {
        let tokens = vec![token(10, "a"), token(20, "b"), token(30, "c"), token(40, "d")];
        let full = ConsistentHashRing::from_tokens(&tokens, 1);
        let first = shuffle_shard(&full, "tenant-1", 2);
        let second = shuffle_shard(&full, "tenant-1", 2);
        assert_eq!(first.distinct_instances(), second.distinct_instances());
        assert_eq!(first.distinct_instances().len(), 2);
    }

    #[test]
    fn shuffle_shard_zero_returns_full_ring() {
        let tokens = vec![token(10, "a"), token(20, "b")];
        let full = ConsistentHashRing::from_tokens(&tokens, 1);
        let shard = shuffle_shard(&full, "tenant-1", 0);
        assert_eq!(shard.distinct_instances().len(), 2);
    }
}
