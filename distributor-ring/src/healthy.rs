//! `HealthyInstanceCounter` implementation backed by `RingMembership`,
//! read by the rate limiter on every refresh tick (spec §4.4).

use std::sync::Arc;

use distributor_core::ring::HealthyInstanceCounter;

use crate::membership::RingMembership;

pub struct MembershipHealthyInstanceCounter {
    membership: Arc<RingMembership>,
}

impl MembershipHealthyInstanceCounter {
    pub fn new(membership: Arc<RingMembership>) -> Self {
        Self { membership }
    }
}

impl HealthyInstanceCounter for MembershipHealthyInstanceCounter {
    fn healthy_instance_count(&self) -> usize {
        self.membership.healthy_instance_count().max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn never_reports_fewer_than_one() {
        let membership = Arc::new(RingMembership::new(Duration::from_secs(10), 10));
        let counter = MembershipHealthyInstanceCounter::new(membership);
        assert_eq!(counter.healthy_instance_count(), 1);
    }
}
