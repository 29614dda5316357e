//! `distributor-core`: shared contracts, domain types and error taxonomy
//! for the profile ingestion distributor.
//!
//! # Where
//! Plays the role the teacher's `spark-core` plays for the media stack:
//! every concrete crate (`distributor-pprof`, `distributor-ring`,
//! `distributor-service`) depends on this one, never the reverse.

pub mod error;
pub mod label;
pub mod limiter;
pub mod limits;
pub mod model;
pub mod observability;
pub mod pool;
pub mod ring;
pub mod token;
pub mod tracker;

pub use error::{DistributorError, Result};
pub use label::{sort_and_dedup, LabelPair};
pub use limiter::RateLimiter;
pub use limits::{DiscardReason, LimitsProvider, StaticLimits, TenantLimits};
pub use model::{ProfileSample, ProfileSeries, PushRequest, PushResponse, RawProfileType};
pub use observability::{MetricsSink, NoopMetricsSink};
pub use pool::{ConnectionPool, IngesterClient};
pub use ring::{HealthyInstanceCounter, IngesterRingClient, InstanceDesc, InstanceState, RingOp, ReplicationSet, SubRing};
pub use tracker::{ProfileTracker, PushOutcome, PushTracker};
