//! `distributor-service`: the Push request pipeline and its concrete
//! dependencies (rate limiter, connection pool, metrics), plus the binary
//! entry point in `main.rs`.

pub mod config;
pub mod limiter;
pub mod metrics;
pub mod pipeline;
pub mod transport;

pub use config::{ConfigLimitsProvider, DistributorConfig};
pub use limiter::TokenBucketRateLimiter;
pub use metrics::PrometheusMetricsSink;
pub use pipeline::Distributor;
pub use transport::{TcpConnectionPool, TcpIngesterClient};
