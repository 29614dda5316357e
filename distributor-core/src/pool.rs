//! Connection pool and outbound ingester RPC contracts (spec §4.5, §6).

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::DistributorError;
use crate::model::PushRequest;

/// The capability a pooled connection exposes to the pipeline: a single
/// batched `Push` RPC carrying every series routed to that ingester.
///
/// # Why
/// Spec §4.5 says "pool entries expose only the `Push` capability" —
/// deliberately not a general RPC channel — so fan-out tasks can't
/// accidentally reach for unrelated ingester endpoints through a pooled
/// handle.
#[async_trait]
pub trait IngesterClient: Send + Sync {
    async fn push(&self, request: PushRequest) -> Result<(), DistributorError>;
}

/// Keyed-by-address pool of `IngesterClient`s (spec §4.5).
///
/// # Contract
/// - `get` lazily dials on first use and returns a shared, cloneable
///   handle; concurrent callers requesting the same `addr` must not dial
///   twice.
/// - Implementations evict idle entries after a configured TTL and expose
///   a live client-count gauge through the metrics sink.
#[async_trait]
pub trait ConnectionPool: Send + Sync {
    async fn get(&self, addr: &str) -> Result<Arc<dyn IngesterClient>, DistributorError>;
}
