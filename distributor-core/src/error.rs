use std::borrow::Cow;

use thiserror::Error;

/// Stable wire-level error domain shared by every layer of the distributor.
///
/// # Why
/// Validation, rate limiting, ring lookups and replication all fail for
/// different reasons but must surface through one small, stable set of
/// kinds so the RPC boundary can map them to the wire codes in spec §7
/// without each call site re-deriving that mapping.
///
/// # What
/// - `Unauthenticated`: tenant id missing from the request context.
/// - `InvalidArgument`: malformed payload, failed validation, empty request.
/// - `ResourceExhausted`: the per-tenant token bucket denied the request.
/// - `DeadlineExceeded`: a per-ingester push timed out, or the caller's
///   context expired while waiting on the quorum tracker.
/// - `Unavailable`: the ring has no healthy instances, a pool dial failed,
///   or a series crossed its replica failure budget.
/// - `Internal`: anything that should never happen in a well-formed
///   deployment; kept distinct from `Unavailable` so dashboards can alert
///   on it separately.
///
/// # Trade-offs
/// `message` is an owned/borrowed `Cow` so call sites that only have a
/// `&'static str` avoid an allocation, while call sites that need to
/// interpolate (rate-limit numbers, peer errors) can still build a
/// `String`.
#[derive(Debug, Error, Clone)]
pub enum DistributorError {
    #[error("missing tenant identity")]
    Unauthenticated,

    #[error("invalid argument: {reason}")]
    InvalidArgument { reason: Cow<'static, str> },

    #[error("rate limit exceeded for tenant `{tenant}`: attempted {attempted} bytes against a limit of {limit} bytes/s")]
    ResourceExhausted {
        tenant: String,
        limit: f64,
        attempted: u64,
    },

    #[error("deadline exceeded: {detail}")]
    DeadlineExceeded { detail: Cow<'static, str> },

    #[error("unavailable: {detail}")]
    Unavailable { detail: Cow<'static, str> },

    #[error("internal error: {detail}")]
    Internal { detail: Cow<'static, str> },
}

impl DistributorError {
    /// Stable machine-readable code, namespaced the way the teacher's
    /// `switch.*` error codes are (`distributor.<kind>`), for metrics
    /// labels and structured logs.
    pub fn code(&self) -> &'static str {
        match self {
            DistributorError::Unauthenticated => "distributor.unauthenticated",
            DistributorError::InvalidArgument { .. } => "distributor.invalid_argument",
            DistributorError::ResourceExhausted { .. } => "distributor.resource_exhausted",
            DistributorError::DeadlineExceeded { .. } => "distributor.deadline_exceeded",
            DistributorError::Unavailable { .. } => "distributor.unavailable",
            DistributorError::Internal { .. } => "distributor.internal",
        }
    }

    pub fn invalid_argument(reason: impl Into<Cow<'static, str>>) -> Self {
        DistributorError::InvalidArgument {
            reason: reason.into(),
        }
    }

    pub fn unavailable(detail: impl Into<Cow<'static, str>>) -> Self {
        DistributorError::Unavailable {
            detail: detail.into(),
        }
    }

    pub fn deadline_exceeded(detail: impl Into<Cow<'static, str>>) -> Self {
        DistributorError::DeadlineExceeded {
            detail: detail.into(),
        }
    }

    pub fn internal(detail: impl Into<Cow<'static, str>>) -> Self {
        DistributorError::Internal {
            detail: detail.into(),
        }
    }
}

pub type Result<T, E = DistributorError> = std::result::Result<T, E>;
