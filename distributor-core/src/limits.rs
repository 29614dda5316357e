//! Per-tenant validation and quota settings (spec §4.1 step 4, §6).
//!
//! Grounded on the teacher's `spark-core::limits::ResourceKind` pattern: a
//! small, explicit, enumerable set of knobs with documented defaults,
//! rather than an open-ended key/value bag.

/// Validation limits applied to every sample and re-validated after
/// splitting (spec §4.1 steps 4 and 9).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TenantLimits {
    pub max_profile_bytes: usize,
    pub max_stack_depth: usize,
    pub max_samples_per_profile: usize,
    pub max_symbol_value_len: usize,
    pub max_label_name_len: usize,
    pub max_label_value_len: usize,
    pub max_label_count: usize,
    pub max_timestamp_skew_secs: i64,
    pub ingestion_rate_bytes: f64,
    pub ingestion_burst_size_bytes: f64,
    pub ingestion_tenant_shard_size: usize,
    pub max_sessions_per_series: u64,
}

impl Default for TenantLimits {
    /// Conservative defaults in line with the teacher's
    /// `ResourceKind::default_limit`/`max_limit` pairing: generous enough
    /// for normal traffic, small enough to bound a single misbehaving
    /// tenant's blast radius.
    fn default() -> Self {
        Self {
            max_profile_bytes: 4 * 1024 * 1024,
            max_stack_depth: 2048,
            max_samples_per_profile: 100_000,
            max_symbol_value_len: 4096,
            max_label_name_len: 1024,
            max_label_value_len: 2048,
            max_label_count: 64,
            max_timestamp_skew_secs: 300,
            ingestion_rate_bytes: 4.0 * 1024.0 * 1024.0,
            ingestion_burst_size_bytes: 8.0 * 1024.0 * 1024.0,
            ingestion_tenant_shard_size: 0,
            max_sessions_per_series: 0,
        }
    }
}

/// Resolves effective limits for a tenant: a global default overridden by
/// per-tenant configuration entries (spec §6 lists every key as "per
/// tenant").
pub trait LimitsProvider: Send + Sync {
    fn limits_for(&self, tenant_id: &str) -> TenantLimits;
}

/// A `LimitsProvider` that always returns the same limits, useful for
/// tests and single-tenant deployments.
#[derive(Clone, Copy, Debug, Default)]
pub struct StaticLimits(pub TenantLimits);

impl LimitsProvider for StaticLimits {
    fn limits_for(&self, _tenant_id: &str) -> TenantLimits {
        self.0
    }
}

/// Why a profile or byte count was discarded, for the
/// `discarded_profiles`/`discarded_bytes` counters (spec §4.1 step 4,
/// §7). The distilled spec references "reason" without enumerating it;
/// this is the supplemented concrete type (see `SPEC_FULL.md`, §C).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DiscardReason {
    MalformedProfile,
    ProfileTooLarge,
    StackTooDeep,
    TooManySamples,
    SymbolValueTooLong,
    LabelNameTooLong,
    LabelValueTooLong,
    TooManyLabels,
    TimestampOutOfWindow,
    RateLimited,
    InvalidLabels,
}

impl DiscardReason {
    pub fn as_str(self) -> &'static str {
        match self {
            DiscardReason::MalformedProfile => "malformed_profile",
            DiscardReason::ProfileTooLarge => "profile_too_large",
            DiscardReason::StackTooDeep => "stack_too_deep",
            DiscardReason::TooManySamples => "too_many_samples",
            DiscardReason::SymbolValueTooLong => "symbol_value_too_long",
            DiscardReason::LabelNameTooLong => "label_name_too_long",
            DiscardReason::LabelValueTooLong => "label_value_too_long",
            DiscardReason::TooManyLabels => "too_many_labels",
            DiscardReason::TimestampOutOfWindow => "timestamp_out_of_window",
            DiscardReason::RateLimited => "rate_limited",
            DiscardReason::InvalidLabels => "invalid_labels",
        }
    }
}
