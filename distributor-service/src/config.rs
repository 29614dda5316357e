//! TOML-backed configuration, keyed the way spec §6 enumerates: one
//! section per component, per-tenant overrides layered on top of a
//! fleet-wide default.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use distributor_core::limits::TenantLimits;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DistributorConfig {
    pub push: PushConfig,
    pub ring: RingConfig,
    pub replication_factor: usize,
    pub limits: LimitsConfig,
}

impl Default for DistributorConfig {
    fn default() -> Self {
        Self {
            push: PushConfig::default(),
            ring: RingConfig::default(),
            replication_factor: 1,
            limits: LimitsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PushConfig {
    pub timeout_secs: u64,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self { timeout_secs: 5 }
    }
}

impl PushConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RingConfig {
    pub instance_id: String,
    pub instance_addr: String,
    pub zone: String,
    pub num_tokens: usize,
    pub heartbeat_period_secs: u64,
    pub heartbeat_timeout_secs: u64,
    pub auto_forget_unhealthy_periods: u32,
}

impl Default for RingConfig {
    fn default() -> Self {
        Self {
            instance_id: "distributor-0".into(),
            instance_addr: "127.0.0.1:9095".into(),
            zone: "zone-default".into(),
            num_tokens: 128,
            heartbeat_period_secs: 5,
            heartbeat_timeout_secs: 60,
            auto_forget_unhealthy_periods: 10,
        }
    }
}

impl RingConfig {
    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat_timeout_secs)
    }

    pub fn heartbeat_period(&self) -> Duration {
        Duration::from_secs(self.heartbeat_period_secs)
    }
}

/// Per-tenant limits, with an optional fleet-wide `default` plus overrides
/// keyed by tenant id; mirrors Mimir-style per-tenant override files
/// without depending on any particular overrides-loader crate.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub default: TenantLimitsConfig,
    pub tenants: HashMap<String, TenantLimitsConfig>,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self { default: TenantLimitsConfig::default(), tenants: HashMap::new() }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct TenantLimitsConfig {
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

impl Default for TenantLimitsConfig {
    fn default() -> Self {
        Self::from(TenantLimits::default())
    }
}

impl From<TenantLimits> for TenantLimitsConfig {
    fn from(limits: TenantLimits) -> Self {
        Self {
            max_profile_bytes: limits.max_profile_bytes,
            max_stack_depth: limits.max_stack_depth,
            max_samples_per_profile: limits.max_samples_per_profile,
            max_symbol_value_len: limits.max_symbol_value_len,
            max_label_name_len: limits.max_label_name_len,
            max_label_value_len: limits.max_label_value_len,
            max_label_count: limits.max_label_count,
            max_timestamp_skew_secs: limits.max_timestamp_skew_secs,
            ingestion_rate_bytes: limits.ingestion_rate_bytes,
            ingestion_burst_size_bytes: limits.ingestion_burst_size_bytes,
            ingestion_tenant_shard_size: limits.ingestion_tenant_shard_size,
            max_sessions_per_series: limits.max_sessions_per_series,
        }
    }
}

impl From<TenantLimitsConfig> for TenantLimits {
    fn from(cfg: TenantLimitsConfig) -> Self {
        Self {
            max_profile_bytes: cfg.max_profile_bytes,
            max_stack_depth: cfg.max_stack_depth,
            max_samples_per_profile: cfg.max_samples_per_profile,
            max_symbol_value_len: cfg.max_symbol_value_len,
            max_label_name_len: cfg.max_label_name_len,
            max_label_value_len: cfg.max_label_value_len,
            max_label_count: cfg.max_label_count,
            max_timestamp_skew_secs: cfg.max_timestamp_skew_secs,
            ingestion_rate_bytes: cfg.ingestion_rate_bytes,
            ingestion_burst_size_bytes: cfg.ingestion_burst_size_bytes,
            ingestion_tenant_shard_size: cfg.ingestion_tenant_shard_size,
            max_sessions_per_series: cfg.max_sessions_per_series,
        }
    }
}

impl DistributorConfig {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path.as_ref())?;
        let config = toml::from_str(&raw)?;
        Ok(config)
    }
}

/// Adapts `LimitsConfig` to `distributor_core::limits::LimitsProvider`,
/// falling back to the fleet-wide default for any tenant without an
/// explicit override.
pub struct ConfigLimitsProvider {
    default: TenantLimits,
    overrides: HashMap<String, TenantLimits>,
}

impl ConfigLimitsProvider {
    pub fn new(config: LimitsConfig) -> Self {
        Self {
            default: config.default.into(),
            overrides: config.tenants.into_iter().map(|(id, cfg)| (id, cfg.into())).collect(),
        }
    }
}

impl distributor_core::limits::LimitsProvider for ConfigLimitsProvider {
    fn limits_for(&self, tenant_id: &str) -> TenantLimits {
        self.overrides.get(tenant_id).copied().unwrap_or(self.default)
    }
}
