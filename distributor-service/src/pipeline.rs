//! The `Push` request pipeline (spec §4.1): the distributor's 40%-of-budget
//! centerpiece, wiring together every other component built so far.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use distributor_core::error::DistributorError;
use distributor_core::label::{normalize_series_labels, validate_labels};
use distributor_core::limits::{DiscardReason, LimitsProvider, TenantLimits};
use distributor_core::limiter::RateLimiter;
use distributor_core::model::{ProfileSample, ProfileSeries, PushRequest, PushResponse, RawProfileType};
use distributor_core::observability::MetricsSink;
use distributor_core::pool::ConnectionPool;
use distributor_core::ring::{IngesterRingClient, RingOp};
use distributor_core::token::token_for;
use distributor_core::tracker::{ProfileTracker, PushTracker};
use distributor_core::LabelPair;
use distributor_pprof::{decode_gzip_profile, decompressed_len, encode_gzip_profile, extract_sample_series, ExtractOutcome};
use tracing::{info_span, warn, Instrument};

/// Wires the request pipeline's dependencies together; one instance is
/// shared (behind an `Arc`) across every inbound `Push` call.
pub struct Distributor {
    limits: Arc<dyn LimitsProvider>,
    rate_limiter: Arc<dyn RateLimiter>,
    ring_client: Arc<dyn IngesterRingClient>,
    pool: Arc<dyn ConnectionPool>,
    metrics: Arc<dyn MetricsSink>,
    push_timeout: Duration,
}

impl Distributor {
    pub fn new(
        limits: Arc<dyn LimitsProvider>,
        rate_limiter: Arc<dyn RateLimiter>,
        ring_client: Arc<dyn IngesterRingClient>,
        pool: Arc<dyn ConnectionPool>,
        metrics: Arc<dyn MetricsSink>,
        push_timeout: Duration,
    ) -> Self {
        Self { limits, rate_limiter, ring_client, pool, metrics, push_timeout }
    }

    /// Runs the full pipeline for one inbound request (spec §4.1 steps
    /// 1-14). `tenant_id` stands in for what an (out-of-scope) tenant
    /// resolution interceptor would extract from the request context.
    pub async fn push(&self, tenant_id: Option<&str>, mut request: PushRequest) -> Result<PushResponse, DistributorError> {
        let tenant_id = tenant_id.ok_or(DistributorError::Unauthenticated)?;
        let limits = self.limits.limits_for(tenant_id);

        for series in &mut request.series {
            normalize_series_labels(&mut series.labels, limits.max_sessions_per_series);
        }

        let decompressed_bytes = match validate_request(&request, &limits) {
            Ok(bytes) => bytes,
            Err((discard_reason, detail, bytes_so_far)) => {
                self.metrics.inc_discarded_profiles(tenant_id, discard_reason, 1);
                self.metrics.inc_discarded_bytes(tenant_id, discard_reason, bytes_so_far);
                return Err(DistributorError::invalid_argument(detail));
            }
        };

        if request.is_empty() {
            return Err(DistributorError::invalid_argument("no profiles received"));
        }

        if let Err(effective_rate) = self.rate_limiter.allow_n(tenant_id, decompressed_bytes) {
            self.metrics.inc_discarded_profiles(tenant_id, DiscardReason::RateLimited, request.total_samples() as u64);
            self.metrics.inc_discarded_bytes(tenant_id, DiscardReason::RateLimited, decompressed_bytes);
            return Err(DistributorError::ResourceExhausted {
                tenant: tenant_id.to_string(),
                limit: effective_rate,
                attempted: decompressed_bytes,
            });
        }

        let resulting_series = split_and_reserialize(request)?;

        for series in &resulting_series {
            validate_labels(&series.labels, limits.max_label_name_len, limits.max_label_value_len, limits.max_label_count)
                .map_err(DistributorError::invalid_argument)?;
        }

        self.replicate(tenant_id, resulting_series, limits.ingestion_tenant_shard_size).await
    }

    async fn replicate(
        &self,
        tenant_id: &str,
        resulting_series: Vec<ProfileSeries>,
        tenant_shard_size: usize,
    ) -> Result<PushResponse, DistributorError> {
        let sub_ring = self.ring_client.shuffle_shard(tenant_id, tenant_shard_size);

        let mut profile_trackers = Vec::with_capacity(resulting_series.len());
        let mut per_addr: HashMap<String, Vec<usize>> = HashMap::new();
        for (index, series) in resulting_series.iter().enumerate() {
            let token = token_for(tenant_id, &series.labels);
            let replication_set = sub_ring.get(token, RingOp::Write)?;
            for instance in &replication_set.instances {
                per_addr.entry(instance.addr.clone()).or_default().push(index);
            }
            profile_trackers.push(Arc::new(ProfileTracker::new(replication_set.min_success, replication_set.max_errors)));
        }

        let (push_tracker, outcome) = PushTracker::new(resulting_series.len());
        let push_tracker = Arc::new(push_tracker);
        let resulting_series = Arc::new(resulting_series);

        for (addr, indices) in per_addr {
            let pool = self.pool.clone();
            let push_timeout = self.push_timeout;
            let push_tracker = push_tracker.clone();
            let profile_trackers = profile_trackers.clone();
            let resulting_series = resulting_series.clone();
            let span = info_span!("ingester_fanout", addr = %addr, series = indices.len());
            // Deliberately `tokio::spawn`, not awaited inline: the inbound
            // caller's own cancellation must not reach these tasks (spec
            // §5, §9 "background-rooted context").
            tokio::spawn(
                async move {
                    let batch = PushRequest::new(indices.iter().map(|&i| resulting_series[i].clone()).collect());
                    let outcome = async {
                        let client = pool.get(&addr).await?;
                        tokio::time::timeout(push_timeout, client.push(batch))
                            .await
                            .map_err(|_| DistributorError::deadline_exceeded(format!("push to {addr} timed out")))?
                    }
                    .await;

                    match outcome {
                        Ok(()) => {
                            for &i in &indices {
                                if profile_trackers[i].record_success() {
                                    push_tracker.note_series_succeeded();
                                }
                            }
                        }
                        Err(error) => {
                            warn!(addr = %addr, error = %error, "ingester push failed");
                            for &i in &indices {
                                if profile_trackers[i].record_failure() {
                                    push_tracker.note_series_failed(error.clone());
                                }
                            }
                        }
                    }
                }
                .instrument(span),
            );
        }

        tokio::select! {
            done = outcome.done_rx => {
                done.map_err(|_| DistributorError::internal("push tracker dropped before completion"))?;
                Ok(PushResponse)
            }
            err = outcome.err_rx => {
                Err(err.map_err(|_| DistributorError::internal("push tracker dropped before completion"))?)
            }
        }
    }
}

/// Steps 4-5: per-sample validation against per-tenant limits, fail-fast
/// on the first violation (spec §7: "Validation and parse errors fail
/// fast, return immediately"). Returns the request's total *decompressed*
/// byte size on success — the figure rate-limiting and discard-byte
/// metrics are defined over, not the gzip-compressed wire size. On
/// failure the bytes decoded before the failing sample are still
/// returned, so the caller can record a meaningful (if partial) discard
/// total instead of falling back to the compressed size.
fn validate_request(request: &PushRequest, limits: &TenantLimits) -> Result<u64, (DiscardReason, String, u64)> {
    let now_secs = SystemTime::now().duration_since(SystemTime::UNIX_EPOCH).map(|d| d.as_secs() as i64).unwrap_or(0);
    let mut decompressed_bytes: u64 = 0;

    for series in &request.series {
        for sample in &series.samples {
            if sample.raw_profile.len() > limits.max_profile_bytes {
                return Err((
                    DiscardReason::ProfileTooLarge,
                    format!("profile of {} bytes exceeds limit {}", sample.raw_profile.len(), limits.max_profile_bytes),
                    decompressed_bytes,
                ));
            }
            if sample.format != RawProfileType::Pprof {
                // No decompression concept for opaque formats; the raw
                // size is the best available measure for accounting.
                decompressed_bytes += sample.raw_profile.len() as u64;
                continue;
            }
            let profile = decode_gzip_profile(&sample.raw_profile)
                .map_err(|e| (DiscardReason::MalformedProfile, format!("failed to decode profile: {e}"), decompressed_bytes))?;
            decompressed_bytes += decompressed_len(&profile) as u64;
            if profile.sample.len() > limits.max_samples_per_profile {
                return Err((
                    DiscardReason::TooManySamples,
                    format!("{} samples exceeds limit {}", profile.sample.len(), limits.max_samples_per_profile),
                    decompressed_bytes,
                ));
            }
            for inner_sample in &profile.sample {
                if inner_sample.location_id.len() > limits.max_stack_depth {
                    return Err((
                        DiscardReason::StackTooDeep,
                        format!("stack depth {} exceeds limit {}", inner_sample.location_id.len(), limits.max_stack_depth),
                        decompressed_bytes,
                    ));
                }
            }
            if let Some(longest) = profile.string_table.iter().map(|s| s.len()).max() {
                if longest > limits.max_symbol_value_len {
                    return Err((
                        DiscardReason::SymbolValueTooLong,
                        format!("symbol value of {longest} bytes exceeds limit {}", limits.max_symbol_value_len),
                        decompressed_bytes,
                    ));
                }
            }
            let skew = (now_secs - profile.time_nanos / 1_000_000_000).abs();
            if skew > limits.max_timestamp_skew_secs {
                return Err((
                    DiscardReason::TimestampOutOfWindow,
                    format!("timestamp skew {skew}s exceeds window {}s", limits.max_timestamp_skew_secs),
                    decompressed_bytes,
                ));
            }
        }
        validate_labels(&series.labels, limits.max_label_name_len, limits.max_label_value_len, limits.max_label_count)
            .map_err(|detail| (DiscardReason::InvalidLabels, detail, decompressed_bytes))?;
    }
    Ok(decompressed_bytes)
}

/// Steps 7-8: split each pprof sample by its remaining sample labels,
/// re-serialize every resulting sample with a fresh id. Non-pprof samples
/// pass through unchanged (their internal structure is an external
/// decoder's concern, per spec §1's scope note) but still receive a fresh
/// id, matching the blanket rule in step 8.
fn split_and_reserialize(request: PushRequest) -> Result<Vec<ProfileSeries>, DistributorError> {
    let mut by_labels: Vec<(Vec<LabelPair>, Vec<ProfileSample>)> = Vec::new();

    let mut push_sample = |labels: Vec<LabelPair>, sample: ProfileSample| {
        if let Some((_, samples)) = by_labels.iter_mut().find(|(existing, _)| *existing == labels) {
            samples.push(sample);
        } else {
            by_labels.push((labels, vec![sample]));
        }
    };

    for series in request.series {
        for sample in series.samples {
            if sample.format != RawProfileType::Pprof {
                push_sample(series.labels.clone(), sample.with_fresh_id());
                continue;
            }
            let profile = decode_gzip_profile(&sample.raw_profile)
                .map_err(|e| DistributorError::invalid_argument(format!("failed to decode profile during split: {e}")))?;
            match extract_sample_series(&series.labels, profile) {
                ExtractOutcome::Unchanged(profile) => {
                    let raw_profile = encode_gzip_profile(&profile)
                        .map_err(|e| DistributorError::internal(format!("failed to re-encode profile: {e}")))?;
                    let new_sample = ProfileSample::new(raw_profile, RawProfileType::Pprof).with_fresh_id();
                    push_sample(series.labels.clone(), new_sample);
                }
                ExtractOutcome::Split(groups) => {
                    for (merged_labels, profile) in groups {
                        let raw_profile = encode_gzip_profile(&profile)
                            .map_err(|e| DistributorError::internal(format!("failed to re-encode split profile: {e}")))?;
                        let new_sample = ProfileSample::new(raw_profile, RawProfileType::Pprof).with_fresh_id();
                        push_sample(merged_labels, new_sample);
                    }
                }
            }
        }
    }

    Ok(by_labels.into_iter().map(|(labels, samples)| ProfileSeries::new(labels, samples)).collect())
}
