//! Label normalization, canonical formatting and merge semantics.
//!
//! Grounded on the teacher's `spark-core::cluster::membership` pattern of
//! small `Vec`/`BTreeMap`-backed value types with constructor-time
//! invariants (sorted, unique, documented pre/post-conditions) rather than
//! a bespoke multimap type.

use std::cmp::Ordering;
use std::fmt::Write as _;

/// A single `name=value` label, UTF-8 on both sides.
///
/// # Why
/// Profile series and sample labels share this exact shape (spec §3), so
/// one type serves both; callers distinguish them by which `Vec` they sit
/// in, not by type.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LabelPair {
    pub name: String,
    pub value: String,
}

impl LabelPair {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

pub const SERVICE_NAME_LABEL: &str = "service_name";
pub const SESSION_ID_LABEL: &str = "session_id";
const UNSPECIFIED_SERVICE_NAME: &str = "unspecified";

/// Sort labels by name, ascending, and drop duplicate names keeping the
/// first occurrence.
///
/// # What
/// Used both for normalizing a fresh series (step 2 of the pipeline) and
/// for the `merge` rule in step 7, where "series label wins" is encoded
/// simply by sorting the series labels *before* the sample labels so the
/// stable sort's "keep first" rule picks the series value.
pub fn sort_and_dedup(labels: &mut Vec<LabelPair>) {
    labels.sort_by(|a, b| a.name.cmp(&b.name));
    labels.dedup_by(|a, b| a.name == b.name);
}

/// Normalize a series' labels in place: synthesize `service_name` if
/// absent, reduce or strip `session_id`, then sort and de-duplicate.
///
/// # Invariants upheld
/// - Result is sorted by name, ascending, names unique.
/// - Result always contains a `service_name` label.
pub fn normalize_series_labels(labels: &mut Vec<LabelPair>, max_sessions_per_series: u64) {
    if !labels.iter().any(|l| l.name == SERVICE_NAME_LABEL) {
        labels.push(LabelPair::new(SERVICE_NAME_LABEL, UNSPECIFIED_SERVICE_NAME));
    }
    reduce_session_id(labels, max_sessions_per_series);
    sort_and_dedup(labels);
}

/// Apply the session-id reduction rule from spec §3/§9: drop the label
/// entirely when `max_sessions_per_series == 0`, otherwise replace its
/// hexadecimal value with `(value mod max_sessions_per_series)`, rendered
/// back as lowercase hex with no `0x` prefix so downstream grouping on the
/// textual label value stays stable.
///
/// A value that isn't valid hex is left untouched: we have no safe default
/// to reduce it to, and silently dropping a sample over an unparseable
/// label would violate the "fail fast on validation, not on normalization"
/// split spec §4.1 draws between steps 2 and 4.
fn reduce_session_id(labels: &mut Vec<LabelPair>, max_sessions_per_series: u64) {
    if max_sessions_per_series == 0 {
        labels.retain(|l| l.name != SESSION_ID_LABEL);
        return;
    }
    for label in labels.iter_mut() {
        if label.name != SESSION_ID_LABEL {
            continue;
        }
        if let Ok(parsed) = u64::from_str_radix(&label.value, 16) {
            let reduced = parsed % max_sessions_per_series;
            label.value = format!("{reduced:x}");
        }
    }
}

/// Render labels in canonical `{name="value",...}` form over already
/// sorted, de-duplicated input, for tokenization (spec §4.1 step 10).
pub fn canonical_label_string(labels: &[LabelPair]) -> String {
    let mut out = String::with_capacity(labels.len() * 16 + 2);
    out.push('{');
    for (idx, label) in labels.iter().enumerate() {
        if idx > 0 {
            out.push(',');
        }
        let _ = write!(out, "{}=\"{}\"", label.name, label.value);
    }
    out.push('}');
    out
}

/// Merge series labels with sample labels: series labels take precedence,
/// result sorted and de-duplicated by name (first occurrence wins).
///
/// # Idempotence
/// `merge(series_labels, &[])` returns `series_labels` unchanged when the
/// input is already sorted/unique, per spec §8 invariant 8.
pub fn merge_labels(series_labels: &[LabelPair], sample_labels: &[LabelPair]) -> Vec<LabelPair> {
    let mut merged = Vec::with_capacity(series_labels.len() + sample_labels.len());
    merged.extend_from_slice(series_labels);
    merged.extend_from_slice(sample_labels);
    sort_and_dedup(&mut merged);
    merged
}

/// Validate labels against the per-tenant limits the distributor enforces
/// on both the original and the re-split series (spec §4.1 steps 4 and 9).
pub fn validate_labels(
    labels: &[LabelPair],
    max_label_name_len: usize,
    max_label_value_len: usize,
    max_label_count: usize,
) -> Result<(), String> {
    if labels.len() > max_label_count {
        return Err(format!(
            "label count {} exceeds limit {max_label_count}",
            labels.len()
        ));
    }
    for label in labels {
        if label.name.len() > max_label_name_len {
            return Err(format!(
                "label name `{}` exceeds max length {max_label_name_len}",
                label.name
            ));
        }
        if label.value.len() > max_label_value_len {
            return Err(format!(
                "label value for `{}` exceeds max length {max_label_value_len}",
                label.name
            ));
        }
    }
    Ok(())
}

/// Lexicographic comparison helper kept distinct from `Ord` on the whole
/// struct so callers comparing only by name (e.g. binary search) don't
/// need to construct a dummy value.
pub fn name_cmp(a: &LabelPair, b: &str) -> Ordering {
    a.name.as_str().cmp(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthesizes_service_name_when_absent() {
        let mut labels = vec![LabelPair::new("__name__", "cpu")];
        normalize_series_labels(&mut labels, 0);
        assert_eq!(
            labels,
            vec![
                LabelPair::new("__name__", "cpu"),
                LabelPair::new(SERVICE_NAME_LABEL, UNSPECIFIED_SERVICE_NAME),
            ]
        );
    }

    #[test]
    fn reduces_session_id_modulo_n_in_hex() {
        let mut labels = vec![LabelPair::new(SESSION_ID_LABEL, "42")];
        normalize_series_labels(&mut labels, 8);
        let session = labels.iter().find(|l| l.name == SESSION_ID_LABEL).unwrap();
        assert_eq!(session.value, "2");
    }

    #[test]
    fn strips_session_id_when_disabled() {
        let mut labels = vec![LabelPair::new(SESSION_ID_LABEL, "42")];
        normalize_series_labels(&mut labels, 0);
        assert!(!labels.iter().any(|l| l.name == SESSION_ID_LABEL));
    }

    #[test]
    fn merge_is_idempotent_over_empty_sample_labels() {
        let series = vec![
            LabelPair::new("a", "1"),
            LabelPair::new("b", "2"),
        ];
        assert_eq!(merge_labels(&series, &[]), series);
    }

    #[test]
    fn merge_prefers_series_label_on_name_conflict() {
        let series = vec![LabelPair::new("span_id", "series-value")];
        let sample = vec![LabelPair::new("span_id", "sample-value")];
        let merged = merge_labels(&series, &sample);
        assert_eq!(merged, vec![LabelPair::new("span_id", "series-value")]);
    }

    #[test]
    fn canonical_string_matches_sorted_form() {
        let labels = vec![LabelPair::new("a", "1"), LabelPair::new("b", "2")];
        assert_eq!(canonical_label_string(&labels), "{a=\"1\",b=\"2\"}");
    }
}
