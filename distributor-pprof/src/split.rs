//! Sample-label extraction and per-group splitting (spec §4.1 step 7,
//! §8 invariant 7, §8 round-trip property).

use std::collections::BTreeMap;

use distributor_core::{label::merge_labels, sort_and_dedup, LabelPair};

use crate::proto::{Profile, Sample};

const LEGACY_PROFILE_ID_KEY: &str = "profile_id";
const SPAN_ID_KEY: &str = "span_id";

/// Result of running `extract_sample_series` over one original sample's
/// profile.
pub enum ExtractOutcome {
    /// Zero or one (label-less) group: the sample keeps its original
    /// series unchanged, modulo the `profile_id` -> `span_id` rename.
    Unchanged(Profile),
    /// Two or more distinct sample-label sets: one new series per group,
    /// each carrying `merge(series_labels, group_labels)`.
    Split(Vec<(Vec<LabelPair>, Profile)>),
}

/// Rename any sample label keyed `profile_id` to `span_id`, consolidating
/// historical naming (spec §4.1 step 7). Renaming only repoints the
/// label's `key` string-table index — other labels sharing that index are
/// unaffected because every occurrence of `profile_id` point at the same
/// interned string and is retargeted identically.
fn rename_profile_id_to_span_id(profile: &mut Profile) {
    let profile_id_idx = profile
        .string_table
        .iter()
        .position(|s| s == LEGACY_PROFILE_ID_KEY);
    let Some(profile_id_idx) = profile_id_idx else {
        return;
    };
    let span_id_idx = profile.intern(SPAN_ID_KEY);
    let profile_id_idx = profile_id_idx as i64;
    for sample in profile.sample.iter_mut() {
        for label in sample.label.iter_mut() {
            if label.key == profile_id_idx {
                label.key = span_id_idx;
            }
        }
    }
}

/// Resolve a sample's string-valued labels into `LabelPair`s, sorted and
/// de-duplicated. Purely numeric labels (`num`/`num_unit` with no `str`)
/// are not part of the grouping key: nothing in the distributor's
/// splitting contract (spec §4.1 step 7) groups on numeric sample values,
/// only on the textual labels like `span_id`/`session_id`.
fn resolved_sample_labels(profile: &Profile, sample: &Sample) -> Vec<LabelPair> {
    let mut labels: Vec<LabelPair> = sample
        .label
        .iter()
        .filter(|label| label.str != 0)
        .map(|label| LabelPair::new(profile.string_at(label.key), profile.string_at(label.str)))
        .collect();
    sort_and_dedup(&mut labels);
    labels
}

/// Build a fresh `Profile` sharing the parent's metadata (sample types,
/// timing, string table) but holding only `samples`.
fn export_profile_shell(parent: &Profile, samples: Vec<Sample>) -> Profile {
    Profile {
        sample_type: parent.sample_type.clone(),
        sample: samples,
        string_table: parent.string_table.clone(),
        time_nanos: parent.time_nanos,
        duration_nanos: parent.duration_nanos,
        period_type: parent.period_type.clone(),
        period: parent.period,
        comment: parent.comment.clone(),
        default_sample_type: parent.default_sample_type,
    }
}

/// Split one sample's profile by its samples' label sets (spec §4.1 step
/// 7). `series_labels` are the owning `ProfileSeries`' labels, used only
/// to build the merged labels of any resulting split series — this
/// function does not itself merge them into `profile`.
pub fn extract_sample_series(series_labels: &[LabelPair], mut profile: Profile) -> ExtractOutcome {
    rename_profile_id_to_span_id(&mut profile);

    let labels_per_sample: Vec<Vec<LabelPair>> = profile
        .sample
        .iter()
        .map(|sample| resolved_sample_labels(&profile, sample))
        .collect();

    let mut groups: BTreeMap<Vec<LabelPair>, Vec<usize>> = BTreeMap::new();
    for (index, labels) in labels_per_sample.into_iter().enumerate() {
        groups.entry(labels).or_default().push(index);
    }

    let only_one_empty_group = groups.len() <= 1 && groups.keys().next().is_none_or(Vec::is_empty);
    if only_one_empty_group {
        return ExtractOutcome::Unchanged(profile);
    }

    let mut slots: Vec<Option<Sample>> = std::mem::take(&mut profile.sample)
        .into_iter()
        .map(Some)
        .collect();

    let mut output = Vec::with_capacity(groups.len());
    for (group_labels, indices) in groups {
        let group_samples: Vec<Sample> = indices
            .into_iter()
            .map(|i| slots[i].take().expect("each sample belongs to exactly one group"))
            .collect();
        let exported = export_profile_shell(&profile, group_samples);
        let merged = merge_labels(series_labels, &group_labels);
        output.push((merged, exported));
    }
    ExtractOutcome::Split(output)
}
