//! Cross-component contract: a gzip-encoded profile carrying samples from
//! two distinct sessions survives decode -> split -> re-encode -> decode
//! with every sample accounted for and grouped by its sample-level labels,
//! the way `distributor-service::pipeline::split_and_reserialize` drives
//! this crate end to end.

use distributor_core::LabelPair;
use distributor_pprof::{decode_gzip_profile, encode_gzip_profile, extract_sample_series, ExtractOutcome, Label, Profile, Sample};

fn profile_with_two_sessions() -> Profile {
    let mut profile = Profile::empty();
    let session_key = profile.intern("session_id");
    let session_a = profile.intern("session-a");
    let session_b = profile.intern("session-b");

    profile.sample.push(Sample {
        location_id: vec![1, 2],
        value: vec![10],
        label: vec![Label { key: session_key, str: session_a, num: 0, num_unit: 0 }],
    });
    profile.sample.push(Sample {
        location_id: vec![3],
        value: vec![20],
        label: vec![Label { key: session_key, str: session_b, num: 0, num_unit: 0 }],
    });
    profile.sample.push(Sample {
        location_id: vec![1, 2, 4],
        value: vec![30],
        label: vec![Label { key: session_key, str: session_a, num: 0, num_unit: 0 }],
    });
    profile
}

#[test]
fn splitting_a_multi_session_profile_preserves_every_sample_across_the_wire_round_trip() {
    let original = profile_with_two_sessions();
    let wire_bytes = encode_gzip_profile(&original).expect("encoding a well-formed profile never fails");

    let decoded = decode_gzip_profile(&wire_bytes).expect("the just-encoded bytes must decode cleanly");
    assert_eq!(decoded, original);

    let series_labels = vec![LabelPair::new("service_name", "svc")];
    let groups = match extract_sample_series(&series_labels, decoded) {
        ExtractOutcome::Split(groups) => groups,
        ExtractOutcome::Unchanged(_) => panic!("two distinct session ids must split into separate groups"),
    };

    assert_eq!(groups.len(), 2);
    let total_samples: usize = groups.iter().map(|(_, profile)| profile.sample.len()).sum();
    assert_eq!(total_samples, 3, "no sample may be dropped or duplicated while splitting");

    for (labels, profile) in &groups {
        assert!(labels.contains(&LabelPair::new("service_name", "svc")));
        assert!(labels.iter().any(|l| l.name == "session_id"));

        // Every split group must itself survive a further wire round trip.
        let raw = encode_gzip_profile(profile).expect("re-encoding a split profile never fails");
        let redecoded = decode_gzip_profile(&raw).expect("re-decoding the split profile never fails");
        assert_eq!(&redecoded, profile);
    }
}
