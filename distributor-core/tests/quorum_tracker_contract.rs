//! Cross-component contract: `ProfileTracker` (per-series replica
//! bookkeeping) driving `PushTracker` (request-level quorum) the way the
//! fan-out loop in `distributor-service::pipeline` actually does — each
//! `ProfileTracker` crossing its own threshold is what decides whether the
//! request-wide tracker advances.

use distributor_core::error::DistributorError;
use distributor_core::tracker::{ProfileTracker, PushTracker};

#[tokio::test]
async fn push_resolves_once_every_series_independently_reaches_quorum() {
    let (push_tracker, outcome) = PushTracker::new(2);

    let series_a = ProfileTracker::new(2, 1);
    let series_b = ProfileTracker::new(3, 0);

    assert!(!series_a.record_success());
    if series_a.record_success() {
        push_tracker.note_series_succeeded();
    }

    for _ in 0..3 {
        if series_b.record_success() {
            push_tracker.note_series_succeeded();
        }
    }

    outcome.done_rx.await.expect("push should resolve once both series reach quorum");
}

#[tokio::test]
async fn one_series_exhausting_its_failure_budget_fails_the_whole_push() {
    let (push_tracker, outcome) = PushTracker::new(2);

    let healthy = ProfileTracker::new(2, 1);
    let doomed = ProfileTracker::new(2, 1);

    // The healthy series gets one ack; nowhere near quorum yet.
    if healthy.record_success() {
        push_tracker.note_series_succeeded();
    }

    // The doomed series blows its failure budget before ever succeeding.
    assert!(!doomed.record_failure());
    if doomed.record_failure() {
        push_tracker.note_series_failed(DistributorError::unavailable("replica unreachable"));
    }

    let err = outcome.err_rx.await.expect("push should fail once a series exceeds its budget");
    assert!(matches!(err, DistributorError::Unavailable { .. }));
}

#[tokio::test]
async fn duplicate_quorum_crossings_on_the_same_series_do_not_double_count() {
    let (push_tracker, outcome) = PushTracker::new(1);
    let series = ProfileTracker::new(1, 1);

    // Three acks on a min_success=1 series: only the first crossing is
    // reported, so `note_series_succeeded` must only fire once.
    let mut crossings = 0;
    for _ in 0..3 {
        if series.record_success() {
            crossings += 1;
            push_tracker.note_series_succeeded();
        }
    }
    assert_eq!(crossings, 1);
    assert_eq!(series.succeeded(), 3);

    outcome.done_rx.await.expect("single series reaching quorum resolves the push");
}
