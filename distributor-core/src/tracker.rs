//! Quorum tracking (spec §4.2).
//!
//! # Why
//! Every ingester response arrives on its own fan-out task; the only
//! coordination allowed between them is atomic counters plus a
//! fire-once completion signal, matching the concurrency model in spec §5
//! ("single-writer per series through atomic CAS; channel sends are
//! bounded... with the 'fire once' rule enforced by `Inc()==N` checks").
//! `tokio::sync::oneshot` gives that fire-once guarantee for free: a
//! second `send` is simply a no-op error the caller ignores.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use tokio::sync::oneshot;

use crate::error::DistributorError;

/// Per-series replica bookkeeping.
///
/// # Contract
/// `min_success + max_failures == replication_factor` for the series this
/// tracker belongs to (spec §3, §8 invariant 3); callers construct one
/// `ProfileTracker` per series per request from the `ReplicationSet` that
/// routed it.
#[derive(Debug)]
pub struct ProfileTracker {
    min_success: usize,
    max_failures: usize,
    succeeded: AtomicUsize,
    failed: AtomicUsize,
}

impl ProfileTracker {
    pub fn new(min_success: usize, max_failures: usize) -> Self {
        Self {
            min_success,
            max_failures,
            succeeded: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
        }
    }

    /// Record one successful replica ack. Returns `true` exactly once,
    /// the call during which `succeeded` first reaches `min_success` —
    /// the caller uses that to decrement the request-level pending count
    /// exactly once per series.
    pub fn record_success(&self) -> bool {
        let prior = self.succeeded.fetch_add(1, Ordering::AcqRel);
        prior + 1 == self.min_success
    }

    /// Record one replica failure. Returns `true` exactly once, the call
    /// during which `failed` first exceeds `max_failures` — the caller
    /// uses that to decide whether this series has blown its failure
    /// budget (spec §8 invariant 5).
    pub fn record_failure(&self) -> bool {
        let prior = self.failed.fetch_add(1, Ordering::AcqRel);
        prior + 1 == self.max_failures + 1
    }

    pub fn succeeded(&self) -> usize {
        self.succeeded.load(Ordering::Acquire)
    }

    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::Acquire)
    }

    pub fn min_success(&self) -> usize {
        self.min_success
    }

    pub fn max_failures(&self) -> usize {
        self.max_failures
    }
}

/// Request-level tracker: fires `done` once every series has reached its
/// `min_success`, or `err` the first time any series crosses its
/// `max_failures` (spec §4.1 step 14, §4.2).
pub struct PushTracker {
    samples_pending: AtomicUsize,
    samples_failed: AtomicUsize,
    done_tx: Mutex<Option<oneshot::Sender<()>>>,
    err_tx: Mutex<Option<oneshot::Sender<DistributorError>>>,
}

/// The two ends of the request-level completion signal.
pub struct PushOutcome {
    pub done_rx: oneshot::Receiver<()>,
    pub err_rx: oneshot::Receiver<DistributorError>,
}

impl PushTracker {
    pub fn new(series_count: usize) -> (Self, PushOutcome) {
        let (done_tx, done_rx) = oneshot::channel();
        let (err_tx, err_rx) = oneshot::channel();
        let tracker = Self {
            samples_pending: AtomicUsize::new(series_count),
            samples_failed: AtomicUsize::new(0),
            done_tx: Mutex::new(Some(done_tx)),
            err_tx: Mutex::new(Some(err_tx)),
        };
        (tracker, PushOutcome { done_rx, err_rx })
    }

    /// Call once a series' `ProfileTracker::record_success` returned
    /// `true`. When the request-wide pending count reaches zero, fires
    /// `done` (first caller to observe zero wins; later callers are
    /// no-ops because the `Sender` was already taken and dropped).
    pub fn note_series_succeeded(&self) {
        let prior = self.samples_pending.fetch_sub(1, Ordering::AcqRel);
        if prior == 1 {
            if let Some(tx) = self.done_tx.lock().expect("done_tx poisoned").take() {
                let _ = tx.send(());
            }
        }
    }

    /// Call once a series' `ProfileTracker::record_failure` returned
    /// `true`. Publishes `error` on the error channel at most once,
    /// per the "at-least-one policy" in spec §4.1 ("Failure semantics").
    pub fn note_series_failed(&self, error: DistributorError) {
        let prior = self.samples_failed.fetch_add(1, Ordering::AcqRel);
        if prior == 0 {
            if let Some(tx) = self.err_tx.lock().expect("err_tx poisoned").take() {
                let _ = tx.send(error);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_tracker_fires_min_success_exactly_once() {
        let tracker = ProfileTracker::new(2, 1);
        assert!(!tracker.record_success());
        assert!(tracker.record_success());
        // A third ack still counts but no longer reports a fresh crossing.
        assert!(!tracker.record_success());
        assert_eq!(tracker.succeeded(), 3);
    }

    #[test]
    fn profile_tracker_fires_max_failures_crossing_exactly_once() {
        let tracker = ProfileTracker::new(2, 1);
        assert!(!tracker.record_failure());
        assert!(tracker.record_failure());
        assert!(!tracker.record_failure());
    }

    #[tokio::test]
    async fn push_tracker_signals_done_when_all_series_succeed() {
        let (tracker, outcome) = PushTracker::new(2);
        tracker.note_series_succeeded();
        tracker.note_series_succeeded();
        outcome.done_rx.await.expect("done should fire");
    }

    #[tokio::test]
    async fn push_tracker_signals_err_on_first_failure_only() {
        let (tracker, outcome) = PushTracker::new(2);
        tracker.note_series_failed(DistributorError::unavailable("peer a"));
        tracker.note_series_failed(DistributorError::unavailable("peer b"));
        let err = outcome.err_rx.await.expect("err should fire");
        assert!(matches!(err, DistributorError::Unavailable { .. }));
    }
}
