//! Property tests for the snapshot store: concurrent readers never observe
//! a snapshot that mixes values from two publishes.

use proptest::prelude::*;
use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Instant,
};
use yakker_stream::{
    feed::FeedState,
    metric::MetricName,
    snapshot::{MetricSnapshot, Snapshot, SnapshotStore},
};

/// Every metric carries a value derived from the sequence number, so a
/// reader can tell whether all six came from the same publish.
fn uniform_snapshot(sequence: u64, base: f64) -> Snapshot {
    let now = Instant::now();
    let metrics = MetricName::ALL.map(|metric| MetricSnapshot {
        metric,
        value: Some(base + sequence as f64),
        sample_count: sequence as usize,
        computed_at: Some(now),
        last_accepted: Some(now),
        stale: false,
    });
    Snapshot::new(sequence, FeedState::Connected, metrics)
}

fn assert_consistent(snapshot: &Snapshot, base: f64) {
    if snapshot.sequence == 0 {
        assert!(snapshot.metrics().iter().all(|metric| metric.value.is_none()));
        return;
    }
    let expected = base + snapshot.sequence as f64;
    for metric in snapshot.metrics() {
        assert_eq!(metric.value, Some(expected));
        assert_eq!(metric.sample_count as u64, snapshot.sequence);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_readers_never_see_mixed_snapshots(
        publishes in 1u64..200,
        readers in 1usize..6,
        base in -1000.0f64..1000.0,
    ) {
        let store = Arc::new(SnapshotStore::default());
        let done = Arc::new(AtomicBool::new(false));

        let reader_handles: Vec<_> = (0..readers)
            .map(|_| {
                let store = store.clone();
                let done = done.clone();
                thread::spawn(move || {
                    let mut last_sequence = 0;
                    let mut observed = 0u64;
                    loop {
                        let finished = done.load(Ordering::Acquire);
                        let snapshot = store.load();
                        assert_consistent(&snapshot, base);
                        assert!(snapshot.sequence >= last_sequence);
                        last_sequence = snapshot.sequence;
                        observed += 1;
                        if finished {
                            return (last_sequence, observed);
                        }
                    }
                })
            })
            .collect();

        for sequence in 1..=publishes {
            store.replace(uniform_snapshot(sequence, base));
        }
        done.store(true, Ordering::Release);

        for handle in reader_handles {
            let (last_sequence, observed) = handle.join().unwrap();
            prop_assert_eq!(last_sequence, publishes);
            prop_assert!(observed > 0);
        }
    }

    #[test]
    fn prop_replace_returns_what_was_current(sequences in proptest::collection::vec(1u64..10_000, 1..50)) {
        let store = SnapshotStore::default();
        let mut current = 0;
        for sequence in sequences {
            let previous = store.replace(uniform_snapshot(sequence, 0.0));
            prop_assert_eq!(previous.sequence, current);
            current = sequence;
        }
        prop_assert_eq!(store.load().sequence, current);
    }
}
