use crate::{feed::FeedState, metric::MetricName};
use arc_swap::ArcSwap;
use std::{sync::Arc, time::Instant};

#[derive(Debug, Clone, PartialEq)]
pub struct MetricSnapshot {
    pub metric: MetricName,
    /// Last computed rolling value, kept even once stale.
    pub value: Option<f64>,
    pub sample_count: usize,
    pub computed_at: Option<Instant>,
    pub last_accepted: Option<Instant>,
    pub stale: bool,
}

impl MetricSnapshot {
    pub fn empty(metric: MetricName) -> Self {
        Self {
            metric,
            value: None,
            sample_count: 0,
            computed_at: None,
            last_accepted: None,
            stale: true,
        }
    }

    /// The value consumers should show, `None` for a placeholder.
    pub fn display_value(&self) -> Option<f64> {
        if self.stale { None } else { self.value }
    }
}

/// One complete, immutable set of published values.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub sequence: u64,
    pub feed_state: FeedState,
    metrics: [MetricSnapshot; MetricName::COUNT],
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            sequence: 0,
            feed_state: FeedState::Disconnected,
            metrics: MetricName::ALL.map(MetricSnapshot::empty),
        }
    }
}

impl Snapshot {
    pub fn new(
        sequence: u64,
        feed_state: FeedState,
        metrics: [MetricSnapshot; MetricName::COUNT],
    ) -> Self {
        Self {
            sequence,
            feed_state,
            metrics,
        }
    }

    pub fn metric(&self, metric: MetricName) -> &MetricSnapshot {
        &self.metrics[metric.index()]
    }

    pub fn display_value(&self, metric: MetricName) -> Option<f64> {
        self.metric(metric).display_value()
    }

    pub fn metrics(&self) -> &[MetricSnapshot] {
        &self.metrics
    }
}

/// Single writer, many readers. Writers swap in a whole new snapshot, so a
/// reader holds either the previous one or the next one, never a blend.
#[derive(Debug)]
pub struct SnapshotStore {
    current: ArcSwap<Snapshot>,
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new(Snapshot::default())
    }
}

impl SnapshotStore {
    pub fn new(initial: Snapshot) -> Self {
        Self {
            current: ArcSwap::from_pointee(initial),
        }
    }

    pub fn load(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }

    /// Publish `next`, returning the snapshot it replaced.
    pub fn replace(&self, next: Snapshot) -> Arc<Snapshot> {
        self.current.swap(Arc::new(next))
    }

    /// Publish `next`, returning the handle readers now load.
    pub fn publish(&self, next: Snapshot) -> Arc<Snapshot> {
        let next = Arc::new(next);
        self.current.store(next.clone());
        next
    }
}
