use crate::{
    constants::{ROLLING_RETENTION, SMOOTHING_WINDOW},
    metric::{AggregatedReading, MetricName},
    snapshot::MetricSnapshot,
    staleness::StalenessPolicy,
};
use std::{
    collections::VecDeque,
    time::{Duration, Instant},
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmootherConfig {
    /// How long entries stay in a window at all.
    pub retention: Duration,
    /// Entries younger than this feed the rolling average.
    pub smoothing: Duration,
    pub staleness: StalenessPolicy,
}

impl Default for SmootherConfig {
    fn default() -> Self {
        Self {
            retention: ROLLING_RETENTION,
            smoothing: SMOOTHING_WINDOW,
            staleness: StalenessPolicy::default(),
        }
    }
}

/// Timestamped values for one metric, oldest at the front.
#[derive(Debug, Clone, Default)]
pub struct RollingWindow {
    entries: VecDeque<(Instant, f64)>,
}

impl RollingWindow {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Timestamps never go backwards; a late arrival is filed at the newest
    /// timestamp already held.
    pub fn push(&mut self, at: Instant, value: f64) {
        let at = match self.entries.back() {
            Some(&(newest, _)) if at < newest => newest,
            _ => at,
        };
        self.entries.push_back((at, value));
    }

    /// Drop entries older than `retention`.
    pub fn purge(&mut self, now: Instant, retention: Duration) {
        while let Some(&(at, _)) = self.entries.front() {
            if now.saturating_duration_since(at) > retention {
                self.entries.pop_front();
            } else {
                break;
            }
        }
    }

    /// Mean and count of entries no older than `window`.
    pub fn average(&self, now: Instant, window: Duration) -> Option<(f64, usize)> {
        let (sum, count) = self
            .entries
            .iter()
            .rev()
            .take_while(|(at, _)| now.saturating_duration_since(*at) <= window)
            .fold((0.0, 0usize), |(sum, count), (_, value)| (sum + value, count + 1));

        (count > 0).then(|| (sum / count as f64, count))
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Instant, f64)> {
        self.entries.iter()
    }
}

#[derive(Debug, Clone, Copy)]
struct Published {
    value: f64,
    sample_count: usize,
    computed_at: Instant,
}

/// Holds the rolling windows and builds snapshots from them on the publish
/// cadence.
#[derive(Debug)]
pub struct RollingSmoother {
    config: SmootherConfig,
    windows: [RollingWindow; MetricName::COUNT],
    published: [Option<Published>; MetricName::COUNT],
    last_accepted: [Option<Instant>; MetricName::COUNT],
}

impl RollingSmoother {
    pub fn new(config: SmootherConfig) -> Self {
        Self {
            config,
            windows: Default::default(),
            published: [None; MetricName::COUNT],
            last_accepted: [None; MetricName::COUNT],
        }
    }

    pub fn config(&self) -> &SmootherConfig {
        &self.config
    }

    pub fn window(&self, metric: MetricName) -> &RollingWindow {
        &self.windows[metric.index()]
    }

    pub fn record(&mut self, reading: &AggregatedReading, now: Instant) {
        let i = reading.metric.index();
        self.windows[i].push(now, reading.value);
        self.windows[i].purge(now, self.config.retention);
        self.last_accepted[i] = Some(now);
    }

    /// Purge every window, recompute the rolling averages and build the next
    /// snapshot. A metric whose smoothing window is empty keeps the value it
    /// last published until it goes stale.
    pub fn recompute(&mut self, now: Instant) -> [MetricSnapshot; MetricName::COUNT] {
        for metric in MetricName::ALL {
            let i = metric.index();
            self.windows[i].purge(now, self.config.retention);
            if let Some((value, sample_count)) =
                self.windows[i].average(now, self.config.smoothing)
            {
                self.published[i] = Some(Published {
                    value,
                    sample_count,
                    computed_at: now,
                });
            }
        }

        MetricName::ALL.map(|metric| {
            let i = metric.index();
            let stale = self.config.staleness.is_stale(self.last_accepted[i], now);
            match self.published[i] {
                Some(published) => MetricSnapshot {
                    metric,
                    value: Some(published.value),
                    sample_count: published.sample_count,
                    computed_at: Some(published.computed_at),
                    last_accepted: self.last_accepted[i],
                    stale,
                },
                None => MetricSnapshot::empty(metric),
            }
        })
    }
}
