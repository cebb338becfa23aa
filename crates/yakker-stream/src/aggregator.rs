//! Collapses the duplicated, partial readings the feed sends for one pitch or
//! batted ball into a single value per metric.
//!
//! An event stays open until either a message flagged final arrives for it or
//! no message has been seen for the grace interval. Closing an event yields
//! the mean of every valid reading per metric; metrics with no valid reading
//! yield nothing, so the smoother keeps whatever it had.

use crate::{
    constants::{DEFAULT_EVENT_GRACE_MS, MIN_HIT_DISTANCE_FT},
    metric::{AggregatedReading, MetricEvent, MetricName, RawValue},
};
use std::{
    collections::HashMap,
    time::{Duration, Instant},
};
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct AggregatorPolicy {
    /// Quiet period after which an event is considered complete.
    pub grace: Duration,
    pub min_hit_distance_ft: f64,
    /// `None` disables the exit-velocity filter.
    pub min_exit_velocity_mph: Option<f64>,
}

impl Default for AggregatorPolicy {
    fn default() -> Self {
        Self {
            grace: Duration::from_millis(DEFAULT_EVENT_GRACE_MS),
            min_hit_distance_ft: MIN_HIT_DISTANCE_FT,
            min_exit_velocity_mph: None,
        }
    }
}

impl AggregatorPolicy {
    pub fn with_min_exit_velocity(mut self, threshold_mph: f64) -> Self {
        self.min_exit_velocity_mph = Some(threshold_mph);
        self
    }

    pub fn admit(&self, metric: MetricName, raw: RawValue) -> Result<f64, Rejection> {
        let value = match raw {
            // A zero is the tracker reporting no lock, not a measurement.
            RawValue::Value(v) if v != 0.0 => v,
            _ => return Err(Rejection::NotAvailable),
        };

        match metric {
            MetricName::HitDistance if value < self.min_hit_distance_ft => {
                Err(Rejection::ShortCarry)
            }
            MetricName::ExitVelocity
                if self
                    .min_exit_velocity_mph
                    .is_some_and(|threshold| value < threshold) =>
            {
                Err(Rejection::BelowMinExitVelocity)
            }
            _ => Ok(value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    NotAvailable,
    ShortCarry,
    BelowMinExitVelocity,
}

impl Rejection {
    pub const fn as_str(self) -> &'static str {
        match self {
            Rejection::NotAvailable => "not_available",
            Rejection::ShortCarry => "short_carry",
            Rejection::BelowMinExitVelocity => "below_min_exit_velocity",
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Accumulator {
    sum: f64,
    count: usize,
}

impl Accumulator {
    fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

#[derive(Debug)]
struct PendingEvent {
    last_seen: Instant,
    totals: [Accumulator; MetricName::COUNT],
}

impl PendingEvent {
    fn new(now: Instant) -> Self {
        Self {
            last_seen: now,
            totals: [Accumulator::default(); MetricName::COUNT],
        }
    }

    fn into_readings(self, event_id: &str) -> Vec<AggregatedReading> {
        MetricName::ALL
            .iter()
            .filter_map(|&metric| {
                let totals = self.totals[metric.index()];
                totals.mean().map(|value| AggregatedReading {
                    event_id: event_id.to_string(),
                    metric,
                    value,
                    sample_count: totals.count,
                })
            })
            .collect()
    }
}

/// Per-event accumulation. Owned by the processing task alone.
#[derive(Debug)]
pub struct EventAggregator {
    policy: AggregatorPolicy,
    pending: HashMap<String, PendingEvent>,
}

impl EventAggregator {
    pub fn new(policy: AggregatorPolicy) -> Self {
        Self {
            policy,
            pending: HashMap::new(),
        }
    }

    pub fn policy(&self) -> &AggregatorPolicy {
        &self.policy
    }

    pub fn pending_events(&self) -> usize {
        self.pending.len()
    }

    /// Fold one message into its event. Returns the event's readings when the
    /// message closes it, otherwise nothing.
    pub fn ingest(&mut self, event: MetricEvent) -> Vec<AggregatedReading> {
        let pending = self
            .pending
            .entry(event.event_id.clone())
            .or_insert_with(|| PendingEvent::new(event.received_at));
        pending.last_seen = pending.last_seen.max(event.received_at);

        for (metric, raw) in event.readings {
            match self.policy.admit(metric, raw) {
                Ok(value) => pending.totals[metric.index()].add(value),
                Err(rejection) => {
                    if rejection != Rejection::NotAvailable {
                        debug!(
                            event_id = %event.event_id,
                            %metric,
                            ?raw,
                            reason = rejection.as_str(),
                            "reading filtered"
                        );
                    }
                    metrics::counter!(
                        "yakker_stream_readings_rejected",
                        "reason" => rejection.as_str()
                    )
                    .increment(1);
                }
            }
        }

        if event.is_final {
            self.close(&event.event_id)
        } else {
            Vec::new()
        }
    }

    /// Close every event that has been quiet for at least the grace interval,
    /// oldest first.
    pub fn close_expired(&mut self, now: Instant) -> Vec<AggregatedReading> {
        let grace = self.policy.grace;
        let mut expired: Vec<(Instant, String)> = self
            .pending
            .iter()
            .filter(|(_, pending)| now.saturating_duration_since(pending.last_seen) >= grace)
            .map(|(id, pending)| (pending.last_seen, id.clone()))
            .collect();
        expired.sort();

        expired
            .into_iter()
            .flat_map(|(_, id)| self.close(&id))
            .collect()
    }

    /// Close everything regardless of age. Used on shutdown.
    pub fn flush(&mut self) -> Vec<AggregatedReading> {
        let mut ids: Vec<(Instant, String)> = self
            .pending
            .iter()
            .map(|(id, pending)| (pending.last_seen, id.clone()))
            .collect();
        ids.sort();

        ids.into_iter().flat_map(|(_, id)| self.close(&id)).collect()
    }

    fn close(&mut self, event_id: &str) -> Vec<AggregatedReading> {
        let Some(pending) = self.pending.remove(event_id) else {
            return Vec::new();
        };
        let readings = pending.into_readings(event_id);
        metrics::counter!("yakker_stream_events_closed").increment(1);
        debug!(event_id, metrics = readings.len(), "event closed");
        readings
    }
}
