use crate::{
    Result,
    aggregator::EventAggregator,
    constants::{EVENT_SWEEP_INTERVAL, PUBLISH_INTERVAL},
    export::LivedataWriter,
    feed::FeedState,
    metric::{AggregatedReading, MetricEvent},
    smoother::RollingSmoother,
    snapshot::{Snapshot, SnapshotStore},
};
use std::{fmt::Write, sync::Arc, time::Instant};
use tokio::{
    sync::{mpsc::UnboundedReceiver, watch},
    time::{MissedTickBehavior, interval},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Sole owner of the aggregator and the smoother. Consumes decoded events,
/// closes events as their grace interval runs out, and publishes a fresh
/// snapshot (and livedata file) on every publish tick.
pub struct Processor {
    aggregator: EventAggregator,
    smoother: RollingSmoother,
    rx: UnboundedReceiver<MetricEvent>,
    store: Arc<SnapshotStore>,
    feed_state: watch::Receiver<FeedState>,
    livedata: Option<LivedataWriter>,
    console: bool,
    sequence: u64,
}

impl Processor {
    pub fn new(
        aggregator: EventAggregator,
        smoother: RollingSmoother,
        rx: UnboundedReceiver<MetricEvent>,
        store: Arc<SnapshotStore>,
        feed_state: watch::Receiver<FeedState>,
    ) -> Self {
        let sequence = store.load().sequence;
        Self {
            aggregator,
            smoother,
            rx,
            store,
            feed_state,
            livedata: None,
            console: false,
            sequence,
        }
    }

    pub fn with_livedata(mut self, writer: LivedataWriter) -> Self {
        self.livedata = Some(writer);
        self
    }

    pub fn with_console(mut self, enabled: bool) -> Self {
        self.console = enabled;
        self
    }

    pub async fn run(&mut self, shutdown_listener: CancellationToken) -> Result<()> {
        info!(
            grace = ?self.aggregator.policy().grace,
            stale_timeout = ?self.smoother.config().staleness.timeout,
            "processor starting"
        );

        let mut sweep_timer = interval(EVENT_SWEEP_INTERVAL);
        sweep_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut publish_timer = interval(PUBLISH_INTERVAL);
        publish_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = shutdown_listener.cancelled() => {
                    info!("shutdown signal detected; flushing pending events");
                    break;
                }
                // Ahead of events so a busy feed cannot hold back the cadence.
                _ = publish_timer.tick() => {
                    self.publish(crate::now()).await;
                }
                event = self.rx.recv() => {
                    let Some(event) = event else {
                        warn!("event channel closed; processor stopping");
                        break;
                    };
                    let readings = self.aggregator.ingest(event);
                    self.accept(&readings, crate::now());
                }
                _ = sweep_timer.tick() => {
                    let now = crate::now();
                    let readings = self.aggregator.close_expired(now);
                    self.accept(&readings, now);
                }
            }
        }

        let now = crate::now();
        while let Ok(event) = self.rx.try_recv() {
            let readings = self.aggregator.ingest(event);
            self.accept(&readings, now);
        }
        let readings = self.aggregator.flush();
        self.accept(&readings, now);
        let last = self.publish(now).await;
        info!(sequence = last.sequence, "processor stopped");
        Ok(())
    }

    fn accept(&mut self, readings: &[AggregatedReading], now: Instant) {
        if readings.is_empty() {
            return;
        }
        for reading in readings {
            self.smoother.record(reading, now);
        }
        metrics::counter!("yakker_stream_readings_accepted").increment(readings.len() as u64);

        if self.console {
            for event in readings.chunk_by(|a, b| a.event_id == b.event_id) {
                info!(
                    target: "yakker_stream::console",
                    event_id = %event[0].event_id,
                    "{}",
                    console_summary(event)
                );
            }
        }
    }

    /// Recompute every metric and swap the result into the store.
    pub async fn publish(&mut self, now: Instant) -> Arc<Snapshot> {
        self.sequence += 1;
        let values = self.smoother.recompute(now);
        let feed_state = *self.feed_state.borrow();
        let current = self
            .store
            .publish(Snapshot::new(self.sequence, feed_state, values));
        metrics::counter!("yakker_stream_snapshots_published").increment(1);
        debug!(sequence = current.sequence, %feed_state, "snapshot published");

        if let Some(writer) = &self.livedata {
            if let Err(err) = writer.write(&current).await {
                warn!(?err, "failed to write livedata file");
                metrics::counter!("yakker_stream_livedata_write_failed").increment(1);
            }
        }
        current
    }
}

fn console_summary(readings: &[AggregatedReading]) -> String {
    let mut summary = String::new();
    for (i, reading) in readings.iter().enumerate() {
        if i > 0 {
            summary.push_str(", ");
        }
        let _ = write!(
            summary,
            "{}: {} {}",
            reading.metric.label(),
            reading.metric.format(reading.value),
            reading.metric.unit()
        );
    }
    summary
}
