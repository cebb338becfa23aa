use crate::{
    Error, Result,
    feed::{FeedState, payload::parse_value},
    metric::MetricEvent,
};
use rand::{Rng, SeedableRng, rngs::StdRng};
use serde_json::{Value, json};
use std::time::Duration;
use tokio::{
    sync::{mpsc::UnboundedSender, watch},
    time::{MissedTickBehavior, interval},
};
use tokio_util::sync::CancellationToken;
use tracing::info;

struct DemoPitch {
    zone_speed_mph: f64,
    spin_rate_rpm: f64,
    exit_speed_mph: f64,
    angle_degrees: f64,
    distance_feet: f64,
    hang_time_seconds: f64,
}

static DEMO_PITCHES: [DemoPitch; 3] = [
    DemoPitch {
        zone_speed_mph: 44.7,
        spin_rate_rpm: 1031.4,
        exit_speed_mph: 87.9,
        angle_degrees: 30.3,
        distance_feet: 287.0,
        hang_time_seconds: 3.58,
    },
    DemoPitch {
        zone_speed_mph: 45.8,
        spin_rate_rpm: 1123.6,
        exit_speed_mph: 95.9,
        angle_degrees: 21.1,
        distance_feet: 321.8,
        hang_time_seconds: 3.59,
    },
    DemoPitch {
        zone_speed_mph: 47.2,
        spin_rate_rpm: 1188.0,
        exit_speed_mph: 78.4,
        angle_degrees: 12.6,
        distance_feet: 164.5,
        hang_time_seconds: 1.92,
    },
];

/// Offline stand-in for the live feed. Every tick it emits one event as a
/// pair of duplicated, slightly disagreeing messages, the second flagged
/// final, and runs them through the same decoder as live traffic.
pub struct DemoFeed {
    poll_interval: Duration,
    tx: UnboundedSender<MetricEvent>,
    state: watch::Sender<FeedState>,
    rng: StdRng,
    sequence: u64,
}

impl DemoFeed {
    pub fn new(
        poll_interval: Duration,
        tx: UnboundedSender<MetricEvent>,
        state: watch::Sender<FeedState>,
    ) -> Self {
        Self::with_rng(poll_interval, tx, state, StdRng::from_entropy())
    }

    pub fn with_seed(
        poll_interval: Duration,
        tx: UnboundedSender<MetricEvent>,
        state: watch::Sender<FeedState>,
        seed: u64,
    ) -> Self {
        Self::with_rng(poll_interval, tx, state, StdRng::seed_from_u64(seed))
    }

    fn with_rng(
        poll_interval: Duration,
        tx: UnboundedSender<MetricEvent>,
        state: watch::Sender<FeedState>,
        rng: StdRng,
    ) -> Self {
        Self {
            poll_interval,
            tx,
            state,
            rng,
            sequence: 0,
        }
    }

    pub async fn run(&mut self, shutdown_listener: CancellationToken) -> Result<()> {
        info!(poll_interval = ?self.poll_interval, "demo feed starting");
        self.state.send_replace(FeedState::Demo);

        let mut poll_timer = interval(self.poll_interval);
        poll_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown_listener.cancelled() => break,
                _ = poll_timer.tick() => {
                    for payload in self.next_payloads() {
                        metrics::counter!("yakker_stream_feed_messages").increment(1);
                        if let Some(event) = parse_value(payload, crate::now())? {
                            self.tx.send(event).map_err(|_| Error::EventChannelClosed)?;
                        }
                    }
                }
            }
        }

        self.state.send_replace(FeedState::Disconnected);
        info!("shutdown signal detected; demo feed stopped");
        Ok(())
    }

    fn next_payloads(&mut self) -> [Value; 2] {
        let pitch = &DEMO_PITCHES[(self.sequence % DEMO_PITCHES.len() as u64) as usize];
        let event_id = format!("demo-{:06}", self.sequence);
        self.sequence += 1;

        let first = self.payload(&event_id, pitch, false);
        let mut second = self.payload(&event_id, pitch, true);
        // Every few events the duplicate drops its spin reading.
        if self.sequence % 4 == 0 {
            second["pitch_data"]["SpinRateRPM"] = json!("N/A");
        }
        [first, second]
    }

    fn payload(&mut self, event_id: &str, pitch: &DemoPitch, is_final: bool) -> Value {
        json!({
            "event_uuid": event_id,
            "final": is_final,
            "pitch_data": {
                "ZoneSpeedMPH": self.jitter(pitch.zone_speed_mph, 0.4),
                "SpinRateRPM": self.jitter(pitch.spin_rate_rpm, 25.0),
            },
            "hit_data": {
                "ExitSpeedMPH": self.jitter(pitch.exit_speed_mph, 0.6),
                "AngleDegrees": self.jitter(pitch.angle_degrees, 0.5),
                "DistanceFeet": self.jitter(pitch.distance_feet, 4.0),
                "HangTimeSeconds": self.jitter(pitch.hang_time_seconds, 0.05),
            },
        })
    }

    fn jitter(&mut self, value: f64, spread: f64) -> f64 {
        value + self.rng.gen_range(-spread..=spread)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::{MetricName, RawValue};
    use tokio::sync::mpsc::unbounded_channel;

    #[test]
    fn demo_payloads_decode_to_all_six_metrics() {
        let (tx, _rx) = unbounded_channel();
        let (state, _) = watch::channel(FeedState::Disconnected);
        let mut demo = DemoFeed::with_seed(Duration::from_secs(1), tx, state, 7);

        let [first, second] = demo.next_payloads();
        let first = parse_value(first, crate::now()).unwrap().unwrap();
        let second = parse_value(second, crate::now()).unwrap().unwrap();

        assert_eq!(first.event_id, second.event_id);
        assert!(!first.is_final);
        assert!(second.is_final);
        for metric in MetricName::ALL {
            assert!(
                first
                    .readings
                    .iter()
                    .any(|(name, value)| *name == metric && matches!(value, RawValue::Value(_))),
                "missing {metric}"
            );
        }
    }

    #[test]
    fn event_ids_advance() {
        let (tx, _rx) = unbounded_channel();
        let (state, _) = watch::channel(FeedState::Disconnected);
        let mut demo = DemoFeed::with_seed(Duration::from_secs(1), tx, state, 7);

        let [a, _] = demo.next_payloads();
        let [b, _] = demo.next_payloads();
        assert_ne!(a["event_uuid"], b["event_uuid"]);
    }

    #[tokio::test(start_paused = true)]
    async fn emits_on_every_tick_and_marks_state() {
        let (tx, mut rx) = unbounded_channel();
        let (state, state_rx) = watch::channel(FeedState::Disconnected);
        let mut demo = DemoFeed::with_seed(Duration::from_secs(1), tx, state, 1);
        let shutdown = CancellationToken::new();

        let handle = tokio::spawn({
            let shutdown = shutdown.clone();
            async move { demo.run(shutdown).await }
        });

        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(*state_rx.borrow(), FeedState::Demo);
        shutdown.cancel();
        handle.await.unwrap().unwrap();

        let mut received = 0;
        while rx.try_recv().is_ok() {
            received += 1;
        }
        // Ticks at 0s, 1s and 2s, two messages each.
        assert_eq!(received, 6);
        assert_eq!(*state_rx.borrow(), FeedState::Disconnected);
    }
}
