//! Decoding of feed text frames into [`MetricEvent`]s.

use crate::{
    Result,
    constants::{
        MIN_CONTRIBUTING_EVENTS_FOR_HIT, THROWBACK_MAX_ANGLE_DEG, THROWBACK_MAX_EXIT_VELOCITY_MPH,
        THROWBACK_MIN_ANGLE_DEG,
    },
    metric::{MetricEvent, MetricName, RawValue},
};
use serde::Deserialize;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

#[derive(Debug, Default, Deserialize)]
struct FeedPayload {
    #[serde(default)]
    event_uuid: Option<String>,
    #[serde(default, rename = "eventId")]
    event_id: Option<String>,
    #[serde(default)]
    pitch_data: Option<PitchData>,
    #[serde(default)]
    hit_data: Option<HitData>,
    #[serde(default)]
    contributing_events: Option<Vec<serde_json::Value>>,
    #[serde(default, rename = "final")]
    final_flag: Option<bool>,
    #[serde(default)]
    is_final: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct PitchData {
    #[serde(default, rename = "ZoneSpeedMPH")]
    zone_speed_mph: RawValue,
    #[serde(default, rename = "RelSpeedMPH")]
    rel_speed_mph: RawValue,
    #[serde(default, rename = "SpinRateRPM")]
    spin_rate_rpm: RawValue,
}

impl PitchData {
    /// Zone speed when the tracker has it, release speed otherwise.
    fn velocity(&self) -> RawValue {
        match self.zone_speed_mph {
            RawValue::Value(v) if v != 0.0 => self.zone_speed_mph,
            _ => self.rel_speed_mph,
        }
    }

    fn has_valid_metrics(&self) -> bool {
        [self.zone_speed_mph, self.rel_speed_mph, self.spin_rate_rpm]
            .iter()
            .any(|value| value.is_valid())
    }
}

#[derive(Debug, Default, Deserialize)]
struct HitData {
    #[serde(default, rename = "ExitSpeedMPH")]
    exit_speed_mph: RawValue,
    #[serde(default, rename = "AngleDegrees")]
    angle_degrees: RawValue,
    #[serde(default, rename = "DistanceFeet")]
    distance_feet: RawValue,
    #[serde(default, rename = "HangTimeSeconds")]
    hang_time_seconds: RawValue,
}

impl HitData {
    fn looks_like_throwback(&self) -> bool {
        match (self.exit_speed_mph.value(), self.angle_degrees.value()) {
            (Some(exit_velocity), Some(angle)) => {
                exit_velocity < THROWBACK_MAX_EXIT_VELOCITY_MPH
                    && (THROWBACK_MIN_ANGLE_DEG..=THROWBACK_MAX_ANGLE_DEG).contains(&angle)
            }
            _ => false,
        }
    }
}

impl FeedPayload {
    fn event_id(&self) -> Option<&str> {
        [self.event_uuid.as_deref(), self.event_id.as_deref()]
            .into_iter()
            .flatten()
            .find(|id| !id.is_empty())
    }

    fn is_final(&self) -> bool {
        self.final_flag.or(self.is_final).unwrap_or(false)
    }

    /// The feed merges pitch and hit observations, and a catcher throwback
    /// surfaces as a hit-only event. Hit metrics are trusted when they carry
    /// an exit velocity, ride along with a pitch, or were merged from several
    /// source events.
    fn is_true_hit(&self) -> bool {
        let Some(hit) = &self.hit_data else {
            return false;
        };
        if hit.looks_like_throwback() {
            return false;
        }
        if hit.exit_speed_mph.is_valid() {
            return true;
        }
        if self
            .pitch_data
            .as_ref()
            .is_some_and(PitchData::has_valid_metrics)
        {
            return true;
        }
        self.contributing_events
            .as_ref()
            .is_some_and(|events| events.len() >= MIN_CONTRIBUTING_EVENTS_FOR_HIT)
    }
}

/// Decode one text frame. Malformed JSON is an error; a well-formed message
/// with nothing we track decodes to `None`.
pub fn parse_message(text: &str, received_at: Instant) -> Result<Option<MetricEvent>> {
    let payload: FeedPayload = serde_json::from_str(text)?;
    Ok(into_event(payload, received_at))
}

/// Same as [`parse_message`] for an already decoded JSON value.
pub fn parse_value(value: serde_json::Value, received_at: Instant) -> Result<Option<MetricEvent>> {
    let payload: FeedPayload = serde_json::from_value(value)?;
    Ok(into_event(payload, received_at))
}

fn into_event(payload: FeedPayload, received_at: Instant) -> Option<MetricEvent> {
    let event_id = payload
        .event_id()
        .map(str::to_string)
        .unwrap_or_else(synthetic_event_id);
    let mut event = MetricEvent::new(event_id, received_at);
    event.is_final = payload.is_final();

    if let Some(pitch) = &payload.pitch_data {
        event.readings.push((MetricName::PitchVelocity, pitch.velocity()));
        event.readings.push((MetricName::SpinRate, pitch.spin_rate_rpm));
    }

    if payload.is_true_hit() {
        if let Some(hit) = &payload.hit_data {
            event.readings.extend([
                (MetricName::ExitVelocity, hit.exit_speed_mph),
                (MetricName::LaunchAngle, hit.angle_degrees),
                (MetricName::HitDistance, hit.distance_feet),
                (MetricName::HangTime, hit.hang_time_seconds),
            ]);
        }
    }

    (!event.readings.is_empty()).then_some(event)
}

fn synthetic_event_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default();
    format!("event-{millis}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use serde_json::json;

    fn reading(event: &MetricEvent, metric: MetricName) -> Option<RawValue> {
        event
            .readings
            .iter()
            .find(|(name, _)| *name == metric)
            .map(|(_, value)| *value)
    }

    fn parse(value: serde_json::Value) -> Option<MetricEvent> {
        parse_value(value, Instant::now()).unwrap()
    }

    #[test]
    fn decodes_pitch_and_hit() {
        let event = parse(json!({
            "event_uuid": "abc-123",
            "pitch_data": {"ZoneSpeedMPH": 44.7, "SpinRateRPM": 1031.4},
            "hit_data": {
                "ExitSpeedMPH": 87.9,
                "AngleDegrees": 30.3,
                "DistanceFeet": 287.0,
                "HangTimeSeconds": 3.58
            }
        }))
        .unwrap();

        assert_eq!(event.event_id, "abc-123");
        assert!(!event.is_final);
        assert_eq!(event.readings.len(), 6);
        assert_eq!(reading(&event, MetricName::PitchVelocity), Some(RawValue::Value(44.7)));
        assert_eq!(reading(&event, MetricName::HangTime), Some(RawValue::Value(3.58)));
    }

    #[test]
    fn release_speed_backs_up_zone_speed() {
        let event = parse(json!({
            "eventId": "e1",
            "pitch_data": {"ZoneSpeedMPH": "N/A", "RelSpeedMPH": 88.1}
        }))
        .unwrap();

        assert_eq!(event.event_id, "e1");
        assert_eq!(reading(&event, MetricName::PitchVelocity), Some(RawValue::Value(88.1)));
        assert_eq!(reading(&event, MetricName::SpinRate), Some(RawValue::NotAvailable));
    }

    #[test]
    fn throwbacks_drop_hit_metrics() {
        let event = parse(json!({
            "event_uuid": "t1",
            "pitch_data": {"ZoneSpeedMPH": 70.2},
            "hit_data": {"ExitSpeedMPH": 45.0, "AngleDegrees": 15.0, "DistanceFeet": 120.0}
        }))
        .unwrap();

        assert!(reading(&event, MetricName::ExitVelocity).is_none());
        assert!(reading(&event, MetricName::HitDistance).is_none());
        assert!(reading(&event, MetricName::PitchVelocity).is_some());
    }

    #[test]
    fn hit_only_event_needs_corroboration() {
        let lone = json!({
            "event_uuid": "h1",
            "hit_data": {"ExitSpeedMPH": "N/A", "DistanceFeet": 200.0}
        });
        assert!(parse(lone).is_none());

        let merged = json!({
            "event_uuid": "h2",
            "hit_data": {"ExitSpeedMPH": "N/A", "DistanceFeet": 200.0},
            "contributing_events": ["p", "h"]
        });
        let event = parse(merged).unwrap();
        assert_eq!(reading(&event, MetricName::HitDistance), Some(RawValue::Value(200.0)));
    }

    #[test]
    fn final_flag_is_read() {
        let event = parse(json!({
            "event_uuid": "f1",
            "final": true,
            "pitch_data": {"SpinRateRPM": 2200}
        }))
        .unwrap();
        assert!(event.is_final);
    }

    #[test]
    fn missing_event_id_gets_synthetic_one() {
        let event = parse(json!({"pitch_data": {"SpinRateRPM": 2200}})).unwrap();
        assert!(event.event_id.starts_with("event-"));
    }

    #[test]
    fn message_without_metrics_yields_nothing() {
        assert!(parse(json!({"event_uuid": "x", "status": "heartbeat"})).is_none());
    }

    #[test]
    fn malformed_json_is_an_error() {
        let err = parse_message("{not json", Instant::now()).unwrap_err();
        assert!(matches!(err, Error::Payload(_)));

        let err = parse_message("[1, 2, 3]", Instant::now()).unwrap_err();
        assert!(matches!(err, Error::Payload(_)));
    }
}
