use serde::{Deserialize, Deserializer};
use std::{fmt, time::Instant};

/// The six metrics carried from the feed to consumers. Anything else in a
/// payload is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MetricName {
    ExitVelocity,
    LaunchAngle,
    PitchVelocity,
    SpinRate,
    HitDistance,
    HangTime,
}

impl MetricName {
    pub const COUNT: usize = 6;

    pub const ALL: [MetricName; Self::COUNT] = [
        MetricName::ExitVelocity,
        MetricName::LaunchAngle,
        MetricName::PitchVelocity,
        MetricName::SpinRate,
        MetricName::HitDistance,
        MetricName::HangTime,
    ];

    /// Position in per-metric arrays.
    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn key(self) -> &'static str {
        match self {
            MetricName::ExitVelocity => "exit_velocity_mph",
            MetricName::LaunchAngle => "launch_angle_deg",
            MetricName::PitchVelocity => "pitch_velocity_mph",
            MetricName::SpinRate => "spin_rate_rpm",
            MetricName::HitDistance => "hit_distance_ft",
            MetricName::HangTime => "hangtime_sec",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            MetricName::ExitVelocity => "Exit Velocity",
            MetricName::LaunchAngle => "Launch Angle",
            MetricName::PitchVelocity => "Pitch Velocity",
            MetricName::SpinRate => "Spin Rate",
            MetricName::HitDistance => "Hit Distance",
            MetricName::HangTime => "Hang Time",
        }
    }

    pub const fn unit(self) -> &'static str {
        match self {
            MetricName::ExitVelocity | MetricName::PitchVelocity => "mph",
            MetricName::LaunchAngle => "°",
            MetricName::SpinRate => "rpm",
            MetricName::HitDistance => "ft",
            MetricName::HangTime => "sec",
        }
    }

    /// Decimal places used whenever the value is rendered.
    pub const fn precision(self) -> usize {
        match self {
            MetricName::SpinRate | MetricName::HitDistance => 0,
            _ => 1,
        }
    }

    pub fn format(self, value: f64) -> String {
        format!("{value:.prec$}", prec = self.precision())
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A raw sensor value as it arrives on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum RawValue {
    Value(f64),
    #[default]
    NotAvailable,
}

impl RawValue {
    /// Numbers and numeric strings are values; `null`, `"N/A"`, `"NaN"` and
    /// any non-finite number are not.
    pub fn from_json(value: &serde_json::Value) -> Self {
        let number = match value {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        match number {
            Some(v) if v.is_finite() => RawValue::Value(v),
            _ => RawValue::NotAvailable,
        }
    }

    pub fn value(self) -> Option<f64> {
        match self {
            RawValue::Value(v) => Some(v),
            RawValue::NotAvailable => None,
        }
    }

    pub fn is_valid(self) -> bool {
        self.value().is_some()
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        if value.is_finite() {
            RawValue::Value(value)
        } else {
            RawValue::NotAvailable
        }
    }
}

impl<'de> Deserialize<'de> for RawValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(RawValue::from_json(&value))
    }
}

/// One inbound feed message, reduced to the metrics we track.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricEvent {
    pub event_id: String,
    pub received_at: Instant,
    pub readings: Vec<(MetricName, RawValue)>,
    /// Set when the feed marks this as the last message for the event.
    pub is_final: bool,
}

impl MetricEvent {
    pub fn new(event_id: impl Into<String>, received_at: Instant) -> Self {
        Self {
            event_id: event_id.into(),
            received_at,
            readings: Vec::new(),
            is_final: false,
        }
    }

    pub fn with_reading(mut self, metric: MetricName, value: impl Into<RawValue>) -> Self {
        self.readings.push((metric, value.into()));
        self
    }

    pub fn finalized(mut self) -> Self {
        self.is_final = true;
        self
    }
}

/// Mean of the valid readings one event produced for one metric.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedReading {
    pub event_id: String,
    pub metric: MetricName,
    pub value: f64,
    pub sample_count: usize,
}
