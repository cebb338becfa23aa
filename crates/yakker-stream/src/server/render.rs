//! Text encoders for the three published views of a [`Snapshot`]. Every
//! encoder is driven by a mapping table, and every field is always emitted,
//! empty when the metric has nothing to show.

use crate::{metric::MetricName, snapshot::Snapshot};
use std::fmt::Write;

/// Dashboard placeholder for a missing or stale metric.
pub const PLACEHOLDER: &str = "--";

/// `<totals>` child elements of the scoreboard livedata document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivedataElement {
    Hitting,
    Pitching,
}

impl LivedataElement {
    pub const fn tag(self) -> &'static str {
        match self {
            LivedataElement::Hitting => "hitting",
            LivedataElement::Pitching => "pitching",
        }
    }
}

/// Where each metric lands in `/livedata.xml`.
pub const LIVEDATA_FIELDS: [(MetricName, LivedataElement, &str); MetricName::COUNT] = [
    (MetricName::ExitVelocity, LivedataElement::Hitting, "h"),
    (MetricName::LaunchAngle, LivedataElement::Hitting, "rbi"),
    (MetricName::HitDistance, LivedataElement::Hitting, "double"),
    (MetricName::HangTime, LivedataElement::Hitting, "triple"),
    (MetricName::PitchVelocity, LivedataElement::Pitching, "er"),
    (MetricName::SpinRate, LivedataElement::Pitching, "pitches"),
];

/// Element names of `/data.xml`, in document order.
pub const DATA_FIELDS: [(MetricName, &str); MetricName::COUNT] = [
    (MetricName::ExitVelocity, "ExitVelo"),
    (MetricName::LaunchAngle, "LaunchAngle"),
    (MetricName::SpinRate, "SpinRate"),
    (MetricName::PitchVelocity, "PitchVelo"),
    (MetricName::HitDistance, "HitDistance"),
    (MetricName::HangTime, "Hangtime"),
];

/// Dashboard row order.
const DASHBOARD_ORDER: [MetricName; MetricName::COUNT] = [
    MetricName::ExitVelocity,
    MetricName::LaunchAngle,
    MetricName::SpinRate,
    MetricName::PitchVelocity,
    MetricName::HitDistance,
    MetricName::HangTime,
];

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

/// Formatted value for machine consumers, empty when there is nothing to show.
pub fn machine_value(snapshot: &Snapshot, metric: MetricName) -> String {
    snapshot
        .display_value(metric)
        .map(|value| metric.format(value))
        .unwrap_or_default()
}

pub fn escape(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            c => escaped.push(c),
        }
    }
    escaped
}

pub fn livedata_xml(snapshot: &Snapshot) -> String {
    let mut xml = String::new();
    xml.push_str(XML_DECLARATION);
    xml.push('\n');
    xml.push_str(r#"<bsgame source="yakker-stream">"#);
    xml.push('\n');
    xml.push_str(r#"  <team vh="H" id="YAKKER" name="Yakker">"#);
    xml.push('\n');
    xml.push_str("    <totals>\n");
    for element in [LivedataElement::Hitting, LivedataElement::Pitching] {
        let _ = write!(xml, "      <{}", element.tag());
        for (metric, _, attribute) in LIVEDATA_FIELDS
            .iter()
            .filter(|(_, target, _)| *target == element)
        {
            let _ = write!(
                xml,
                r#" {attribute}="{}""#,
                escape(&machine_value(snapshot, *metric))
            );
        }
        xml.push_str("/>\n");
    }
    xml.push_str("    </totals>\n");
    xml.push_str("  </team>\n");
    xml.push_str("</bsgame>\n");
    xml
}

pub fn data_xml(snapshot: &Snapshot) -> String {
    let mut xml = String::new();
    xml.push_str(XML_DECLARATION);
    xml.push_str("\n<scoreboard>\n    <sportMode>Custom</sportMode>\n");
    for (metric, element) in DATA_FIELDS {
        let _ = writeln!(
            xml,
            "    <{element}>{}</{element}>",
            escape(&machine_value(snapshot, metric))
        );
    }
    xml.push_str("</scoreboard>\n");
    xml
}

const DASHBOARD_HEAD: &str = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <meta http-equiv="refresh" content="1">
    <title>Yakker Stream - Live Data</title>
    <style>
        body { background-color: #000000; color: #ffffff; font-family: 'Courier New', Courier, monospace; padding: 40px; margin: 0; }
        .container { max-width: 800px; margin: 0 auto; }
        h1 { font-size: 36px; margin-bottom: 40px; text-align: center; }
        .feed { font-size: 18px; text-align: center; margin-bottom: 20px; }
        .metric { font-size: 28px; margin: 20px 0; padding: 15px; border: 2px solid #ffffff; }
        .metric-label { display: inline-block; width: 250px; }
        .metric-value { display: inline-block; font-weight: bold; font-size: 32px; }
        .stale { color: #888888; }
    </style>
</head>
<body>
    <div class="container">
        <h1>YAKKER STREAM - LIVE DATA</h1>
"#;

pub fn dashboard_html(snapshot: &Snapshot) -> String {
    let mut html = String::from(DASHBOARD_HEAD);
    let _ = writeln!(
        html,
        r#"        <div class="feed">Feed: {}</div>"#,
        snapshot.feed_state
    );
    for metric in DASHBOARD_ORDER {
        let (class, value) = match snapshot.display_value(metric) {
            Some(value) => ("metric-value", metric.format(value)),
            None => ("metric-value stale", PLACEHOLDER.to_string()),
        };
        let _ = write!(
            html,
            concat!(
                "        <div class=\"metric\">\n",
                "            <span class=\"metric-label\">{label}:</span>\n",
                "            <span class=\"{class}\">{value} {unit}</span>\n",
                "        </div>\n",
            ),
            label = metric.label(),
            class = class,
            value = escape(&value),
            unit = metric.unit(),
        );
    }
    html.push_str("    </div>\n</body>\n</html>\n");
    html
}
