use std::fmt;

use serde::Serialize;
use serde_json::Value;

/// How a numeric value is rendered in the change log.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum FormatHint {
    /// Two fraction digits in exponent notation, e.g. `3.84e+5`.
    Scientific,
    /// Two fraction digits, e.g. `12.35`.
    Fixed2,
    Text,
}

const SCIENTIFIC_ABOVE: f64 = 1000.0;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

impl FieldValue {
    fn from_json(value: &Value) -> Self {
        match value {
            Value::Number(number) => number
                .as_f64()
                .map(FieldValue::Number)
                .unwrap_or_else(|| FieldValue::Text(number.to_string())),
            Value::String(text) => FieldValue::Text(text.clone()),
            other => FieldValue::Text(other.to_string()),
        }
    }

    pub fn hint(&self) -> FormatHint {
        match self {
            FieldValue::Number(v) if v.abs() > SCIENTIFIC_ABOVE => FormatHint::Scientific,
            FieldValue::Number(_) => FormatHint::Fixed2,
            FieldValue::Text(_) => FormatHint::Text,
        }
    }

    pub fn display(&self) -> String {
        match (self, self.hint()) {
            (FieldValue::Number(v), FormatHint::Scientific) => scientific(*v),
            (FieldValue::Number(v), _) => format!("{v:.2}"),
            (FieldValue::Text(text), _) => text.clone(),
        }
    }
}

/// Rust prints `3.84e5`; the change log uses the signed exponent form `3.84e+5`.
fn scientific(value: f64) -> String {
    let formatted = format!("{value:.2e}");
    match formatted.split_once('e') {
        Some((mantissa, exponent)) if !exponent.starts_with('-') => {
            format!("{mantissa}e+{exponent}")
        }
        _ => formatted,
    }
}

/// A tracked field whose value differs between two consecutive payloads.
/// Each side carries its own hint since the two can straddle the threshold.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Change {
    pub label: &'static str,
    pub old: FieldValue,
    pub old_hint: FormatHint,
    pub new: FieldValue,
    pub new_hint: FormatHint,
}

impl Change {
    fn new(label: &'static str, old: FieldValue, new: FieldValue) -> Self {
        Self {
            label,
            old_hint: old.hint(),
            new_hint: new.hint(),
            old,
            new,
        }
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} → {}", self.label, self.old.display(), self.new.display())
    }
}

/// Compared fields in display order, as (JSON pointer, label).
pub const TRACKED_FIELDS: &[(&str, &str)] = &[
    ("/moon/detailed/position/altitude", "Moon altitude (°)"),
    ("/moon/detailed/position/azimuth", "Moon azimuth (°)"),
    ("/moon/detailed/position/distance", "Moon distance (km)"),
    ("/moon/phase", "Moon phase"),
    ("/moon/illumination", "Moon illumination"),
    ("/moon/moonrise", "Moonrise"),
    ("/moon/moonset", "Moonset"),
    ("/sun/position/altitude", "Sun altitude (°)"),
    ("/sun/position/azimuth", "Sun azimuth (°)"),
    ("/sun/position/distance", "Sun distance (km)"),
    ("/sun/day_length", "Day length"),
    ("/sun/sunrise_timestamp", "Sunrise"),
    ("/sun/sunset_timestamp", "Sunset"),
    ("/sun/solar_noon", "Solar noon"),
    ("/sun/next_solar_eclipse/type", "Next solar eclipse"),
    ("/sun/next_solar_eclipse/timestamp", "Next solar eclipse time"),
    ("/moon/next_lunar_eclipse/type", "Next lunar eclipse"),
    ("/moon/next_lunar_eclipse/timestamp", "Next lunar eclipse time"),
];

fn tracked(payload: &Value, pointer: &str) -> Option<FieldValue> {
    payload
        .pointer(pointer)
        .filter(|value| !value.is_null())
        .map(FieldValue::from_json)
}

/// Compare the tracked fields of two payloads. Without a previous payload
/// there is nothing to compare and the result is empty.
pub fn diff(new: &Value, prev: Option<&Value>) -> Vec<Change> {
    let Some(prev) = prev else {
        return Vec::new();
    };

    TRACKED_FIELDS
        .iter()
        .filter_map(|&(pointer, label)| {
            let old = tracked(prev, pointer)?;
            let new = tracked(new, pointer)?;
            (old != new).then(|| Change::new(label, old, new))
        })
        .collect()
}
