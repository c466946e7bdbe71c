use serde_json::{Map, Value};
use thiserror::Error;

use crate::models::Observation;

use super::series::HistoryStore;

/// Why a stored history blob could not be used at all.
#[derive(Debug, Error)]
pub enum BlobError {
    #[error("history blob is not valid JSON: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("history blob is not a JSON object")]
    NotAnObject,
    #[error("history blob field `{0}` is missing or not an array")]
    MissingSeries(&'static str),
}

/// A decoded blob plus the number of entries that failed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedHistory {
    pub store: HistoryStore,
    pub dropped: usize,
}

pub fn encode(store: &HistoryStore) -> Result<String, serde_json::Error> {
    let (valid, _) = store.validated();
    serde_json::to_string(&valid)
}

/// Parse a blob leniently: a bad entry is skipped, a bad top level is an
/// error.
pub fn decode(raw: &str) -> Result<DecodedHistory, BlobError> {
    let value: Value = serde_json::from_str(raw)?;
    let object = value.as_object().ok_or(BlobError::NotAnObject)?;

    let (moon, moon_dropped) = decode_series(object, "moon")?;
    let (sun, sun_dropped) = decode_series(object, "sun")?;
    let last_timestamp = object.get("lastTimestamp").and_then(as_timestamp);

    Ok(DecodedHistory {
        store: HistoryStore {
            moon,
            sun,
            last_timestamp,
        },
        dropped: moon_dropped + sun_dropped,
    })
}

fn decode_series(
    object: &Map<String, Value>,
    field: &'static str,
) -> Result<(Vec<Observation>, usize), BlobError> {
    let entries = object
        .get(field)
        .and_then(Value::as_array)
        .ok_or(BlobError::MissingSeries(field))?;

    let series: Vec<Observation> = entries.iter().filter_map(decode_entry).collect();
    let dropped = entries.len() - series.len();
    Ok((series, dropped))
}

fn decode_entry(value: &Value) -> Option<Observation> {
    let entry = value.as_object()?;
    let number = |field: &str| entry.get(field).and_then(Value::as_f64);

    let obs = Observation::new(
        entry.get("timestamp").and_then(as_timestamp)?,
        number("altitude")?,
        number("azimuth")?,
        number("distance")?,
    );
    obs.is_numeric().then_some(obs)
}

// Whole-valued floats are accepted since other writers may emit `1.7e9`.
fn as_timestamp(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|ts| ts.is_finite() && ts.fract() == 0.0)
            .map(|ts| ts as i64)
    })
}
