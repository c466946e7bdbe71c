use serde_json::Value;

use crate::error::PayloadError;
use crate::models::{Observation, ObservationPair};

const TIMESTAMP: &str = "/timestamp";

struct PositionPointers {
    altitude: &'static str,
    azimuth: &'static str,
    distance: &'static str,
}

const MOON_POSITION: PositionPointers = PositionPointers {
    altitude: "/moon/detailed/position/altitude",
    azimuth: "/moon/detailed/position/azimuth",
    distance: "/moon/detailed/position/distance",
};

const SUN_POSITION: PositionPointers = PositionPointers {
    altitude: "/sun/position/altitude",
    azimuth: "/sun/position/azimuth",
    distance: "/sun/position/distance",
};

/// Pull the moon and sun positions out of an API payload.
pub fn pair_from_payload(payload: &Value) -> Result<ObservationPair, PayloadError> {
    let timestamp = payload
        .pointer(TIMESTAMP)
        .and_then(Value::as_i64)
        .ok_or(PayloadError::MissingField("timestamp"))?;

    Ok(ObservationPair {
        moon: observation(payload, timestamp, &MOON_POSITION)?,
        sun: observation(payload, timestamp, &SUN_POSITION)?,
    })
}

fn observation(
    payload: &Value,
    timestamp: i64,
    pointers: &PositionPointers,
) -> Result<Observation, PayloadError> {
    Ok(Observation::new(
        timestamp,
        number(payload, pointers.altitude)?,
        number(payload, pointers.azimuth)?,
        number(payload, pointers.distance)?,
    ))
}

fn number(payload: &Value, pointer: &'static str) -> Result<f64, PayloadError> {
    payload
        .pointer(pointer)
        .and_then(Value::as_f64)
        .filter(|value| value.is_finite())
        .ok_or(PayloadError::MissingField(field_name(pointer)))
}

fn field_name(pointer: &'static str) -> &'static str {
    pointer.trim_start_matches('/')
}
