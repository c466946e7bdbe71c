use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum Body {
    Moon,
    Sun,
}

impl Body {
    pub fn as_str(&self) -> &'static str {
        match self {
            Body::Moon => "moon",
            Body::Sun => "sun",
        }
    }
}

/// One timestamped position reading for a single body.
///
/// `timestamp` is in seconds since the epoch, angles are in degrees and
/// `distance` is in kilometers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Observation {
    pub timestamp: i64,
    pub altitude: f64,
    pub azimuth: f64,
    pub distance: f64,
}

impl Observation {
    pub fn new(timestamp: i64, altitude: f64, azimuth: f64, distance: f64) -> Self {
        Self {
            timestamp,
            altitude,
            azimuth,
            distance,
        }
    }

    /// JSON has no encoding for NaN or infinity, so only finite readings are
    /// allowed into a persisted series.
    pub fn is_numeric(&self) -> bool {
        self.altitude.is_finite() && self.azimuth.is_finite() && self.distance.is_finite()
    }
}

/// Moon and sun readings taken from the same payload.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ObservationPair {
    pub moon: Observation,
    pub sun: Observation,
}

impl ObservationPair {
    pub fn timestamp(&self) -> i64 {
        self.moon.timestamp
    }

    pub fn get(&self, body: Body) -> &Observation {
        match body {
            Body::Moon => &self.moon,
            Body::Sun => &self.sun,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_finite_values_are_not_numeric() {
        assert!(Observation::new(1, 10.0, 20.0, 30.0).is_numeric());
        assert!(!Observation::new(1, f64::NAN, 20.0, 30.0).is_numeric());
        assert!(!Observation::new(1, 10.0, f64::INFINITY, 30.0).is_numeric());
        assert!(!Observation::new(1, 10.0, 20.0, f64::NEG_INFINITY).is_numeric());
    }

    #[test]
    fn unknown_fields_are_ignored_when_deserializing() {
        let obs: Observation = serde_json::from_str(
            r#"{"timestamp":5,"altitude":1.5,"azimuth":2.5,"distance":3.5,"extra":"x"}"#,
        )
        .unwrap();
        assert_eq!(obs, Observation::new(5, 1.5, 2.5, 3.5));
    }
}
