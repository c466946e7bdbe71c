use std::f64::consts::PI;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use crate::history::HistoryStore;
use crate::models::Observation;

const SECONDS_PER_DAY: i64 = 86_400;
const LUNAR_MONTH_SECS: f64 = 29.5 * 86_400.0;

const MOON_MEAN_DISTANCE_KM: f64 = 384_400.0;
const MOON_DISTANCE_SWING_KM: f64 = 20_000.0;
const MOON_MAX_ALTITUDE_DEG: f64 = 60.0;

const SUN_MEAN_DISTANCE_KM: f64 = 149_600_000.0;
const SUN_DISTANCE_SWING_KM: f64 = 2_500_000.0;
const SUN_MAX_ALTITUDE_DEG: f64 = 50.0;
const SUN_AZIMUTH_OFFSET_DEG: f64 = 180.0;

const BACKFILL_MOON_MAX_ALTITUDE_DEG: f64 = 30.0;
const BACKFILL_SUN_ALTITUDE_DEG: f64 = -50.0;
const BACKFILL_SUN_AZIMUTH_DEG: f64 = 320.0;
const BACKFILL_DISTANCE_STEP_KM: f64 = 10_000.0;

const SAMPLE_PAYLOAD: &str = include_str!("sample_data.json");

/// Fraction of the UTC day elapsed at `timestamp`, in `[0, 1)`.
fn day_progress(timestamp: i64) -> f64 {
    timestamp.rem_euclid(SECONDS_PER_DAY) as f64 / SECONDS_PER_DAY as f64
}

/// Offline stand-in for the live API: every value is a smooth function of
/// the wall-clock time.
#[derive(Debug, Clone)]
pub struct Simulator {
    template: Value,
}

impl Simulator {
    pub fn new() -> Result<Self> {
        let template =
            serde_json::from_str(SAMPLE_PAYLOAD).context("bundled sample payload is invalid")?;
        Ok(Self { template })
    }

    pub fn payload_at(&self, now_secs: i64) -> Value {
        let mut payload = self.template.clone();
        let progress = day_progress(now_secs);
        let daily_wave = (progress * PI * 2.0).sin();

        payload["timestamp"] = json!(now_secs);
        if let Some(datestamp) = DateTime::<Utc>::from_timestamp(now_secs, 0) {
            payload["datestamp"] = json!(datestamp.to_rfc2822());
        }

        let moon_position = &mut payload["moon"]["detailed"]["position"];
        moon_position["azimuth"] = json!((progress * 360.0) % 360.0);
        moon_position["altitude"] = json!(daily_wave * MOON_MAX_ALTITUDE_DEG);
        moon_position["distance"] =
            json!(MOON_MEAN_DISTANCE_KM + daily_wave * MOON_DISTANCE_SWING_KM);

        let sun_position = &mut payload["sun"]["position"];
        sun_position["azimuth"] = json!((progress * 360.0 + SUN_AZIMUTH_OFFSET_DEG) % 360.0);
        sun_position["altitude"] = json!((progress * PI).sin() * SUN_MAX_ALTITUDE_DEG);
        sun_position["distance"] = json!(SUN_MEAN_DISTANCE_KM + daily_wave * SUN_DISTANCE_SWING_KM);

        let phase = (now_secs as f64).rem_euclid(LUNAR_MONTH_SECS) / LUNAR_MONTH_SECS;
        payload["moon"]["phase"] = json!(phase);
        payload["moon"]["illumination"] = json!(format!("{}%", (phase * 100.0).round() as i64));

        payload
    }
}

/// Synthetic history covering `window_secs` up to and including `now_secs`,
/// one sample every `period_secs`.
///
/// Distance is held constant for each simulated day (counted back from
/// `now_secs`) and grows by a fixed step per day into the past, which makes
/// trimming visible on a chart.
pub fn backfill(now_secs: i64, window_secs: i64, period_secs: i64) -> HistoryStore {
    let period_secs = period_secs.max(1);
    let steps = window_secs.max(0) / period_secs;
    let samples_per_day = (SECONDS_PER_DAY / period_secs).max(1);

    let capacity = steps as usize + 1;
    let mut store = HistoryStore {
        moon: Vec::with_capacity(capacity),
        sun: Vec::with_capacity(capacity),
        last_timestamp: Some(now_secs),
    };

    for i in (0..=steps).rev() {
        let timestamp = now_secs - i * period_secs;
        let progress = day_progress(timestamp);
        let day_step = (i / samples_per_day) as f64;

        store.moon.push(Observation::new(
            timestamp,
            (progress * PI * 2.0).sin() * BACKFILL_MOON_MAX_ALTITUDE_DEG,
            (progress * 360.0) % 360.0,
            MOON_MEAN_DISTANCE_KM + day_step * BACKFILL_DISTANCE_STEP_KM,
        ));
        store.sun.push(Observation::new(
            timestamp,
            BACKFILL_SUN_ALTITUDE_DEG,
            BACKFILL_SUN_AZIMUTH_DEG,
            SUN_MEAN_DISTANCE_KM + day_step * BACKFILL_DISTANCE_STEP_KM,
        ));
    }

    store
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::payload::pair_from_payload;

    const NOW: i64 = 1_700_000_000;

    #[test]
    fn payload_is_a_pure_function_of_time() {
        let sim = Simulator::new().unwrap();
        assert_eq!(sim.payload_at(NOW), sim.payload_at(NOW));
        assert_ne!(sim.payload_at(NOW), sim.payload_at(NOW + 300));
    }

    #[test]
    fn simulated_positions_stay_in_range() {
        let sim = Simulator::new().unwrap();
        for offset in (0..SECONDS_PER_DAY).step_by(1_800) {
            let pair = pair_from_payload(&sim.payload_at(NOW + offset)).unwrap();
            assert_eq!(pair.moon.timestamp, NOW + offset);
            for obs in [pair.moon, pair.sun] {
                assert!((-90.0..=90.0).contains(&obs.altitude));
                assert!((0.0..360.0).contains(&obs.azimuth));
                assert!(obs.distance > 0.0);
            }
            assert!((364_400.0..=404_400.0).contains(&pair.moon.distance));
        }
    }

    #[test]
    fn midnight_puts_the_moon_on_the_horizon() {
        let sim = Simulator::new().unwrap();
        let midnight = NOW - NOW.rem_euclid(SECONDS_PER_DAY);
        let pair = pair_from_payload(&sim.payload_at(midnight)).unwrap();
        assert_eq!(pair.moon.altitude, 0.0);
        assert_eq!(pair.moon.azimuth, 0.0);
        assert_eq!(pair.moon.distance, MOON_MEAN_DISTANCE_KM);
        assert_eq!(pair.sun.azimuth, 180.0);
    }

    #[test]
    fn phase_drives_illumination() {
        let sim = Simulator::new().unwrap();
        let payload = sim.payload_at(NOW);
        let phase = payload["moon"]["phase"].as_f64().unwrap();
        assert!((0.0..1.0).contains(&phase));
        assert_eq!(
            payload["moon"]["illumination"],
            json!(format!("{}%", (phase * 100.0).round() as i64))
        );
    }

    #[test]
    fn week_backfill_has_inclusive_point_count() {
        let store = backfill(NOW, 604_800, 300);
        assert_eq!(store.moon.len(), 2017);
        assert_eq!(store.sun.len(), 2017);
        assert_eq!(store.moon.first().unwrap().timestamp, NOW - 604_800);
        assert_eq!(store.moon.last().unwrap().timestamp, NOW);
        assert_eq!(store.last_timestamp, Some(NOW));
        assert!(store.moon.windows(2).all(|w| w[1].timestamp - w[0].timestamp == 300));
    }

    #[test]
    fn backfill_distance_steps_once_per_day() {
        let store = backfill(NOW, 604_800, 300);

        for series in [&store.moon, &store.sun] {
            let newest_first: Vec<f64> = series.iter().rev().map(|o| o.distance).collect();
            let blocks: Vec<&[f64]> = newest_first.chunks(288).collect();
            assert_eq!(blocks.len(), 8);

            for block in &blocks {
                assert!(block.iter().all(|d| *d == block[0]));
            }
            for pair in blocks.windows(2) {
                assert_eq!(pair[1][0] - pair[0][0], BACKFILL_DISTANCE_STEP_KM);
            }
        }
    }

    #[test]
    fn backfill_sun_is_fixed_below_the_horizon() {
        let store = backfill(NOW, 3_600, 300);
        assert_eq!(store.sun.len(), 13);
        assert!(store.sun.iter().all(|o| {
            o.altitude == BACKFILL_SUN_ALTITUDE_DEG && o.azimuth == BACKFILL_SUN_AZIMUTH_DEG
        }));
    }
}
