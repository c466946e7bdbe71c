use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::{Observation, ObservationPair};

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// How much history is kept per series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Entries with `timestamp <= now - window_secs` are expired.
    pub window_secs: i64,
    /// Hard cap on entries per series; the oldest are cut first.
    pub max_points: usize,
}

impl RetentionPolicy {
    pub fn new(window_secs: i64, max_points: usize) -> Self {
        Self {
            window_secs,
            max_points,
        }
    }

    pub fn from_days(days_shown: u32, samples_per_hour: u32) -> Self {
        Self {
            window_secs: i64::from(days_shown) * SECONDS_PER_DAY,
            max_points: days_shown as usize * samples_per_hour as usize * 24,
        }
    }

    fn cutoff(&self, now_secs: i64) -> i64 {
        now_secs.saturating_sub(self.window_secs)
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::from_days(7, 12)
    }
}

/// Moon and sun histories, each ordered by ascending timestamp.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryStore {
    pub moon: Vec<Observation>,
    pub sun: Vec<Observation>,
    pub last_timestamp: Option<i64>,
}

/// What a merge or normalization threw away.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub expired: usize,
    pub duplicates: usize,
    pub truncated: usize,
    pub invalid: usize,
}

impl MergeReport {
    fn absorb(&mut self, other: MergeReport) {
        self.expired += other.expired;
        self.duplicates += other.duplicates;
        self.truncated += other.truncated;
        self.invalid += other.invalid;
    }

    pub fn dropped(&self) -> usize {
        self.expired + self.duplicates + self.truncated + self.invalid
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    Accepted {
        store: HistoryStore,
        report: MergeReport,
    },
    /// The moon series already holds this timestamp; nothing changed.
    Rejected { timestamp: i64 },
}

impl IngestOutcome {
    pub fn is_rejected(&self) -> bool {
        matches!(self, IngestOutcome::Rejected { .. })
    }
}

/// One display row: a moon sample with the sun sample of the same timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinedRow {
    pub timestamp: i64,
    pub moon_altitude: f64,
    pub moon_azimuth: f64,
    pub moon_distance: f64,
    pub sun_altitude: f64,
    pub sun_azimuth: f64,
    pub sun_distance: f64,
}

impl HistoryStore {
    pub fn is_empty(&self) -> bool {
        self.moon.is_empty() && self.sun.is_empty()
    }

    pub fn contains_moon_timestamp(&self, timestamp: i64) -> bool {
        self.moon.iter().any(|obs| obs.timestamp == timestamp)
    }

    pub fn latest_moon(&self) -> Option<&Observation> {
        self.moon.last()
    }

    /// Rows for the history table, newest first. Sun values default to zero
    /// when the sun series has no entry at the moon timestamp.
    pub fn joined_rows(&self) -> Vec<JoinedRow> {
        let sun_by_ts: HashMap<i64, &Observation> =
            self.sun.iter().map(|obs| (obs.timestamp, obs)).collect();

        let mut rows: Vec<JoinedRow> = self
            .moon
            .iter()
            .map(|moon| {
                let sun = sun_by_ts.get(&moon.timestamp);
                JoinedRow {
                    timestamp: moon.timestamp,
                    moon_altitude: moon.altitude,
                    moon_azimuth: moon.azimuth,
                    moon_distance: moon.distance,
                    sun_altitude: sun.map_or(0.0, |s| s.altitude),
                    sun_azimuth: sun.map_or(0.0, |s| s.azimuth),
                    sun_distance: sun.map_or(0.0, |s| s.distance),
                }
            })
            .collect();

        rows.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        rows
    }

    /// Copy with every non-numeric entry removed.
    pub fn validated(&self) -> (HistoryStore, usize) {
        let mut store = self.clone();
        let before = store.moon.len() + store.sun.len();
        store.moon.retain(Observation::is_numeric);
        store.sun.retain(Observation::is_numeric);
        let removed = before - store.moon.len() - store.sun.len();
        (store, removed)
    }

    /// Apply the retention rules to both series without adding anything.
    pub fn normalized(
        &self,
        now_secs: i64,
        policy: &RetentionPolicy,
    ) -> (HistoryStore, MergeReport) {
        let mut store = self.clone();
        let mut report = retain_series(&mut store.moon, now_secs, policy);
        report.absorb(retain_series(&mut store.sun, now_secs, policy));
        (store, report)
    }
}

/// Merge one moon/sun pair into `store`.
///
/// The moon timestamp is the only dedupe key: a pair whose moon timestamp
/// is already present is rejected as a whole, and the sun series is not
/// consulted.
pub fn merge(
    store: &HistoryStore,
    moon: Observation,
    sun: Observation,
    now_secs: i64,
    policy: &RetentionPolicy,
) -> IngestOutcome {
    if store.contains_moon_timestamp(moon.timestamp) {
        return IngestOutcome::Rejected {
            timestamp: moon.timestamp,
        };
    }

    let mut next = store.clone();
    next.last_timestamp = Some(moon.timestamp);
    next.moon.push(moon);
    next.sun.push(sun);

    let (store, report) = next.normalized(now_secs, policy);
    IngestOutcome::Accepted { store, report }
}

pub fn merge_pair(
    store: &HistoryStore,
    pair: &ObservationPair,
    now_secs: i64,
    policy: &RetentionPolicy,
) -> IngestOutcome {
    merge(store, pair.moon, pair.sun, now_secs, policy)
}

fn retain_series(
    series: &mut Vec<Observation>,
    now_secs: i64,
    policy: &RetentionPolicy,
) -> MergeReport {
    let mut report = MergeReport::default();
    let cutoff = policy.cutoff(now_secs);

    let before = series.len();
    series.retain(|obs| obs.timestamp > cutoff);
    report.expired = before - series.len();

    series.sort_by_key(|obs| obs.timestamp);

    let before = series.len();
    series.dedup_by_key(|obs| obs.timestamp);
    report.duplicates = before - series.len();

    if series.len() > policy.max_points {
        report.truncated = series.len() - policy.max_points;
        series.drain(..report.truncated);
    }

    let before = series.len();
    series.retain(Observation::is_numeric);
    report.invalid = before - series.len();

    report
}
