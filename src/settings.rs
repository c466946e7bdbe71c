use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{PoisonError, RwLock},
    time::Duration,
};

use crate::history::RetentionPolicy;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ApiSettings {
    pub base_url: String,
    pub host: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "https://moon-phase.p.rapidapi.com".into(),
            host: "moon-phase.p.rapidapi.com".into(),
            latitude: 51.4768,
            longitude: -0.0004,
        }
    }
}

impl ApiSettings {
    pub fn endpoint(&self) -> String {
        format!(
            "{}/advanced?lat={}&lon={}",
            self.base_url.trim_end_matches('/'),
            self.latitude,
            self.longitude
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DashboardSettings {
    pub refresh_interval_secs: u64,
    pub days_shown: u32,
    pub samples_per_hour: u32,
    pub api: ApiSettings,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            refresh_interval_secs: 5 * 60,
            days_shown: 7,
            samples_per_hour: 12,
            api: ApiSettings::default(),
        }
    }
}

impl DashboardSettings {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn retention(&self) -> RetentionPolicy {
        RetentionPolicy::from_days(self.days_shown, self.samples_per_hour)
    }

    /// Spacing of synthetic samples, matching the configured sampling rate.
    pub fn sample_period_secs(&self) -> i64 {
        3600 / i64::from(self.samples_per_hour.max(1))
    }

    pub fn validate(&self) -> Result<()> {
        if self.refresh_interval_secs == 0 {
            bail!("refresh_interval_secs must be greater than zero");
        }
        if self.days_shown == 0 {
            bail!("days_shown must be greater than zero");
        }
        if self.samples_per_hour == 0 || 3600 % self.samples_per_hour != 0 {
            bail!("samples_per_hour must evenly divide an hour");
        }
        if !(-90.0..=90.0).contains(&self.api.latitude) {
            bail!("latitude must be within [-90, 90]");
        }
        if !(-180.0..=180.0).contains(&self.api.longitude) {
            bail!("longitude must be within [-180, 180]");
        }
        Ok(())
    }
}

/// JSON-file backed settings. A missing or unreadable file yields defaults.
pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<DashboardSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            match serde_json::from_str::<DashboardSettings>(&contents) {
                Ok(settings) if settings.validate().is_ok() => settings,
                Ok(_) => {
                    log::warn!("Settings in {} are out of range, using defaults", path.display());
                    DashboardSettings::default()
                }
                Err(err) => {
                    log::warn!(
                        "Settings in {} are unreadable ({err}), using defaults",
                        path.display()
                    );
                    DashboardSettings::default()
                }
            }
        } else {
            DashboardSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn get(&self) -> DashboardSettings {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[allow(dead_code)]
    pub fn update(&self, settings: DashboardSettings) -> Result<()> {
        settings.validate()?;
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        self.persist(&settings)?;
        *guard = settings;
        Ok(())
    }

    fn persist(&self, data: &DashboardSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }

    #[allow(dead_code)]
    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)?;
        let data: DashboardSettings = serde_json::from_str(&contents)?;
        data.validate()?;
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        *guard = data;
        Ok(())
    }
}
