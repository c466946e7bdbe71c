use serde::Serialize;

use crate::changes::Change;
use crate::history::{HistoryStore, JoinedRow};
use crate::models::ObservationPair;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum KeyStatus {
    Checking,
    Valid { preview: String },
    Demo,
    Invalid,
}

/// Changes from one acquisition, headed by the payload time.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEntry {
    pub timestamp: i64,
    pub time_label: String,
    pub changes: Vec<Change>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DashboardUpdate {
    pub history: HistoryStore,
    pub latest: ObservationPair,
    pub changes: Vec<Change>,
    pub change_log: Vec<ChangeEntry>,
    pub rows: Vec<JoinedRow>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "event", content = "payload", rename_all = "kebab-case")]
pub enum DashboardEvent {
    Updated(Box<DashboardUpdate>),
    KeyStatusChanged(KeyStatus),
    CredentialRequired,
}

/// Receives everything the renderer needs to draw.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: DashboardEvent);
}

/// Renderer for headless runs: writes a one-line summary of each event.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&self, event: DashboardEvent) {
        match event {
            DashboardEvent::Updated(update) => {
                log_info!(
                    "moon alt {:.2}° az {:.2}° | sun alt {:.2}° az {:.2}° | {} samples",
                    update.latest.moon.altitude,
                    update.latest.moon.azimuth,
                    update.latest.sun.altitude,
                    update.latest.sun.azimuth,
                    update.history.moon.len()
                );
                for change in &update.changes {
                    log_info!("  {change}");
                }
            }
            DashboardEvent::KeyStatusChanged(status) => log_info!("API key status: {status:?}"),
            DashboardEvent::CredentialRequired => {
                log_warn!("No usable API key; set ASTRODASH_API_KEY or use \"Demo\"")
            }
        }
    }
}
