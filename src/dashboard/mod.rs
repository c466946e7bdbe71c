pub mod events;

use std::{collections::VecDeque, sync::Arc};

use anyhow::{Context, Result};
use chrono::DateTime;
use serde::Serialize;
use serde_json::Value;
use tokio::{sync::Mutex, task::JoinHandle};

use crate::changes::diff;
use crate::credentials::{is_demo, key_preview, validate_api_key, CREDENTIAL_KEY, DEMO_KEY};
use crate::db::Database;
use crate::error::AcquireError;
use crate::history::{HistoryStore, IngestOutcome, SampleStore, HISTORY_KEY};
use crate::refresh::{Clock, RefreshScheduler, RefreshState};
use crate::settings::DashboardSettings;
use crate::source::{backfill, Acquired, ObservationSource, SourceMode};

pub use events::{ChangeEntry, DashboardEvent, DashboardUpdate, EventSink, KeyStatus, LogSink};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

const CHANGE_LOG_LIMIT: usize = 4;

/// What a single acquisition ended up doing.
#[derive(Debug, Clone, PartialEq)]
pub enum AcquisitionOutcome {
    CredentialRequired,
    Ingested { timestamp: i64, changes: usize },
    /// The sample was already in the history; changes were still computed.
    Duplicate { timestamp: i64, changes: usize },
    Failed(AcquireError),
    /// The credential changed while this acquisition was in flight.
    Superseded,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSnapshot {
    pub history: HistoryStore,
    pub key_status: KeyStatus,
    pub change_log: Vec<ChangeEntry>,
    pub refresh: RefreshState,
}

struct DashboardState {
    history: HistoryStore,
    previous_payload: Option<Value>,
    change_log: VecDeque<ChangeEntry>,
    key_status: KeyStatus,
    backfilled: bool,
    /// Bumped whenever the credential is saved, rejected or removed.
    generation: u64,
}

/// Wires the scheduler, the observation source, the sample store and the
/// change detector together and reports to an [`EventSink`].
#[derive(Clone)]
pub struct Dashboard {
    state: Arc<Mutex<DashboardState>>,
    db: Database,
    store: SampleStore,
    source: ObservationSource,
    scheduler: RefreshScheduler,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn EventSink>,
    settings: DashboardSettings,
}

impl Dashboard {
    /// Restore history and credential state from `db`.
    pub async fn open(
        db: Database,
        settings: DashboardSettings,
        source: ObservationSource,
        clock: Arc<dyn Clock>,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self> {
        let store = SampleStore::new(db.clone(), settings.retention());
        let history = store.load().await.into_store();

        let credential = db
            .get_value(CREDENTIAL_KEY)
            .await
            .context("failed to read stored credential")?;
        let key_status = match credential.as_deref() {
            None => KeyStatus::Invalid,
            Some(key) if is_demo(key) => KeyStatus::Demo,
            Some(_) => KeyStatus::Checking,
        };

        Ok(Self {
            state: Arc::new(Mutex::new(DashboardState {
                history,
                previous_payload: None,
                change_log: VecDeque::with_capacity(CHANGE_LOG_LIMIT),
                key_status,
                backfilled: false,
                generation: 0,
            })),
            db,
            store,
            source,
            scheduler: RefreshScheduler::new(clock.clone()),
            clock,
            sink,
            settings,
        })
    }

    /// Start periodic acquisition; the first one runs right away.
    pub async fn start(&self) -> Result<()> {
        let dashboard = self.clone();
        self.scheduler
            .start(self.settings.refresh_interval(), move || {
                let dashboard = dashboard.clone();
                async move { dashboard.run_acquisition().await }
            })
            .await
    }

    pub async fn stop(&self) -> Result<()> {
        self.scheduler.stop().await
    }

    /// Acquire once, outside the periodic schedule. May overlap with a
    /// scheduled acquisition.
    pub fn refresh_now(&self) -> JoinHandle<()> {
        let dashboard = self.clone();
        tokio::spawn(async move { dashboard.run_acquisition().await })
    }

    async fn run_acquisition(&self) {
        if let Err(err) = self.acquire().await {
            log_error!("acquisition failed: {err:#}");
        }
    }

    /// One pass of source, ingest and diff. Source failures are reported in
    /// the outcome; only storage problems surface as errors.
    ///
    /// A credential change while the pass is in flight supersedes it: its
    /// result is dropped without touching history, storage or key status.
    pub async fn acquire(&self) -> Result<AcquisitionOutcome> {
        let generation = self.state.lock().await.generation;
        let credential = self
            .db
            .get_value(CREDENTIAL_KEY)
            .await
            .context("failed to read stored credential")?;
        let mode = SourceMode::for_credential(credential.as_deref());
        self.scheduler.set_source_mode(mode).await;

        let Some(credential) = credential else {
            self.set_key_status(KeyStatus::Invalid).await;
            self.sink.emit(DashboardEvent::CredentialRequired);
            return Ok(AcquisitionOutcome::CredentialRequired);
        };

        let now_secs = self.clock.now_secs();
        if mode == SourceMode::Simulated && !self.ensure_backfill(generation, now_secs).await? {
            return Ok(AcquisitionOutcome::Superseded);
        }

        let acquired = match self.source.acquire(mode, &credential, now_secs).await {
            Ok(acquired) => acquired,
            Err(err @ AcquireError::Auth(_)) => {
                let status_changed = {
                    let mut state = self.state.lock().await;
                    if state.generation != generation {
                        return Ok(AcquisitionOutcome::Superseded);
                    }
                    log_warn!("{err}; clearing stored credential");
                    self.db
                        .remove_values(&[CREDENTIAL_KEY])
                        .await
                        .context("failed to clear rejected credential")?;
                    state.generation += 1;
                    replace_key_status(&mut state, KeyStatus::Invalid)
                };
                self.emit_key_status(status_changed);
                self.sink.emit(DashboardEvent::CredentialRequired);
                return Ok(AcquisitionOutcome::Failed(err));
            }
            Err(err) => {
                log_warn!("{err}");
                return Ok(AcquisitionOutcome::Failed(err));
            }
        };

        let status = match mode {
            SourceMode::Simulated => KeyStatus::Demo,
            _ => KeyStatus::Valid {
                preview: key_preview(&credential),
            },
        };
        self.apply(generation, acquired, status, now_secs).await
    }

    /// Seed the simulated history once per session. Returns false when the
    /// acquisition was superseded.
    async fn ensure_backfill(&self, generation: u64, now_secs: i64) -> Result<bool> {
        let mut state = self.state.lock().await;
        if state.generation != generation {
            return Ok(false);
        }
        if state.backfilled {
            return Ok(true);
        }

        let policy = self.store.policy();
        let seeded = backfill(now_secs, policy.window_secs, self.settings.sample_period_secs());
        let (history, report) = self.store.replace(&seeded, now_secs).await?;
        log_info!(
            "Seeded {} simulated samples ({} trimmed)",
            history.moon.len(),
            report.dropped()
        );
        state.history = history;
        state.backfilled = true;
        Ok(true)
    }

    async fn apply(
        &self,
        generation: u64,
        acquired: Acquired,
        status: KeyStatus,
        now_secs: i64,
    ) -> Result<AcquisitionOutcome> {
        let Acquired { pair, payload } = acquired;
        let timestamp = pair.timestamp();

        let (update, accepted, status_changed) = {
            let mut state = self.state.lock().await;
            if state.generation != generation {
                log_info!("Credential changed during acquisition; dropping sample {timestamp}");
                return Ok(AcquisitionOutcome::Superseded);
            }

            let outcome = self
                .store
                .ingest(&state.history, pair.moon, pair.sun, now_secs)
                .await?;
            let accepted = match outcome {
                IngestOutcome::Accepted { store, .. } => {
                    state.history = store;
                    true
                }
                IngestOutcome::Rejected { timestamp } => {
                    log_info!("Sample {timestamp} already stored, skipping");
                    false
                }
            };
            let status_changed = replace_key_status(&mut state, status);

            let changes = diff(&payload, state.previous_payload.as_ref());
            if !changes.is_empty() {
                state.change_log.push_front(ChangeEntry {
                    timestamp,
                    time_label: time_label(timestamp),
                    changes: changes.clone(),
                });
                state.change_log.truncate(CHANGE_LOG_LIMIT);
            }
            state.previous_payload = Some(payload);

            let update = DashboardUpdate {
                history: state.history.clone(),
                latest: pair,
                changes,
                change_log: state.change_log.iter().cloned().collect(),
                rows: state.history.joined_rows(),
            };
            (update, accepted, status_changed)
        };

        self.emit_key_status(status_changed);
        let changes = update.changes.len();
        self.sink.emit(DashboardEvent::Updated(Box::new(update)));

        Ok(if accepted {
            AcquisitionOutcome::Ingested { timestamp, changes }
        } else {
            AcquisitionOutcome::Duplicate { timestamp, changes }
        })
    }

    async fn set_key_status(&self, status: KeyStatus) {
        let changed = replace_key_status(&mut *self.state.lock().await, status);
        self.emit_key_status(changed);
    }

    fn emit_key_status(&self, changed: Option<KeyStatus>) {
        if let Some(status) = changed {
            self.sink.emit(DashboardEvent::KeyStatusChanged(status));
        }
    }

    /// Store a new API key (or the demo sentinel) and refresh with it.
    /// Returns the handle of the triggered refresh.
    pub async fn save_credential(&self, raw: &str) -> Result<JoinHandle<()>> {
        let key = validate_api_key(raw)?;
        let changed = {
            let mut state = self.state.lock().await;
            self.db
                .put_value(CREDENTIAL_KEY, key)
                .await
                .context("failed to store credential")?;
            state.generation += 1;
            replace_key_status(&mut state, KeyStatus::Checking)
        };
        self.emit_key_status(changed);
        Ok(self.refresh_now())
    }

    pub async fn start_demo_mode(&self) -> Result<JoinHandle<()>> {
        self.save_credential(DEMO_KEY).await
    }

    /// Forget the credential together with all collected history.
    pub async fn remove_credential(&self) -> Result<()> {
        let changed = {
            let mut state = self.state.lock().await;
            self.db
                .remove_values(&[CREDENTIAL_KEY, HISTORY_KEY])
                .await
                .context("failed to remove credential")?;
            state.generation += 1;
            state.history = HistoryStore::default();
            state.previous_payload = None;
            state.change_log.clear();
            state.backfilled = false;
            replace_key_status(&mut state, KeyStatus::Invalid)
        };
        self.scheduler.set_source_mode(SourceMode::Uninitialized).await;
        self.emit_key_status(changed);
        self.sink.emit(DashboardEvent::CredentialRequired);
        Ok(())
    }

    pub async fn snapshot(&self) -> DashboardSnapshot {
        let refresh = self.scheduler.get_state().await;
        let state = self.state.lock().await;
        DashboardSnapshot {
            history: state.history.clone(),
            key_status: state.key_status.clone(),
            change_log: state.change_log.iter().cloned().collect(),
            refresh,
        }
    }

    /// Milliseconds until the next scheduled acquisition.
    pub async fn time_remaining(&self) -> i64 {
        self.scheduler.time_remaining(self.clock.now_ms()).await
    }
}

/// Returns the new status when it differs from the current one.
fn replace_key_status(state: &mut DashboardState, status: KeyStatus) -> Option<KeyStatus> {
    if state.key_status == status {
        return None;
    }
    state.key_status = status.clone();
    Some(status)
}

fn time_label(timestamp: i64) -> String {
    DateTime::from_timestamp(timestamp, 0)
        .map(|at| at.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| timestamp.to_string())
}
