mod changes;
mod credentials;
mod dashboard;
mod db;
mod error;
mod history;
mod models;
mod refresh;
mod settings;
mod source;
mod utils;

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};

pub use changes::{diff, Change, FieldValue, FormatHint};
pub use dashboard::{
    AcquisitionOutcome, ChangeEntry, Dashboard, DashboardEvent, DashboardSnapshot,
    DashboardUpdate, EventSink, KeyStatus, LogSink,
};
pub use db::Database;
pub use error::{AcquireError, CredentialError, PayloadError};
pub use history::{
    merge, merge_pair, HistoryStore, IngestOutcome, JoinedRow, LoadOutcome, MergeReport,
    RetentionPolicy, SampleStore,
};
pub use models::{Body, Observation, ObservationPair};
pub use refresh::{
    format_countdown, Clock, ManualClock, RefreshScheduler, RefreshState, SchedulerStatus,
    SystemClock,
};
pub use settings::{ApiSettings, DashboardSettings, SettingsStore};
pub use source::{
    backfill, HttpFetcher, LiveFetch, ObservationSource, RawResponse, Simulator, SourceMode,
};

const DEFAULT_DATA_DIR: &str = "./astrodash-data";

fn debug_mode() -> bool {
    std::env::var("ASTRODASH_DEBUG")
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

fn data_dir() -> PathBuf {
    std::env::var_os("ASTRODASH_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
}

pub fn run() -> Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    log::info!("astrodash starting up...");

    let runtime = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
    runtime.block_on(serve())
}

async fn serve() -> Result<()> {
    let data_dir = data_dir();
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

    let settings_store = SettingsStore::new(data_dir.join("settings.json"))?;
    let settings = settings_store.get();
    let database = Database::new(data_dir.join("astrodash.sqlite3"))?;

    let source = ObservationSource::new(
        Arc::new(HttpFetcher::new(settings.api.clone())),
        Simulator::new()?,
    );
    let dashboard = Dashboard::open(
        database,
        settings,
        source,
        Arc::new(SystemClock),
        Arc::new(LogSink),
    )
    .await?;

    if let Ok(key) = std::env::var("ASTRODASH_API_KEY") {
        // The refresh it triggers overlaps with the scheduler's first firing;
        // duplicate samples are rejected on ingest.
        if let Err(err) = dashboard.save_credential(&key).await {
            log::warn!("Ignoring ASTRODASH_API_KEY: {err:#}");
        }
    }

    dashboard.start().await?;

    let countdown = debug_mode().then(|| {
        let dashboard = dashboard.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(1));
            loop {
                ticker.tick().await;
                if let Some(text) = format_countdown(dashboard.time_remaining().await) {
                    log::info!("next refresh in {text}");
                }
            }
        })
    });

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    log::info!("Shutting down");

    if let Some(handle) = countdown {
        handle.abort();
    }
    dashboard.stop().await
}
