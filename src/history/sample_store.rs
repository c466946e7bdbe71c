use anyhow::{Context, Result};
use log::{info, warn};

use crate::db::Database;
use crate::models::Observation;

use super::blob;
use super::series::{merge, HistoryStore, IngestOutcome, MergeReport, RetentionPolicy};

pub const HISTORY_KEY: &str = "astronomicalData";

/// Result of restoring history at startup.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    /// Nothing was stored.
    Empty,
    /// The blob was usable; `dropped` entries failed validation.
    Restored { store: HistoryStore, dropped: usize },
    /// The blob was unreadable and an empty history is used instead.
    Fallback { reason: String },
}

impl LoadOutcome {
    pub fn into_store(self) -> HistoryStore {
        match self {
            LoadOutcome::Restored { store, .. } => store,
            LoadOutcome::Empty | LoadOutcome::Fallback { .. } => HistoryStore::default(),
        }
    }
}

/// Persistent owner of the moon/sun history.
#[derive(Clone)]
pub struct SampleStore {
    db: Database,
    policy: RetentionPolicy,
}

impl SampleStore {
    pub fn new(db: Database, policy: RetentionPolicy) -> Self {
        Self { db, policy }
    }

    pub fn policy(&self) -> RetentionPolicy {
        self.policy
    }

    /// Never fails: read errors and bad blobs fall back to an empty history.
    pub async fn load(&self) -> LoadOutcome {
        let raw = match self.db.get_value(HISTORY_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return LoadOutcome::Empty,
            Err(err) => {
                warn!("Failed to read stored history: {err:#}");
                return LoadOutcome::Fallback {
                    reason: err.to_string(),
                };
            }
        };

        match blob::decode(&raw) {
            Ok(decoded) => {
                if decoded.dropped > 0 {
                    warn!(
                        "Dropped {} malformed history entries while loading",
                        decoded.dropped
                    );
                }
                info!(
                    "Restored history: {} moon / {} sun samples",
                    decoded.store.moon.len(),
                    decoded.store.sun.len()
                );
                LoadOutcome::Restored {
                    store: decoded.store,
                    dropped: decoded.dropped,
                }
            }
            Err(err) => {
                warn!("Stored history unusable, starting empty: {err}");
                LoadOutcome::Fallback {
                    reason: err.to_string(),
                }
            }
        }
    }

    /// Merge a new pair and persist the result. A rejected pair is not
    /// written.
    pub async fn ingest(
        &self,
        store: &HistoryStore,
        moon: Observation,
        sun: Observation,
        now_secs: i64,
    ) -> Result<IngestOutcome> {
        let outcome = merge(store, moon, sun, now_secs, &self.policy);
        if let IngestOutcome::Accepted { store, report } = &outcome {
            self.persist(store).await?;
            if report.dropped() > 0 {
                info!(
                    "Ingested sample {}: expired {}, truncated {}, duplicates {}, invalid {}",
                    moon.timestamp,
                    report.expired,
                    report.truncated,
                    report.duplicates,
                    report.invalid
                );
            }
        }
        Ok(outcome)
    }

    /// Apply retention to a whole store (used for the demo backfill) and
    /// persist it.
    pub async fn replace(
        &self,
        store: &HistoryStore,
        now_secs: i64,
    ) -> Result<(HistoryStore, MergeReport)> {
        let (store, report) = store.normalized(now_secs, &self.policy);
        self.persist(&store).await?;
        Ok((store, report))
    }

    pub async fn persist(&self, store: &HistoryStore) -> Result<()> {
        let raw = blob::encode(store).context("failed to serialize history")?;
        self.db
            .put_value(HISTORY_KEY, raw)
            .await
            .context("failed to persist history")
    }

    pub async fn clear(&self) -> Result<HistoryStore> {
        self.db
            .remove_values(&[HISTORY_KEY])
            .await
            .context("failed to clear history")?;
        Ok(HistoryStore::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn moon(ts: i64) -> Observation {
        Observation::new(ts, 12.5, 90.25, 384_400.0 + ts as f64)
    }

    fn sun(ts: i64) -> Observation {
        Observation::new(ts, -50.0, 320.0, 149_600_000.0)
    }

    fn open(dir: &tempfile::TempDir, policy: RetentionPolicy) -> SampleStore {
        let db = Database::new(dir.path().join("history.sqlite3")).unwrap();
        SampleStore::new(db, policy)
    }

    #[tokio::test]
    async fn load_without_blob_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir, RetentionPolicy::default());
        assert_eq!(store.load().await, LoadOutcome::Empty);
    }

    #[tokio::test]
    async fn load_falls_back_on_corrupt_blob() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir, RetentionPolicy::default());
        store
            .db
            .put_value(HISTORY_KEY, r#"{"moon": "nope", "sun": []}"#.into())
            .await
            .unwrap();

        let outcome = store.load().await;
        assert!(matches!(outcome, LoadOutcome::Fallback { .. }));
        assert_eq!(outcome.into_store(), HistoryStore::default());
    }

    #[tokio::test]
    async fn ingest_persists_and_reloads_identically() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir, RetentionPolicy::new(10_000, 100));

        let mut history = HistoryStore::default();
        for ts in [300, 100, 200] {
            match store.ingest(&history, moon(ts), sun(ts), 300).await.unwrap() {
                IngestOutcome::Accepted { store, .. } => history = store,
                IngestOutcome::Rejected { .. } => panic!("unique timestamps"),
            }
        }

        let reloaded = store.load().await;
        assert_eq!(
            reloaded,
            LoadOutcome::Restored {
                store: history.clone(),
                dropped: 0
            }
        );
        assert_eq!(
            history.moon.iter().map(|o| o.timestamp).collect::<Vec<_>>(),
            vec![100, 200, 300]
        );
    }

    #[tokio::test]
    async fn rejected_ingest_does_not_touch_storage() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir, RetentionPolicy::new(10_000, 100));

        let first = store
            .ingest(&HistoryStore::default(), moon(300), sun(300), 300)
            .await
            .unwrap();
        let IngestOutcome::Accepted { store: history, .. } = first else {
            panic!("first sample must be accepted");
        };

        // Write something else directly so an accidental persist is visible.
        store
            .db
            .put_value(HISTORY_KEY, r#"{"moon": [], "sun": []}"#.into())
            .await
            .unwrap();

        let second = store.ingest(&history, moon(300), sun(300), 300).await.unwrap();
        assert_eq!(second, IngestOutcome::Rejected { timestamp: 300 });
        assert_eq!(
            store.load().await.into_store(),
            HistoryStore::default()
        );
    }

    #[tokio::test]
    async fn clear_removes_the_blob() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir, RetentionPolicy::new(10_000, 100));
        store
            .ingest(&HistoryStore::default(), moon(1), sun(1), 1)
            .await
            .unwrap();

        let cleared = store.clear().await.unwrap();
        assert!(cleared.is_empty());
        assert_eq!(store.load().await, LoadOutcome::Empty);
    }

    #[tokio::test]
    async fn replace_applies_retention_before_persisting() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir, RetentionPolicy::new(1_000, 3));

        let seed = HistoryStore {
            moon: (0..=10).map(|i| moon(i * 100)).collect(),
            sun: (0..=10).map(|i| sun(i * 100)).collect(),
            last_timestamp: Some(1_000),
        };
        let (kept, report) = store.replace(&seed, 1_000).await.unwrap();

        assert_eq!(
            kept.moon.iter().map(|o| o.timestamp).collect::<Vec<_>>(),
            vec![800, 900, 1_000]
        );
        assert_eq!(report.expired, 2);
        assert_eq!(store.load().await.into_store(), kept);
    }
}
