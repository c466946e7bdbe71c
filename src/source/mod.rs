pub mod live;
pub mod payload;
pub mod simulated;

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::credentials::is_demo;
use crate::error::AcquireError;
use crate::models::ObservationPair;

pub use live::{classify_response, HttpFetcher, LiveFetch, RawResponse};
pub use payload::pair_from_payload;
pub use simulated::{backfill, Simulator};

/// Where observations come from, derived from the stored credential.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum SourceMode {
    #[default]
    Uninitialized,
    Live,
    Simulated,
}

impl SourceMode {
    pub fn for_credential(credential: Option<&str>) -> Self {
        match credential {
            None => SourceMode::Uninitialized,
            Some(key) if is_demo(key) => SourceMode::Simulated,
            Some(_) => SourceMode::Live,
        }
    }
}

/// One successful acquisition: the extracted pair plus the full payload it
/// came from, which the change detector compares against.
#[derive(Debug, Clone)]
pub struct Acquired {
    pub pair: ObservationPair,
    pub payload: Value,
}

#[derive(Clone)]
pub struct ObservationSource {
    live: Arc<dyn LiveFetch>,
    simulator: Simulator,
}

impl ObservationSource {
    pub fn new(live: Arc<dyn LiveFetch>, simulator: Simulator) -> Self {
        Self { live, simulator }
    }

    pub fn simulator(&self) -> &Simulator {
        &self.simulator
    }

    /// Produce one payload in the given mode. `credential` is only consulted
    /// in live mode.
    pub async fn acquire(
        &self,
        mode: SourceMode,
        credential: &str,
        now_secs: i64,
    ) -> Result<Acquired, AcquireError> {
        let payload = match mode {
            SourceMode::Simulated => self.simulator.payload_at(now_secs),
            SourceMode::Live => {
                let response = self.live.fetch(credential).await?;
                classify_response(&response)?
            }
            SourceMode::Uninitialized => {
                return Err(AcquireError::Auth("no credential configured".into()))
            }
        };

        let pair = pair_from_payload(&payload)?;
        Ok(Acquired { pair, payload })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CannedFetch(u16, &'static str);

    impl LiveFetch for CannedFetch {
        fn fetch<'a>(&'a self, _api_key: &'a str) -> live::FetchFuture<'a> {
            let response = RawResponse {
                status: self.0,
                body: self.1.to_string(),
            };
            Box::pin(async move { Ok(response) })
        }
    }

    fn source(status: u16, body: &'static str) -> ObservationSource {
        ObservationSource::new(Arc::new(CannedFetch(status, body)), Simulator::new().unwrap())
    }

    #[test]
    fn mode_follows_credential() {
        assert_eq!(SourceMode::for_credential(None), SourceMode::Uninitialized);
        assert_eq!(SourceMode::for_credential(Some("Demo")), SourceMode::Simulated);
        assert_eq!(SourceMode::for_credential(Some("k".repeat(50).as_str())), SourceMode::Live);
    }

    #[tokio::test]
    async fn simulated_acquire_is_stamped_with_now() {
        let acquired = source(500, "")
            .acquire(SourceMode::Simulated, "Demo", 1_700_000_000)
            .await
            .unwrap();
        assert_eq!(acquired.pair.timestamp(), 1_700_000_000);
        assert_eq!(acquired.payload["timestamp"], 1_700_000_000);
    }

    #[tokio::test]
    async fn live_acquire_extracts_pair() {
        let body = r#"{
            "timestamp": 42,
            "moon": {
                "detailed": {"position": {"altitude": 1.5, "azimuth": 90.0, "distance": 384400.0}}
            },
            "sun": {"position": {"altitude": -3.0, "azimuth": 200.0, "distance": 149600000.0}}
        }"#;
        let acquired = source(200, body)
            .acquire(SourceMode::Live, "key", 0)
            .await
            .unwrap();
        assert_eq!(acquired.pair.moon.altitude, 1.5);
        assert_eq!(acquired.pair.sun.azimuth, 200.0);
        assert_eq!(acquired.pair.timestamp(), 42);
    }

    #[tokio::test]
    async fn live_payload_without_positions_is_transient() {
        let err = source(200, r#"{"timestamp": 42}"#)
            .acquire(SourceMode::Live, "key", 0)
            .await
            .unwrap_err();
        assert!(matches!(err, AcquireError::Transient(_)));
    }

    #[tokio::test]
    async fn live_rejection_is_auth() {
        let err = source(403, r#"{"message": "You are not subscribed to this API."}"#)
            .acquire(SourceMode::Live, "key", 0)
            .await
            .unwrap_err();
        assert!(matches!(err, AcquireError::Auth(_)));
    }
}
