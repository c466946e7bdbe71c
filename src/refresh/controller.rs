use std::{future::Future, sync::Arc, time::Duration};

use anyhow::{bail, Context, Result};
use tokio::{
    sync::Mutex,
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::source::SourceMode;

use super::{Clock, RefreshState};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

struct Ticker {
    handle: JoinHandle<()>,
    cancel_token: CancellationToken,
}

/// Fires an acquisition job immediately and then once per interval until
/// stopped. Jobs run as their own tasks, so a slow acquisition never delays
/// the next firing and two acquisitions may overlap.
#[derive(Clone)]
pub struct RefreshScheduler {
    state: Arc<Mutex<RefreshState>>,
    clock: Arc<dyn Clock>,
    ticker: Arc<Mutex<Option<Ticker>>>,
}

impl RefreshScheduler {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(Mutex::new(RefreshState::new())),
            clock,
            ticker: Arc::new(Mutex::new(None)),
        }
    }

    pub async fn get_state(&self) -> RefreshState {
        self.state.lock().await.clone()
    }

    pub async fn is_running(&self) -> bool {
        self.ticker.lock().await.is_some()
    }

    /// Start firing `job`. A scheduler that is already running is restarted
    /// with the new interval.
    pub async fn start<F, Fut>(&self, interval: Duration, job: F) -> Result<()>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if interval.is_zero() {
            bail!("refresh interval must be greater than zero");
        }
        let interval_ms =
            i64::try_from(interval.as_millis()).context("refresh interval is too large")?;

        self.stop().await?;

        let cancel_token = CancellationToken::new();
        let token_clone = cancel_token.clone();
        let state = self.state.clone();
        let clock = self.clock.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    _ = token_clone.cancelled() => {
                        log_info!("refresh loop shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        state.lock().await.mark_firing();

                        tokio::spawn(job());

                        let deadline = clock.now_ms() + interval_ms;
                        state.lock().await.schedule(deadline);
                        log_debug!("next refresh in {}s", interval_ms / 1000);
                    }
                }
            }
        });

        *self.ticker.lock().await = Some(Ticker {
            handle,
            cancel_token,
        });
        log_info!("refresh scheduler started ({}s interval)", interval.as_secs());
        Ok(())
    }

    /// Cancel future firings. Acquisitions already dispatched keep running.
    pub async fn stop(&self) -> Result<()> {
        let ticker = self.ticker.lock().await.take();

        if let Some(Ticker {
            handle,
            cancel_token,
        }) = ticker
        {
            cancel_token.cancel();
            handle.await.context("refresh loop task failed to join")?;
        }

        self.state.lock().await.reset();
        Ok(())
    }

    /// Milliseconds until the next firing as seen at `now_ms`.
    pub async fn time_remaining(&self, now_ms: i64) -> i64 {
        self.state.lock().await.time_remaining(now_ms)
    }

    pub async fn set_source_mode(&self, mode: SourceMode) {
        self.state.lock().await.source_mode = mode;
    }
}
