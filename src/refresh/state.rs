use serde::Serialize;

use crate::source::SourceMode;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum SchedulerStatus {
    #[default]
    Idle,
    Scheduled,
    Firing,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct RefreshState {
    pub status: SchedulerStatus,
    pub source_mode: SourceMode,
    /// Wall-clock deadline of the next acquisition, in epoch milliseconds.
    pub next_refresh_at_ms: Option<i64>,
    pub fire_count: u64,
}

impl RefreshState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Milliseconds until the next acquisition; zero or negative when overdue
    /// or when nothing is scheduled.
    pub fn time_remaining(&self, now_ms: i64) -> i64 {
        match self.next_refresh_at_ms {
            Some(deadline) => deadline - now_ms,
            None => 0,
        }
    }

    pub(crate) fn mark_firing(&mut self) {
        self.status = SchedulerStatus::Firing;
        self.fire_count += 1;
    }

    pub(crate) fn schedule(&mut self, deadline_ms: i64) {
        self.next_refresh_at_ms = Some(deadline_ms);
        self.status = SchedulerStatus::Scheduled;
    }

    pub(crate) fn reset(&mut self) {
        self.status = SchedulerStatus::Idle;
        self.next_refresh_at_ms = None;
    }
}

/// Render a countdown as `m:ss`. Nothing is shown once the deadline passed.
pub fn format_countdown(remaining_ms: i64) -> Option<String> {
    if remaining_ms <= 0 {
        return None;
    }
    let minutes = remaining_ms / 60_000;
    let seconds = (remaining_ms % 60_000) / 1000;
    Some(format!("{minutes}:{seconds:02}"))
}
