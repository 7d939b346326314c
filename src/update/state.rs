//! Update State Manager (C3): single source of truth for the content
//! lifecycle state machine, and the readiness gate HTTP handlers wait on
//! while a swap is in flight.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::{Mutex, Notify};

/// `idle -> scheduled -> in_progress -> {idle, failed}`; `failed ->
/// in_progress` on the next trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateStatus {
    Idle,
    Scheduled,
    InProgress,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateProgress {
    pub fetched_files: usize,
    pub total_files: usize,
}

/// The full Update State tuple, cloned out of the manager on every read so
/// callers never observe a torn update.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateState {
    pub status: UpdateStatus,
    pub source: Option<String>,
    pub phase: Option<String>,
    pub progress: Option<UpdateProgress>,
    pub last_update_time: Option<String>,
    pub scheduled_time: Option<String>,
    pub last_error: Option<String>,
    pub failed_commit_hash: Option<String>,
    pub failed_updates: u32,
}

impl UpdateState {
    pub fn update_in_progress(&self) -> bool {
        self.status == UpdateStatus::InProgress
    }
}

impl Default for UpdateState {
    fn default() -> Self {
        Self {
            status: UpdateStatus::Idle,
            source: None,
            phase: None,
            progress: None,
            last_update_time: None,
            scheduled_time: None,
            last_error: None,
            failed_commit_hash: None,
            failed_updates: 0,
        }
    }
}

/// A `wait_for_ready` timeout elapsed while an update was in progress.
#[derive(Debug, thiserror::Error)]
#[error("timed out waiting for the in-progress update to finish")]
pub struct ReadinessTimeout;

/// Mutex-guarded state plus a `Notify` that every terminal transition
/// (`complete_update`/`fail_update`) fires, waking every waiter at once.
pub struct UpdateStateManager {
    state: Mutex<UpdateState>,
    terminal: Notify,
}

impl Default for UpdateStateManager {
    fn default() -> Self {
        Self::new()
    }
}

impl UpdateStateManager {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(UpdateState::default()),
            terminal: Notify::new(),
        }
    }

    pub async fn get_state(&self) -> UpdateState {
        self.state.lock().await.clone()
    }

    pub async fn start_update(&self, source: impl Into<String>) {
        let mut state = self.state.lock().await;
        state.status = UpdateStatus::InProgress;
        state.source = Some(source.into());
        state.phase = None;
        state.progress = None;
        state.last_error = None;
    }

    pub async fn complete_update(&self) {
        {
            let mut state = self.state.lock().await;
            state.status = UpdateStatus::Idle;
            state.last_update_time = Some(Utc::now().to_rfc3339());
            state.failed_updates = 0;
            state.phase = None;
            state.progress = None;
        }
        self.terminal.notify_waiters();
    }

    pub async fn fail_update(&self, err: impl Into<String>, commit_hash: Option<String>) {
        {
            let mut state = self.state.lock().await;
            state.status = UpdateStatus::Failed;
            state.last_error = Some(err.into());
            state.failed_commit_hash = commit_hash;
            state.failed_updates += 1;
            state.phase = None;
            state.progress = None;
        }
        self.terminal.notify_waiters();
    }

    pub async fn schedule_update(&self, when: chrono::DateTime<Utc>) {
        let mut state = self.state.lock().await;
        state.status = UpdateStatus::Scheduled;
        state.scheduled_time = Some(when.to_rfc3339());
    }

    pub async fn set_progress(&self, progress: UpdateProgress, phase: Option<String>) {
        let mut state = self.state.lock().await;
        state.progress = Some(progress);
        if phase.is_some() {
            state.phase = phase;
        }
    }

    pub async fn reset(&self) {
        *self.state.lock().await = UpdateState::default();
    }

    /// Returns immediately if no update is in progress. Otherwise blocks
    /// until a terminal transition (success or failure — both mean "safe
    /// to read", since a failure serves stale content) or `timeout`
    /// elapses. Subscribes to the notifier before re-checking state, so a
    /// transition that lands between the initial check and the subscribe
    /// call is never missed.
    pub async fn wait_for_ready(&self, timeout: Duration) -> Result<(), ReadinessTimeout> {
        if !self.get_state().await.update_in_progress() {
            return Ok(());
        }

        let waited = tokio::time::timeout(timeout, async {
            loop {
                let notified = self.terminal.notified();
                if !self.get_state().await.update_in_progress() {
                    return;
                }
                notified.await;
                if !self.get_state().await.update_in_progress() {
                    return;
                }
            }
        })
        .await;

        waited.map_err(|_| ReadinessTimeout)
    }
}

pub type SharedUpdateState = Arc<UpdateStateManager>;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn idle_by_default_and_ready_immediately() {
        let manager = UpdateStateManager::new();
        assert_eq!(manager.get_state().await.status, UpdateStatus::Idle);
        manager.wait_for_ready(Duration::from_millis(10)).await.unwrap();
    }

    #[tokio::test]
    async fn complete_resets_failed_updates_and_releases_waiters() {
        let manager = Arc::new(UpdateStateManager::new());
        manager.start_update("github").await;
        manager.fail_update("boom", None).await;
        assert_eq!(manager.get_state().await.failed_updates, 1);

        manager.start_update("github").await;
        let waiter = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.wait_for_ready(Duration::from_secs(5)).await })
        };
        tokio::task::yield_now().await;
        manager.complete_update().await;
        waiter.await.unwrap().unwrap();
        assert_eq!(manager.get_state().await.failed_updates, 0);
    }

    #[tokio::test]
    async fn wait_for_ready_times_out_if_never_released() {
        let manager = UpdateStateManager::new();
        manager.start_update("github").await;
        let result = manager.wait_for_ready(Duration::from_millis(20)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn failed_state_transitions_back_to_in_progress_on_next_trigger() {
        let manager = UpdateStateManager::new();
        manager.start_update("github").await;
        manager.fail_update("boom", Some("abc123".into())).await;
        assert_eq!(manager.get_state().await.status, UpdateStatus::Failed);

        manager.start_update("github").await;
        assert_eq!(manager.get_state().await.status, UpdateStatus::InProgress);
    }
}
