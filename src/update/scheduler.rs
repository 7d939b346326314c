//! Update Scheduler (C4): owns the timers and the coalescing policy, and
//! drives the strict fetch -> validate -> swap -> save metadata ->
//! invalidate cache pipeline.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::cache::DocumentCache;
use crate::config::GithubConfig;
use crate::fetch::{ContentFetcher, FetchProgress};
use crate::observability::{Logger, ObservationScope};
use crate::snapshot::SnapshotStore;

use super::errors::UpdateError;
use super::state::{UpdateProgress, UpdateStateManager};

const PERIODIC_POLL_INTERVAL: Duration = Duration::from_secs(2 * 60 * 60);

pub struct UpdateScheduler {
    state: Arc<UpdateStateManager>,
    fetcher: Arc<ContentFetcher>,
    snapshot: Arc<SnapshotStore>,
    cache: Arc<DocumentCache>,
    github: GithubConfig,
    update_delay: Duration,
    timer: Mutex<Option<JoinHandle<()>>>,
    last_webhook_start: Mutex<Option<Instant>>,
    trailing_timer: Mutex<Option<JoinHandle<()>>>,
    generation: AtomicU64,
}

impl UpdateScheduler {
    pub fn new(
        state: Arc<UpdateStateManager>,
        fetcher: Arc<ContentFetcher>,
        snapshot: Arc<SnapshotStore>,
        cache: Arc<DocumentCache>,
        github: GithubConfig,
        update_delay: Duration,
    ) -> Self {
        Self {
            state,
            fetcher,
            snapshot,
            cache,
            github,
            update_delay,
            timer: Mutex::new(None),
            last_webhook_start: Mutex::new(None),
            trailing_timer: Mutex::new(None),
            generation: AtomicU64::new(0),
        }
    }

    /// Arms a one-shot timer at `now + delay`, cancelling any prior one.
    /// If an update is currently running, aborts it first — the new
    /// trigger wins.
    pub async fn schedule_update(self: &Arc<Self>, delay: Duration) {
        if self.state.get_state().await.update_in_progress() {
            self.fetcher.abort();
        }

        if let Some(handle) = self.timer.lock().await.take() {
            handle.abort();
        }

        let when = chrono::Utc::now() + chrono::Duration::from_std(delay).unwrap_or_default();
        self.state.schedule_update(when).await;

        let this = self.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            this.perform_update("scheduled").await;
        });
        *self.timer.lock().await = Some(handle);
    }

    /// Webhook path: enforces the cooldown window. Manual path: bypasses
    /// it and runs (or arms a zero-delay run of) immediately.
    pub async fn schedule_immediate_update(self: &Arc<Self>, is_manual: bool) {
        if is_manual {
            self.schedule_update(Duration::ZERO).await;
            return;
        }

        let now = Instant::now();
        let mut last_start = self.last_webhook_start.lock().await;
        let elapsed_since_last = last_start.map(|t| now.duration_since(t));

        match elapsed_since_last {
            Some(elapsed) if elapsed < self.update_delay => {
                let remaining = self.update_delay - elapsed;
                let mut trailing = self.trailing_timer.lock().await;
                if trailing.is_none() {
                    let this = self.clone();
                    let handle = tokio::spawn(async move {
                        tokio::time::sleep(remaining).await;
                        this.trailing_timer.lock().await.take();
                        this.record_webhook_start().await;
                        this.perform_update("webhook").await;
                    });
                    *trailing = Some(handle);
                }
            }
            _ => {
                *last_start = Some(now);
                drop(last_start);
                self.schedule_update(Duration::ZERO).await;
            }
        }
    }

    async fn record_webhook_start(self: &Arc<Self>) {
        *self.last_webhook_start.lock().await = Some(Instant::now());
    }

    /// Cancels any scheduled timer and runs immediately. Errors if an
    /// update is already running.
    pub async fn force_update(self: &Arc<Self>) -> Result<(), UpdateError> {
        if self.state.get_state().await.update_in_progress() {
            return Err(UpdateError::AlreadyInProgress);
        }
        if let Some(handle) = self.timer.lock().await.take() {
            handle.abort();
        }
        self.perform_update("manual").await;
        Ok(())
    }

    /// Spawns the periodic-poll supervising task. Every
    /// [`PERIODIC_POLL_INTERVAL`], compares the remote branch's HEAD
    /// against the last published commit and schedules an immediate
    /// update on drift.
    pub fn spawn_periodic_poll(self: &Arc<Self>) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(PERIODIC_POLL_INTERVAL);
            ticker.tick().await; // first tick fires immediately; skip it
            loop {
                ticker.tick().await;
                let Ok(remote_sha) = this.fetcher.latest_commit_sha().await else {
                    continue;
                };
                let known_sha = this
                    .snapshot
                    .metadata()
                    .ok()
                    .flatten()
                    .map(|m| m.commit_hash);
                if known_sha.as_deref() != Some(remote_sha.as_str()) {
                    this.schedule_update(Duration::ZERO).await;
                }
            }
        })
    }

    /// Runs the fetch -> validate -> swap -> save metadata -> invalidate
    /// cache pipeline. Only ever called from within this scheduler, so a
    /// concurrent invocation is a logic bug, not a race to defend against.
    async fn perform_update(self: &Arc<Self>, source: &str) {
        let my_generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let scope = ObservationScope::new("update");
        self.state.start_update(source).await;

        let result = self.run_pipeline(my_generation).await;

        match result {
            Ok(()) => {
                self.state.complete_update().await;
                scope.complete();
            }
            Err(e) => {
                let commit_hash = self.fetcher.latest_commit_sha().await.ok();
                self.state.fail_update(e.to_string(), commit_hash).await;
                Logger::error("update_failed", &[("reason", &e.to_string())]);
                scope.fail(&e.to_string());
                let _ = self.snapshot.cleanup_staging();
            }
        }
    }

    async fn run_pipeline(self: &Arc<Self>, generation: u64) -> Result<(), UpdateError> {
        let staging = self.snapshot.prepare_staging()?;

        let state = self.state.clone();
        let on_progress = move |progress: FetchProgress| {
            let state = state.clone();
            tokio::spawn(async move {
                state
                    .set_progress(
                        UpdateProgress {
                            fetched_files: progress.fetched_files,
                            total_files: progress.total_files,
                        },
                        Some(format!("{:?}", progress.phase)),
                    )
                    .await;
            });
        };

        let commit_hash = self.fetcher.fetch_all(staging.clone(), on_progress).await?;

        if generation != self.generation.load(Ordering::SeqCst) {
            return Err(UpdateError::Fetch(crate::fetch::FetchError::Aborted));
        }

        self.snapshot.validate(&staging)?;
        let (_, metadata) = self.snapshot.swap(
            &staging,
            &commit_hash,
            &self.github.branch,
            &self.github.repository,
        )?;

        self.cache.invalidate(&metadata.directory_tree_sha).await;
        Logger::info("cache_invalidated", &[("hash", &metadata.directory_tree_sha)]);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn periodic_poll_interval_is_two_hours() {
        assert_eq!(PERIODIC_POLL_INTERVAL, Duration::from_secs(7200));
    }
}
