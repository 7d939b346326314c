//! Content Fetcher (C2): shallow GitHub clone/pull.
//!
//! Git work is synchronous (`git2`) and runs on a dedicated
//! `spawn_blocking` worker so it never blocks request-serving tasks and
//! can be cancelled cleanly: cancellation is a flag checked from the
//! `git2` transfer-progress callback, the same place progress events are
//! read on the way out, following the `Repository::discover` /
//! `RemoteCallbacks` idiom used elsewhere in this codebase's git
//! integration.

mod errors;
mod progress;

pub use errors::FetchError;
pub use progress::{FetchPhase, FetchProgress};

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use git2::{FetchOptions, RemoteCallbacks, Repository};

use crate::config::GithubConfig;

/// Result type for fetcher operations.
pub type FetchResult<T> = Result<T, FetchError>;

/// Shallow (depth 1), single-branch GitHub fetcher.
#[derive(Clone)]
pub struct ContentFetcher {
    github: GithubConfig,
    abort_flag: Arc<AtomicBool>,
}

impl ContentFetcher {
    pub fn new(github: GithubConfig) -> Self {
        Self {
            github,
            abort_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Signals any in-flight fetch to abort. Idempotent; the flag is reset
    /// automatically at the start of the next fetch.
    pub fn abort(&self) {
        self.abort_flag.store(true, Ordering::SeqCst);
    }

    /// Performs a fresh shallow clone into `target_dir`, which must be
    /// empty. Reports progress via `on_progress`.
    pub async fn fetch_all(
        &self,
        target_dir: PathBuf,
        on_progress: impl Fn(FetchProgress) + Clone + Send + Sync + 'static,
    ) -> FetchResult<String> {
        self.abort_flag.store(false, Ordering::SeqCst);
        let github = self.github.clone();
        let abort_flag = self.abort_flag.clone();

        tokio::task::spawn_blocking(move || clone_shallow(&github, &target_dir, &abort_flag, on_progress))
            .await
            .map_err(|e| FetchError::Network(format!("fetcher worker panicked: {}", e)))?
    }

    /// Pulls the latest commit for the tracked branch into an existing
    /// repository at `target_dir`.
    pub async fn fetch_latest_changes(&self, target_dir: PathBuf) -> FetchResult<String> {
        self.abort_flag.store(false, Ordering::SeqCst);
        let github = self.github.clone();
        let abort_flag = self.abort_flag.clone();

        tokio::task::spawn_blocking(move || pull_latest(&github, &target_dir, &abort_flag))
            .await
            .map_err(|e| FetchError::Network(format!("fetcher worker panicked: {}", e)))?
    }

    /// Returns the remote branch's current commit SHA without fetching
    /// full content, used by the periodic-poll trigger.
    pub async fn latest_commit_sha(&self) -> FetchResult<String> {
        let github = self.github.clone();
        tokio::task::spawn_blocking(move || remote_head_sha(&github))
            .await
            .map_err(|e| FetchError::Network(format!("fetcher worker panicked: {}", e)))?
    }
}

fn credentials_callbacks(github: &GithubConfig) -> RemoteCallbacks<'static> {
    let token = github.token.clone();
    let mut callbacks = RemoteCallbacks::new();
    callbacks.credentials(move |_url, _username, _allowed| {
        git2::Cred::userpass_plaintext(&token, "x-oauth-basic")
    });
    callbacks
}

fn remote_url(github: &GithubConfig) -> String {
    format!("https://github.com/{}.git", github.repository)
}

fn clone_shallow(
    github: &GithubConfig,
    target_dir: &Path,
    abort_flag: &Arc<AtomicBool>,
    on_progress: impl Fn(FetchProgress) + Clone,
) -> FetchResult<String> {
    std::fs::create_dir_all(target_dir)
        .map_err(|e| FetchError::Network(format!("failed to create target directory: {}", e)))?;

    let mut callbacks = credentials_callbacks(github);
    let abort_for_progress = abort_flag.clone();
    let progress_for_transfer = on_progress.clone();
    callbacks.transfer_progress(move |stats| {
        progress_for_transfer(FetchProgress {
            phase: FetchPhase::Transferring,
            loaded: Some(stats.received_bytes() as u64),
            total: None,
            fetched_files: stats.received_objects(),
            total_files: stats.total_objects(),
            errors: 0,
            current_file: None,
        });
        !abort_for_progress.load(Ordering::SeqCst)
    });

    let mut fetch_options = FetchOptions::new();
    fetch_options.depth(1).remote_callbacks(callbacks);

    let mut builder = git2::build::RepoBuilder::new();
    builder
        .branch(&github.branch)
        .fetch_options(fetch_options);

    on_progress(FetchProgress::starting());

    let repo = builder
        .clone(&remote_url(github), target_dir)
        .map_err(|e| classify_git_error(e, github))?;

    let sha = head_sha(&repo)?;
    on_progress(FetchProgress::completed());
    Ok(sha)
}

fn pull_latest(
    github: &GithubConfig,
    target_dir: &Path,
    abort_flag: &Arc<AtomicBool>,
) -> FetchResult<String> {
    let repo = Repository::discover(target_dir)
        .map_err(|e| FetchError::Network(format!("not a git repository: {}", e)))?;

    let mut remote = repo
        .find_remote("origin")
        .map_err(|e| FetchError::Network(format!("missing 'origin' remote: {}", e)))?;

    let mut callbacks = credentials_callbacks(github);
    let abort_for_progress = abort_flag.clone();
    callbacks.transfer_progress(move |_stats| !abort_for_progress.load(Ordering::SeqCst));

    let mut fetch_options = FetchOptions::new();
    fetch_options.depth(1).remote_callbacks(callbacks);

    remote
        .fetch(&[&github.branch], Some(&mut fetch_options), None)
        .map_err(|e| classify_git_error(e, github))?;

    let reference = repo
        .find_reference(&format!("refs/remotes/origin/{}", github.branch))
        .map_err(|e| FetchError::DirectoryNotFound(format!("branch not found after fetch: {}", e)))?;
    repo.set_head_detached(reference.target().ok_or_else(|| {
        FetchError::Network("fetched reference has no target commit".into())
    })?)
    .map_err(|e| FetchError::Network(format!("failed to update HEAD: {}", e)))?;
    repo.checkout_head(Some(git2::build::CheckoutBuilder::new().force()))
        .map_err(|e| FetchError::Network(format!("checkout failed: {}", e)))?;

    head_sha(&repo)
}

fn remote_head_sha(github: &GithubConfig) -> FetchResult<String> {
    let mut remote = git2::Remote::create_detached(remote_url(github))
        .map_err(|e| FetchError::Network(e.to_string()))?;
    let callbacks = credentials_callbacks(github);
    remote
        .connect_auth(git2::Direction::Fetch, Some(callbacks), None)
        .map_err(|e| classify_git_error(e, github))?;

    let refname = format!("refs/heads/{}", github.branch);
    let head = remote
        .list()
        .map_err(|e| FetchError::Network(e.to_string()))?
        .iter()
        .find(|h| h.name() == refname)
        .ok_or_else(|| FetchError::DirectoryNotFound(format!("branch '{}' not found", github.branch)))?;

    Ok(head.oid().to_string())
}

fn head_sha(repo: &Repository) -> FetchResult<String> {
    let head = repo
        .head()
        .map_err(|e| FetchError::Network(format!("failed to read HEAD: {}", e)))?;
    let oid = head
        .target()
        .ok_or_else(|| FetchError::Network("HEAD has no target commit".into()))?;
    Ok(oid.to_string())
}

fn classify_git_error(err: git2::Error, github: &GithubConfig) -> FetchError {
    use git2::ErrorClass;

    match err.class() {
        ErrorClass::Net => FetchError::Network(err.message().to_string()),
        ErrorClass::Http if err.message().contains("401") || err.message().contains("403") => {
            FetchError::Access(err.message().to_string())
        }
        _ if err.message().contains("not found") => {
            FetchError::DirectoryNotFound(format!("{}: {}", github.repository, err.message()))
        }
        _ => FetchError::Network(err.message().to_string()),
    }
}
