//! Shared state handed to every route handler.

use std::path::PathBuf;
use std::sync::Arc;

use crate::auth::Authenticator;
use crate::cache::DocumentCache;
use crate::config::ProviderConfig;
use crate::repository::DocumentRepository;
use crate::snapshot::{directory_tree_sha, SnapshotStore};
use crate::update::{UpdateScheduler, UpdateStateManager};

use super::webhook::WebhookReceiver;

pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Where served content currently lives: a plain local directory, or the
/// snapshot store's `current` pointer for a `github` source.
#[derive(Clone)]
pub enum ContentRoot {
    Local(PathBuf),
    Snapshot(Arc<SnapshotStore>),
}

impl ContentRoot {
    pub fn current_path(&self) -> Option<PathBuf> {
        match self {
            ContentRoot::Local(path) => Some(path.clone()),
            ContentRoot::Snapshot(store) => store.current_path(),
        }
    }

    pub fn current_hash(&self) -> Option<String> {
        match self {
            ContentRoot::Local(path) => directory_tree_sha(path).ok(),
            ContentRoot::Snapshot(store) => store.current_version(),
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, ContentRoot::Snapshot(_))
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ProviderConfig>,
    pub authenticator: Arc<Authenticator>,
    pub content: ContentRoot,
    pub cache: Arc<DocumentCache>,
    pub update_state: Arc<UpdateStateManager>,
    pub scheduler: Option<Arc<UpdateScheduler>>,
    pub webhook: Arc<WebhookReceiver>,
}

impl AppState {
    /// Builds a repository rooted at the current snapshot, or `None` if
    /// no content has been published yet (remote source, still fetching).
    pub fn repository(&self) -> Option<DocumentRepository> {
        self.content.current_path().map(DocumentRepository::new)
    }
}
