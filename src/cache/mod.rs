//! Cache (C6): a generation-hash-keyed cache of processed documents, the
//! built ORD configuration, and the FQN map, bound to the active
//! snapshot's directory hash the way the upstream visibility cache binds
//! itself to a single commit id — a write under a stale hash is dropped,
//! a read under a mismatched hash is a miss, and the whole cache is
//! invalidated in one step when the hash changes.
//!
//! All state lives behind one `tokio::sync::Mutex`, so a cache build that
//! runs while the lock is held is automatically the only build for that
//! key: concurrent misses for the same path coalesce for free instead of
//! needing a separate per-key lock table.

mod errors;

pub use errors::CacheError;

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{Mutex, Notify};

use crate::processor::OrdConfiguration;

pub type CacheResult<T> = Result<T, CacheError>;

#[derive(Default)]
struct CacheState {
    hash: Option<String>,
    documents: HashMap<String, Value>,
    config: Option<OrdConfiguration>,
    fqn_map: Option<HashMap<String, Vec<(String, String)>>>,
    document_paths: Option<Vec<String>>,
    warming: bool,
}

pub struct DocumentCache {
    state: Mutex<CacheState>,
    warm_cancelled: std::sync::atomic::AtomicBool,
    warm_complete: Notify,
}

impl Default for DocumentCache {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentCache {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(CacheState::default()),
            warm_cancelled: std::sync::atomic::AtomicBool::new(false),
            warm_complete: Notify::new(),
        }
    }

    pub async fn current_hash(&self) -> Option<String> {
        self.state.lock().await.hash.clone()
    }

    pub async fn is_warming(&self) -> bool {
        self.state.lock().await.warming
    }

    /// Drops every cached value not bound to `hash`, whether or not the
    /// hash actually changed — callers are expected to call this once per
    /// swap.
    pub async fn invalidate(&self, hash: &str) {
        let mut state = self.state.lock().await;
        if state.hash.as_deref() != Some(hash) {
            *state = CacheState {
                hash: Some(hash.to_string()),
                ..CacheState::default()
            };
        }
    }

    pub async fn clear(&self) {
        *self.state.lock().await = CacheState::default();
    }

    /// Returns a processed document for `path` under `hash`, building and
    /// storing it via `build` on a miss. A concurrent call for the same
    /// path serializes behind the state lock rather than duplicating work.
    pub async fn get_or_insert_document<F, Fut>(
        &self,
        hash: &str,
        path: &str,
        build: F,
    ) -> CacheResult<Value>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = CacheResult<Value>>,
    {
        let mut state = self.state.lock().await;
        if state.hash.as_deref() != Some(hash) {
            *state = CacheState {
                hash: Some(hash.to_string()),
                ..CacheState::default()
            };
        }
        if let Some(doc) = state.documents.get(path) {
            crate::observability::Logger::trace("document_cache_hit", &[("path", path)]);
            return Ok(doc.clone());
        }

        let built = build().await?;
        state.documents.insert(path.to_string(), built.clone());
        Ok(built)
    }

    pub async fn get_config(&self, hash: &str) -> Option<OrdConfiguration> {
        let state = self.state.lock().await;
        if state.hash.as_deref() == Some(hash) {
            state.config.clone()
        } else {
            None
        }
    }

    pub async fn set_config(&self, hash: &str, config: OrdConfiguration) {
        let mut state = self.state.lock().await;
        if state.hash.as_deref() == Some(hash) {
            state.config = Some(config);
        }
    }

    pub async fn get_document_paths(&self, hash: &str) -> Option<Vec<String>> {
        let state = self.state.lock().await;
        if state.hash.as_deref() == Some(hash) {
            state.document_paths.clone()
        } else {
            None
        }
    }

    pub async fn set_document_paths(&self, hash: &str, paths: Vec<String>) {
        let mut state = self.state.lock().await;
        if state.hash.as_deref() == Some(hash) {
            state.document_paths = Some(paths);
        }
    }

    pub async fn get_fqn_map(&self, hash: &str) -> Option<HashMap<String, Vec<(String, String)>>> {
        let state = self.state.lock().await;
        if state.hash.as_deref() == Some(hash) {
            state.fqn_map.clone()
        } else {
            None
        }
    }

    pub async fn set_fqn_map(&self, hash: &str, fqn_map: HashMap<String, Vec<(String, String)>>) {
        let mut state = self.state.lock().await;
        if state.hash.as_deref() == Some(hash) {
            state.fqn_map = Some(fqn_map);
        }
    }

    /// Marks warming in progress for the lifetime of `body`, regardless of
    /// how `body` returns, and wakes any `wait_for_completion` callers on
    /// the way out.
    pub async fn warm<F, Fut>(self: &Arc<Self>, hash: String, body: F)
    where
        F: FnOnce(Arc<Self>, String) -> Fut,
        Fut: Future<Output = ()>,
    {
        {
            let mut state = self.state.lock().await;
            state.warming = true;
        }
        self.warm_cancelled.store(false, std::sync::atomic::Ordering::SeqCst);

        body(self.clone(), hash).await;

        {
            let mut state = self.state.lock().await;
            state.warming = false;
        }
        self.warm_complete.notify_waiters();
    }

    pub fn cancel_warming(&self) {
        self.warm_cancelled.store(true, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn is_warming_cancelled(&self) -> bool {
        self.warm_cancelled.load(std::sync::atomic::Ordering::SeqCst)
    }

    /// Waits for an in-progress warm to finish. Returns immediately if
    /// none is running.
    pub async fn wait_for_completion(&self) {
        loop {
            if !self.is_warming().await {
                return;
            }
            let notified = self.warm_complete.notified();
            if !self.is_warming().await {
                return;
            }
            notified.await;
        }
    }
}
