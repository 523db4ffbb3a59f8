//! Replicated document store abstraction.
//!
//! Every participant session talks to the shared room state through
//! [`SyncStore`]. Writes are atomic at their target path, later writes to the
//! same path win, and writes to sibling keys merge. Subscribers receive the
//! live value at their path and then a fresh snapshot after every change that
//! touches it.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by a store adapter
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store is unreachable")]
    Unavailable,

    #[error("invalid store path: {0:?}")]
    InvalidPath(String),

    #[error("subscription feed closed")]
    Closed,
}

/// Operations the game needs from the synchronized document store
#[async_trait]
pub trait SyncStore: Send + Sync {
    /// One-shot read of the value at `path` (`None` if absent)
    async fn read(&self, path: &str) -> StoreResult<Option<Value>>;

    /// Atomically replace the value at `path`
    async fn write(&self, path: &str, value: Value) -> StoreResult<()>;

    /// Atomically merge the named children into the object at `path`.
    /// Children not named are left untouched; a `null` child is removed.
    async fn patch(&self, path: &str, fields: Map<String, Value>) -> StoreResult<()>;

    /// Generate a fresh unique child key without writing anything
    fn new_key(&self) -> String;

    /// Append `value` under a store-generated unique key and return the key
    async fn create_unique(&self, path: &str, value: Value) -> StoreResult<String>;

    /// Remove the value at `path` and everything below it
    async fn delete(&self, path: &str) -> StoreResult<()>;

    /// Start a live subscription on `path`
    async fn subscribe(&self, path: &str) -> StoreResult<Subscription>;
}

/// Live feed of snapshots for one path.
///
/// The first snapshot is the value at subscription time. Dropping the
/// subscription unsubscribes.
pub struct Subscription {
    path: String,
    rx: mpsc::UnboundedReceiver<Option<Value>>,
    task: JoinHandle<()>,
}

impl Subscription {
    pub fn new(
        path: String,
        rx: mpsc::UnboundedReceiver<Option<Value>>,
        task: JoinHandle<()>,
    ) -> Self {
        Self { path, rx, task }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Wait for the next snapshot. `Err(Closed)` once the feed is gone.
    pub async fn recv(&mut self) -> StoreResult<Option<Value>> {
        self.rx.recv().await.ok_or(StoreError::Closed)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Split a slash separated path into its segments, rejecting empty ones
pub fn segments(path: &str) -> StoreResult<Vec<&str>> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    let parts: Vec<&str> = trimmed.split('/').collect();
    if parts.iter().any(|p| p.is_empty()) {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    Ok(parts)
}

/// Whether a change at `changed` can affect the value observed at `watched`
pub fn paths_overlap(changed: &str, watched: &str) -> bool {
    let changed = changed.trim_matches('/');
    let watched = watched.trim_matches('/');
    if changed.is_empty() || watched.is_empty() || changed == watched {
        return true;
    }
    changed
        .strip_prefix(watched)
        .is_some_and(|rest| rest.starts_with('/'))
        || watched
            .strip_prefix(changed)
            .is_some_and(|rest| rest.starts_with('/'))
}
