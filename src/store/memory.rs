//! In-process replicated store.
//!
//! Holds the whole document tree as JSON and fans change notifications out to
//! every subscription over a broadcast channel. Each subscription re-reads its
//! own path when a change overlaps it and forwards the snapshot only if it
//! differs from the last one delivered.

use super::{paths_overlap, segments, StoreError, StoreResult, Subscription, SyncStore};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, RwLock};

struct Inner {
    root: RwLock<Value>,
    changes: broadcast::Sender<String>,
    offline: AtomicBool,
}

/// Shared, cloneable handle to one in-memory document tree
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(256);
        Self {
            inner: Arc::new(Inner {
                root: RwLock::new(Value::Object(Map::new())),
                changes: tx,
                offline: AtomicBool::new(false),
            }),
        }
    }

    /// Simulate losing (or regaining) the connection to the store.
    /// While offline every operation fails with [`StoreError::Unavailable`].
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::SeqCst);
    }

    fn ensure_online(&self) -> StoreResult<()> {
        if self.inner.offline.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable)
        } else {
            Ok(())
        }
    }

    fn notify(&self, path: &str) {
        // No subscribers is fine
        let _ = self.inner.changes.send(path.trim_matches('/').to_string());
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Inner {
    async fn read_at(&self, path: &str) -> StoreResult<Option<Value>> {
        let parts = segments(path)?;
        let root = self.root.read().await;
        Ok(lookup(&root, &parts).filter(|v| !v.is_null()).cloned())
    }
}

fn lookup<'a>(root: &'a Value, parts: &[&str]) -> Option<&'a Value> {
    parts.iter().try_fold(root, |node, key| node.get(*key))
}

/// Walk down `parts`, turning every missing or non-object node into an object
fn object_at_mut<'a>(root: &'a mut Value, parts: &[&str]) -> &'a mut Map<String, Value> {
    let mut node = root;
    for key in parts {
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        let Value::Object(map) = node else {
            unreachable!("node was just made an object")
        };
        node = map
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    match node {
        Value::Object(map) => map,
        _ => unreachable!("node was just made an object"),
    }
}

fn set_at(root: &mut Value, parts: &[&str], value: Value) {
    let Some((key, parent)) = parts.split_last() else {
        return;
    };
    let parent = object_at_mut(root, parent);
    if value.is_null() {
        parent.remove(*key);
    } else {
        parent.insert(key.to_string(), value);
    }
}

fn remove_at(root: &mut Value, parts: &[&str]) {
    let Some((key, parent)) = parts.split_last() else {
        return;
    };
    let mut node = root;
    for step in parent {
        match node.get_mut(*step) {
            Some(next) => node = next,
            None => return,
        }
    }
    if let Value::Object(map) = node {
        map.remove(*key);
    }
}

fn non_root<'a>(path: &'a str) -> StoreResult<Vec<&'a str>> {
    let parts = segments(path)?;
    if parts.is_empty() {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    Ok(parts)
}

#[async_trait]
impl SyncStore for MemoryStore {
    async fn read(&self, path: &str) -> StoreResult<Option<Value>> {
        self.ensure_online()?;
        self.inner.read_at(path).await
    }

    async fn write(&self, path: &str, value: Value) -> StoreResult<()> {
        self.ensure_online()?;
        let parts = non_root(path)?;
        {
            let mut root = self.inner.root.write().await;
            set_at(&mut root, &parts, value);
        }
        tracing::trace!("store write at {}", path);
        self.notify(path);
        Ok(())
    }

    async fn patch(&self, path: &str, fields: Map<String, Value>) -> StoreResult<()> {
        self.ensure_online()?;
        let parts = non_root(path)?;
        {
            let mut root = self.inner.root.write().await;
            let node = object_at_mut(&mut root, &parts);
            for (key, value) in fields {
                if value.is_null() {
                    node.remove(&key);
                } else {
                    node.insert(key, value);
                }
            }
        }
        tracing::trace!("store patch at {}", path);
        self.notify(path);
        Ok(())
    }

    fn new_key(&self) -> String {
        ulid::Ulid::new().to_string()
    }

    async fn create_unique(&self, path: &str, value: Value) -> StoreResult<String> {
        self.ensure_online()?;
        let key = self.new_key();
        let child = format!("{}/{}", path.trim_matches('/'), key);
        self.write(&child, value).await?;
        Ok(key)
    }

    async fn delete(&self, path: &str) -> StoreResult<()> {
        self.ensure_online()?;
        let parts = non_root(path)?;
        {
            let mut root = self.inner.root.write().await;
            remove_at(&mut root, &parts);
        }
        tracing::trace!("store delete at {}", path);
        self.notify(path);
        Ok(())
    }

    async fn subscribe(&self, path: &str) -> StoreResult<Subscription> {
        self.ensure_online()?;
        segments(path)?;

        let watched = path.trim_matches('/').to_string();
        let inner = self.inner.clone();
        // Subscribe to the change feed before the initial read so nothing slips between
        let mut changes = inner.changes.subscribe();
        let (tx, rx) = mpsc::unbounded_channel();

        let task_path = watched.clone();
        let task = tokio::spawn(async move {
            let mut last: Option<Option<Value>> = None;
            loop {
                let snapshot = match inner.read_at(&task_path).await {
                    Ok(v) => v,
                    Err(e) => {
                        tracing::warn!("subscription on {} stopped: {}", task_path, e);
                        break;
                    }
                };
                if last.as_ref() != Some(&snapshot) {
                    if tx.send(snapshot.clone()).is_err() {
                        break;
                    }
                    last = Some(snapshot);
                }

                // Wait for a change that touches our path
                loop {
                    match changes.recv().await {
                        Ok(changed) if paths_overlap(&changed, &task_path) => break,
                        Ok(_) => continue,
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::debug!(
                                "subscription on {} lagged by {} changes, resyncing",
                                task_path,
                                skipped
                            );
                            break;
                        }
                        Err(RecvError::Closed) => return,
                    }
                }
            }
        });

        Ok(Subscription::new(watched, rx, task))
    }
}
