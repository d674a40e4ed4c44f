//! Platform capabilities injected into the sync core.
//!
//! The engine itself is platform-agnostic: wall clock, network status, and
//! persistence are all supplied by the embedding application through the
//! traits here. This keeps the core unit-testable without any UI runtime
//! and lets storage backends be swapped freely.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::{Notify, RwLock};

use crate::error::StorageError;

/// Wall-clock source for record timestamps.
///
/// Clock skew across devices is an accepted source of concurrent-type
/// conflicts, not an error condition.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// System wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Fixed clock for tests and replay.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Reachability of the remote sync collaborator.
#[async_trait]
pub trait NetworkMonitor: Send + Sync {
    fn is_online(&self) -> bool;

    /// Resolves the next time connectivity transitions from offline to
    /// online. Implementations that never change may pend forever.
    async fn online_transition(&self);
}

/// Shared connectivity flag with transition notification.
///
/// The embedding application flips this from its own connectivity events;
/// the orchestrator uses the offline-to-online transition as a sync
/// trigger.
pub struct SharedNetworkStatus {
    online: AtomicBool,
    came_online: Notify,
}

impl SharedNetworkStatus {
    pub fn new(online: bool) -> Arc<Self> {
        Arc::new(Self {
            online: AtomicBool::new(online),
            came_online: Notify::new(),
        })
    }

    pub fn set_online(&self, online: bool) {
        let was_online = self.online.swap(online, Ordering::SeqCst);
        if online && !was_online {
            tracing::debug!("Network transitioned online");
            self.came_online.notify_one();
        }
    }
}

#[async_trait]
impl NetworkMonitor for SharedNetworkStatus {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    async fn online_transition(&self) {
        self.came_online.notified().await;
    }
}

/// Generic key-value persistence contract the record store is built on.
///
/// Implementations may be synchronous or suspension-capable underneath;
/// failures surface as [`StorageError`].
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn put(&self, collection: &str, id: &str, value: Value) -> Result<(), StorageError>;

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StorageError>;

    async fn get_all(&self, collection: &str) -> Result<Vec<Value>, StorageError>;

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StorageError>;

    async fn clear(&self, collection: &str) -> Result<(), StorageError>;
}

/// In-memory key-value store.
///
/// Backs tests and single-session embedding; iteration order within a
/// collection is stable (sorted by id).
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, BTreeMap<String, Value>>>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn put(&self, collection: &str, id: &str, value: Value) -> Result<(), StorageError> {
        let mut collections = self.collections.write().await;
        collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), value);
        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StorageError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|entries| entries.get(id).cloned()))
    }

    async fn get_all(&self, collection: &str) -> Result<Vec<Value>, StorageError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|entries| entries.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StorageError> {
        let mut collections = self.collections.write().await;
        if let Some(entries) = collections.get_mut(collection) {
            entries.remove(id);
        }
        Ok(())
    }

    async fn clear(&self, collection: &str) -> Result<(), StorageError> {
        let mut collections = self.collections.write().await;
        collections.remove(collection);
        Ok(())
    }
}

/// Explicit no-op storage mode for environments where persistent storage
/// is structurally unavailable (e.g. a server-side render pass).
///
/// Reads return empty defaults and writes are dropped; nothing errors.
/// This is a deliberate, documented mode, not a hidden catch.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullStore;

impl NullStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self)
    }
}

#[async_trait]
impl KeyValueStore for NullStore {
    async fn put(&self, _collection: &str, _id: &str, _value: Value) -> Result<(), StorageError> {
        Ok(())
    }

    async fn get(&self, _collection: &str, _id: &str) -> Result<Option<Value>, StorageError> {
        Ok(None)
    }

    async fn get_all(&self, _collection: &str) -> Result<Vec<Value>, StorageError> {
        Ok(Vec::new())
    }

    async fn delete(&self, _collection: &str, _id: &str) -> Result<(), StorageError> {
        Ok(())
    }

    async fn clear(&self, _collection: &str) -> Result<(), StorageError> {
        Ok(())
    }
}
