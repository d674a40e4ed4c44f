//! Offline-first synchronization engine for Aarogya Engine
//!
//! Provides:
//! - Local record store with versioning and payload checksums
//! - Pending-operation queue for eventual sync
//! - Conflict detection and resolution between local and remote versions
//! - Sync orchestration with a single-flight cycle guard
//! - Append-only change log with erasure anonymization
//!
//! The engine is platform-agnostic: clock, network status, persistence,
//! and the remote collaborator are all injected (see [`platform`] and
//! [`orchestrator::RemoteSyncClient`]). It runs on a single device with
//! cooperative scheduling; storage and remote calls are the only
//! suspension points.

pub mod changelog;
pub mod checksum;
pub mod conflict;
pub mod error;
pub mod orchestrator;
pub mod platform;
pub mod record;
pub mod store;

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use case_model::Collection;
pub use changelog::{ChangeLog, ChangeLogEntry, ChangeOperation, CHANGE_LOG_COLLECTION};
pub use checksum::{checksum, next_version};
pub use conflict::{
    classify, ConflictRegistry, ConflictResolver, ConflictType, ResolutionStrategy, SyncConflict,
    CONFLICT_COLLECTION,
};
pub use error::{StorageError, SyncError, SyncResult, TransientSyncError};
pub use orchestrator::{
    CycleStatus, RemoteSyncClient, SyncConfig, SyncEvent, SyncOrchestrator, SyncOutcome, SyncStats,
};
pub use platform::{
    Clock, FixedClock, KeyValueStore, MemoryStore, NetworkMonitor, NullStore, SharedNetworkStatus,
    SystemClock,
};
pub use record::{DeviceId, SyncStatus, SyncableRecord, DELETED_FLAG};
pub use store::{IntegrityReport, QueueEntry, RecordStore, StoreConfig, SYNC_QUEUE_COLLECTION};

/// Configuration for the assembled engine.
#[derive(Debug, Clone)]
pub struct SyncEngineConfig {
    /// Stable identifier of this device
    pub device_id: DeviceId,
    /// Actor recorded in the change log
    pub actor: String,
    /// Record collections this engine manages
    pub collections: Vec<Collection>,
    /// Orchestrator configuration
    pub sync: SyncConfig,
}

impl Default for SyncEngineConfig {
    fn default() -> Self {
        Self {
            device_id: DeviceId::generate(),
            actor: "local".to_string(),
            collections: vec![Collection::Cases, Collection::Patients],
            sync: SyncConfig::default(),
        }
    }
}

/// Point-in-time view of the engine's sync state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatusSnapshot {
    pub online: bool,
    pub sync_in_progress: bool,
    pub pending_count: usize,
}

/// Portable backup of the engine's local state.
#[derive(Debug, Serialize, Deserialize)]
struct BackupEnvelope {
    timestamp: DateTime<Utc>,
    device_id: String,
    collections: BTreeMap<String, Vec<SyncableRecord>>,
    conflicts: Vec<SyncConflict>,
    change_log: Vec<ChangeLogEntry>,
}

/// Assembled offline-first engine for one device.
pub struct SyncEngine {
    store: Arc<RecordStore>,
    registry: Arc<ConflictRegistry>,
    resolver: ConflictResolver,
    orchestrator: Arc<SyncOrchestrator>,
    network: Arc<dyn NetworkMonitor>,
    kv: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    config: SyncEngineConfig,
}

impl SyncEngine {
    /// Assemble the engine from its injected capabilities.
    ///
    /// Records stranded in `syncing` by an interrupted previous session
    /// are reset to `pending` here, before any cycle can run.
    pub async fn new(
        kv: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        network: Arc<dyn NetworkMonitor>,
        remote: Arc<dyn RemoteSyncClient>,
        config: SyncEngineConfig,
    ) -> SyncResult<Self> {
        let store = Arc::new(RecordStore::new(
            kv.clone(),
            clock.clone(),
            StoreConfig {
                device_id: config.device_id.clone(),
                actor: config.actor.clone(),
            },
        ));

        for collection in &config.collections {
            store.reset_interrupted(*collection).await?;
        }

        let registry = Arc::new(ConflictRegistry::new(kv.clone(), clock.clone()));
        let resolver = ConflictResolver::new(store.clone(), registry.clone(), clock.clone());
        let orchestrator = Arc::new(SyncOrchestrator::new(
            store.clone(),
            registry.clone(),
            remote,
            network.clone(),
            config.sync.clone(),
        ));

        Ok(Self {
            store,
            registry,
            resolver,
            orchestrator,
            network,
            kv,
            clock,
            config,
        })
    }

    pub fn store(&self) -> &Arc<RecordStore> {
        &self.store
    }

    /// Underlying key-value backend this engine was assembled over.
    pub fn storage(&self) -> &Arc<dyn KeyValueStore> {
        &self.kv
    }

    pub fn conflicts(&self) -> &Arc<ConflictRegistry> {
        &self.registry
    }

    pub fn orchestrator(&self) -> &Arc<SyncOrchestrator> {
        &self.orchestrator
    }

    /// Subscribe to sync status transitions and conflict notifications.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<SyncEvent> {
        self.orchestrator.subscribe()
    }

    /// Spawn the orchestrator's driver loop on the current runtime.
    pub fn spawn_sync_loop(&self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.orchestrator.clone().run())
    }

    /// Save a payload and, when online, request a sync right away.
    pub async fn save(
        &self,
        collection: Collection,
        payload: Value,
        operation: ChangeOperation,
    ) -> SyncResult<String> {
        let id = self.store.save(collection, payload, operation).await?;
        if self.network.is_online() {
            self.orchestrator.request_sync();
        }
        Ok(id)
    }

    /// Soft-delete a record and, when online, request a sync right away.
    pub async fn delete(&self, collection: Collection, id: &str) -> SyncResult<()> {
        self.store.delete(collection, id).await?;
        if self.network.is_online() {
            self.orchestrator.request_sync();
        }
        Ok(())
    }

    /// Resolve an open conflict; the result re-enters the sync queue.
    pub async fn resolve_conflict(
        &self,
        record_id: &str,
        strategy: ResolutionStrategy,
        merged_payload: Option<Value>,
    ) -> SyncResult<SyncableRecord> {
        let resolved = self
            .resolver
            .resolve(record_id, strategy, merged_payload)
            .await?;
        if self.network.is_online() {
            self.orchestrator.request_sync();
        }
        Ok(resolved)
    }

    /// Current sync state for status indicators.
    pub async fn status(&self) -> SyncResult<SyncStatusSnapshot> {
        Ok(SyncStatusSnapshot {
            online: self.network.is_online(),
            sync_in_progress: self.orchestrator.sync_in_progress(),
            pending_count: self.store.queue_entries().await?.len(),
        })
    }

    /// Serialize all local state into a portable JSON backup.
    pub async fn export_backup(&self) -> SyncResult<String> {
        let mut collections = BTreeMap::new();
        for collection in &self.config.collections {
            collections.insert(
                collection.as_str().to_string(),
                self.store.records(*collection).await?,
            );
        }

        let envelope = BackupEnvelope {
            timestamp: self.clock.now(),
            device_id: self.config.device_id.as_str().to_string(),
            collections,
            conflicts: self.registry.open_conflicts().await?,
            change_log: self.store.change_log().all_entries().await?,
        };

        Ok(serde_json::to_string(&envelope)?)
    }

    /// Replace all local state from a backup produced by
    /// [`SyncEngine::export_backup`]. An unparseable envelope leaves the
    /// current state untouched.
    pub async fn restore_backup(&self, backup: &str) -> SyncResult<()> {
        let envelope: BackupEnvelope = serde_json::from_str(backup)
            .map_err(|e| SyncError::InvalidOperation(format!("invalid backup: {}", e)))?;

        for collection in &self.config.collections {
            self.kv.clear(collection.as_str()).await?;
        }
        self.kv.clear(SYNC_QUEUE_COLLECTION).await?;
        self.kv.clear(CONFLICT_COLLECTION).await?;
        self.kv.clear(CHANGE_LOG_COLLECTION).await?;

        for (collection, records) in &envelope.collections {
            for record in records {
                self.kv
                    .put(collection, &record.id, serde_json::to_value(record)?)
                    .await?;
            }
        }
        for conflict in &envelope.conflicts {
            self.kv
                .put(
                    CONFLICT_COLLECTION,
                    &conflict.record_id,
                    serde_json::to_value(conflict)?,
                )
                .await?;
        }
        for entry in &envelope.change_log {
            self.kv
                .put(
                    CHANGE_LOG_COLLECTION,
                    &entry.id.to_string(),
                    serde_json::to_value(entry)?,
                )
                .await?;
        }

        // Restored records that never synced must re-enter the queue
        for collection in &self.config.collections {
            for record in self.store.pending_records(*collection).await? {
                self.requeue(*collection, &record.id).await?;
            }
        }

        tracing::info!(
            source_device = %envelope.device_id,
            "Restored local state from backup"
        );

        Ok(())
    }

    async fn requeue(&self, collection: Collection, record_id: &str) -> SyncResult<()> {
        let entry = QueueEntry {
            collection: collection.as_str().to_string(),
            record_id: record_id.to_string(),
            enqueued_at: self.clock.now(),
            attempts: 0,
            last_error: None,
        };
        self.kv
            .put(
                SYNC_QUEUE_COLLECTION,
                &format!("{}:{}", collection.as_str(), record_id),
                serde_json::to_value(&entry)?,
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    struct AlwaysAck;

    #[async_trait]
    impl RemoteSyncClient for AlwaysAck {
        async fn attempt_sync(
            &self,
            _record: &SyncableRecord,
        ) -> Result<SyncOutcome, TransientSyncError> {
            Ok(SyncOutcome::Acknowledged)
        }
    }

    async fn build_engine(online: bool) -> SyncEngine {
        SyncEngine::new(
            MemoryStore::new(),
            Arc::new(SystemClock),
            SharedNetworkStatus::new(online),
            Arc::new(AlwaysAck),
            SyncEngineConfig::default(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_status_snapshot_counts_pending() {
        let engine = build_engine(false).await;

        engine
            .save(
                Collection::Cases,
                json!({"id": "c-1", "patient_id": "p-1"}),
                ChangeOperation::Create,
            )
            .await
            .unwrap();

        let status = engine.status().await.unwrap();
        assert!(!status.online);
        assert!(!status.sync_in_progress);
        assert_eq!(status.pending_count, 1);
    }

    #[tokio::test]
    async fn test_backup_round_trip() {
        let engine = build_engine(false).await;

        engine
            .save(
                Collection::Cases,
                json!({"id": "c-1", "patient_id": "p-1", "symptoms": ["fever"]}),
                ChangeOperation::Create,
            )
            .await
            .unwrap();
        engine
            .save(
                Collection::Patients,
                json!({"id": "p-1", "name": "Asha Devi"}),
                ChangeOperation::Create,
            )
            .await
            .unwrap();

        let backup = engine.export_backup().await.unwrap();

        // Restore into a fresh engine
        let other = build_engine(false).await;
        other.restore_backup(&backup).await.unwrap();

        let payload = other.store().get(Collection::Cases, "c-1").await.unwrap();
        assert!(payload.is_some());
        assert_eq!(other.status().await.unwrap().pending_count, 2);
        assert_eq!(other.store().change_log().all_entries().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_restore_rejects_invalid_backup() {
        let engine = build_engine(false).await;

        engine
            .save(
                Collection::Cases,
                json!({"id": "c-1", "patient_id": "p-1"}),
                ChangeOperation::Create,
            )
            .await
            .unwrap();

        let result = engine.restore_backup("{not json").await;
        assert!(matches!(result, Err(SyncError::InvalidOperation(_))));

        // Existing state untouched
        assert!(engine
            .store()
            .get(Collection::Cases, "c-1")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_startup_resets_interrupted_records() {
        let kv = MemoryStore::new();
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        {
            let store = RecordStore::new(kv.clone(), clock.clone(), StoreConfig::default());
            store
                .save(
                    Collection::Cases,
                    json!({"id": "c-1", "patient_id": "p-1"}),
                    ChangeOperation::Create,
                )
                .await
                .unwrap();
            store
                .set_status(Collection::Cases, "c-1", SyncStatus::Syncing)
                .await
                .unwrap();
        }

        // Simulates process restart over the same storage
        let engine = SyncEngine::new(
            kv,
            clock,
            SharedNetworkStatus::new(false),
            Arc::new(AlwaysAck),
            SyncEngineConfig::default(),
        )
        .await
        .unwrap();

        let record = engine
            .store()
            .record(Collection::Cases, "c-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.sync_status, SyncStatus::Pending);
    }
}
