//! Conflict detection and resolution.
//!
//! A conflict exists from the moment a sync attempt surfaces a divergent
//! remote version until resolution. Resolving always produces a fresh
//! pending version so the outcome re-enters the sync queue.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use case_model::Collection;

use crate::checksum::checksum;
use crate::error::{SyncError, SyncResult};
use crate::platform::{Clock, KeyValueStore};
use crate::record::{SyncStatus, SyncableRecord};
use crate::store::RecordStore;

/// Storage collection holding open conflicts, keyed by record id.
pub const CONFLICT_COLLECTION: &str = "conflicts";

/// Classification of a divergence between local and remote versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
    /// Remote is strictly newer and the local record carries no
    /// independent edit. Classified for completeness; the pending-queue
    /// path cannot normally produce it.
    Version,
    /// Both sides advanced independently since the last common sync point.
    Concurrent,
    /// One side soft-deleted the record while the other modified it.
    Deleted,
}

impl ConflictType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictType::Version => "version",
            ConflictType::Concurrent => "concurrent",
            ConflictType::Deleted => "deleted",
        }
    }

    pub fn from_str(s: &str) -> SyncResult<Self> {
        match s {
            "version" => Ok(ConflictType::Version),
            "concurrent" => Ok(ConflictType::Concurrent),
            "deleted" => Ok(ConflictType::Deleted),
            _ => Err(SyncError::InvalidOperation(format!(
                "Unknown conflict type: {}",
                s
            ))),
        }
    }
}

/// How to resolve an open conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStrategy {
    /// Local payload wins verbatim
    Local,
    /// Remote payload wins verbatim
    Remote,
    /// Caller supplies the merged payload
    Merge,
}

impl ResolutionStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionStrategy::Local => "local",
            ResolutionStrategy::Remote => "remote",
            ResolutionStrategy::Merge => "merge",
        }
    }

    pub fn from_str(s: &str) -> SyncResult<Self> {
        match s {
            "local" => Ok(ResolutionStrategy::Local),
            "remote" => Ok(ResolutionStrategy::Remote),
            "merge" => Ok(ResolutionStrategy::Merge),
            _ => Err(SyncError::InvalidOperation(format!(
                "Unknown resolution strategy: {}",
                s
            ))),
        }
    }
}

/// An open conflict awaiting resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConflict {
    /// Record both versions belong to
    pub record_id: String,

    /// Collection the record lives in
    pub collection: String,

    /// Complete local version
    pub local: SyncableRecord,

    /// Complete remote version
    pub remote: SyncableRecord,

    /// Classified divergence
    pub conflict_type: ConflictType,

    /// When the divergence was detected
    pub detected_at: DateTime<Utc>,
}

/// Classify the divergence between a local record and a competing remote
/// version.
pub fn classify(local: &SyncableRecord, remote: &SyncableRecord) -> ConflictType {
    if local.is_deleted() != remote.is_deleted() {
        ConflictType::Deleted
    } else if local.sync_status.has_unsynced_changes() {
        ConflictType::Concurrent
    } else {
        ConflictType::Version
    }
}

/// Set of open conflicts, one per record id.
pub struct ConflictRegistry {
    kv: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
}

impl ConflictRegistry {
    pub fn new(kv: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self { kv, clock }
    }

    /// Record a freshly detected conflict. A later detection for the same
    /// record replaces the earlier one; there is at most one open conflict
    /// per record.
    pub async fn record_conflict(
        &self,
        collection: Collection,
        local: SyncableRecord,
        remote: SyncableRecord,
    ) -> SyncResult<SyncConflict> {
        let conflict_type = classify(&local, &remote);
        let conflict = SyncConflict {
            record_id: local.id.clone(),
            collection: collection.as_str().to_string(),
            local,
            remote,
            conflict_type,
            detected_at: self.clock.now(),
        };

        self.kv
            .put(
                CONFLICT_COLLECTION,
                &conflict.record_id,
                serde_json::to_value(&conflict)?,
            )
            .await?;

        tracing::warn!(
            record_id = %conflict.record_id,
            conflict_type = conflict_type.as_str(),
            local_version = conflict.local.version,
            remote_version = conflict.remote.version,
            "Sync conflict detected"
        );

        Ok(conflict)
    }

    /// Open conflict for a record, if any.
    pub async fn get(&self, record_id: &str) -> SyncResult<Option<SyncConflict>> {
        match self.kv.get(CONFLICT_COLLECTION, record_id).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// All open conflicts.
    pub async fn open_conflicts(&self) -> SyncResult<Vec<SyncConflict>> {
        let mut conflicts = Vec::new();
        for value in self.kv.get_all(CONFLICT_COLLECTION).await? {
            conflicts.push(serde_json::from_value(value)?);
        }
        Ok(conflicts)
    }

    /// Drop a conflict from the open set.
    pub async fn remove(&self, record_id: &str) -> SyncResult<()> {
        self.kv.delete(CONFLICT_COLLECTION, record_id).await?;
        Ok(())
    }
}

/// Applies resolution strategies to open conflicts.
pub struct ConflictResolver {
    store: Arc<RecordStore>,
    registry: Arc<ConflictRegistry>,
    clock: Arc<dyn Clock>,
}

impl ConflictResolver {
    pub fn new(
        store: Arc<RecordStore>,
        registry: Arc<ConflictRegistry>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            registry,
            clock,
        }
    }

    /// Resolve an open conflict.
    ///
    /// The strategy picks the payload; every resolution writes a new
    /// record version `max(local, remote) + 1` with status `pending`,
    /// re-enqueues it, and removes the conflict from the open set.
    /// `merge` requires the caller-supplied merged payload.
    pub async fn resolve(
        &self,
        record_id: &str,
        strategy: ResolutionStrategy,
        merged_payload: Option<Value>,
    ) -> SyncResult<SyncableRecord> {
        let conflict = self
            .registry
            .get(record_id)
            .await?
            .ok_or_else(|| SyncError::NotFound(format!("no open conflict for record {}", record_id)))?;

        let collection = Collection::from_str(&conflict.collection)?;

        let payload = match strategy {
            ResolutionStrategy::Local => conflict.local.payload.clone(),
            ResolutionStrategy::Remote => conflict.remote.payload.clone(),
            ResolutionStrategy::Merge => merged_payload.ok_or_else(|| {
                SyncError::InvalidOperation(
                    "merge resolution requires a merged payload".to_string(),
                )
            })?,
        };

        let resolved = SyncableRecord {
            id: conflict.record_id.clone(),
            checksum: checksum(&payload),
            payload,
            version: conflict.local.version.max(conflict.remote.version) + 1,
            last_modified: self.clock.now(),
            sync_status: SyncStatus::Pending,
            device_id: self.store.device_id().to_string(),
        };

        self.store.write_resolved(collection, resolved.clone()).await?;
        self.registry.remove(record_id).await?;

        tracing::info!(
            record_id = record_id,
            strategy = strategy.as_str(),
            version = resolved.version,
            "Resolved sync conflict"
        );

        Ok(resolved)
    }
}
