//! Durable record store and pending-operation queue.
//!
//! All local mutation flows through [`RecordStore::save`] and
//! [`RecordStore::delete`]; both serialize their read-modify-write through
//! one mutex so version and checksum computation are atomic with the write
//! that carries them. Storage failures propagate to the caller; the store
//! never retries on its own.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use uuid::Uuid;

use case_model::{validate_payload, Collection};

use crate::changelog::{ChangeLog, ChangeOperation};
use crate::checksum::{checksum, next_version};
use crate::error::{SyncError, SyncResult};
use crate::platform::{Clock, KeyValueStore};
use crate::record::{DeviceId, SyncStatus, SyncableRecord, DELETED_FLAG};

/// Storage collection holding the pending-operation queue.
pub const SYNC_QUEUE_COLLECTION: &str = "sync_queue";

/// Configuration for the record store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Stable identifier of this device
    pub device_id: DeviceId,
    /// Actor recorded in the change log
    pub actor: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            device_id: DeviceId::generate(),
            actor: "local".to_string(),
        }
    }
}

/// One entry in the pending-operation queue.
///
/// Queue order is enqueue order and is used for retry fairness only;
/// correctness never depends on delivery order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    /// Collection the queued record lives in
    pub collection: String,

    /// Queued record id
    pub record_id: String,

    /// When the record was first enqueued
    pub enqueued_at: DateTime<Utc>,

    /// Failed sync attempts so far
    pub attempts: u32,

    /// Last sync error message, if any
    pub last_error: Option<String>,
}

impl QueueEntry {
    fn key(collection: &str, record_id: &str) -> String {
        format!("{}:{}", collection, record_id)
    }
}

/// Result of an integrity sweep over a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

/// Local record store over an injected key-value backend.
pub struct RecordStore {
    kv: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    change_log: ChangeLog,
    device_id: String,
    // Serializes read-modify-write across concurrent local writers so no
    // two saves to the same id can mint the same version number.
    write_lock: Mutex<()>,
}

impl RecordStore {
    pub fn new(kv: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>, config: StoreConfig) -> Self {
        let change_log = ChangeLog::new(
            kv.clone(),
            clock.clone(),
            config.actor,
            config.device_id.as_str().to_string(),
        );

        Self {
            kv,
            clock,
            change_log,
            device_id: config.device_id.as_str().to_string(),
            write_lock: Mutex::new(()),
        }
    }

    /// Device identifier stamped on local mutations.
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Change log writer for this store.
    pub fn change_log(&self) -> &ChangeLog {
        &self.change_log
    }

    /// Save a payload as a new version of its record.
    ///
    /// Validates the payload against its collection schema, computes the
    /// next version and checksum, persists the record as `pending`,
    /// enqueues it for sync, and appends a change log entry. Returns the
    /// record id (generated when the payload carries none).
    pub async fn save(
        &self,
        collection: Collection,
        payload: Value,
        operation: ChangeOperation,
    ) -> SyncResult<String> {
        validate_payload(collection, &payload)?;

        let _guard = self.write_lock.lock().await;

        let id = payload
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let existing = self.load_record(collection.as_str(), &id).await?;
        let version = next_version(existing.map(|r| r.version));

        let record = SyncableRecord {
            id: id.clone(),
            checksum: checksum(&payload),
            payload: payload.clone(),
            version,
            last_modified: self.clock.now(),
            sync_status: SyncStatus::Pending,
            device_id: self.device_id.clone(),
        };

        self.put_record(collection.as_str(), &record).await?;
        self.enqueue(collection.as_str(), &id).await?;
        self.change_log.append(&id, operation, payload).await?;

        tracing::debug!(
            collection = collection.as_str(),
            record_id = %id,
            version,
            "Saved record"
        );

        Ok(id)
    }

    /// Payload of a record, or None when the id is unknown.
    pub async fn get(&self, collection: Collection, id: &str) -> SyncResult<Option<Value>> {
        Ok(self
            .load_record(collection.as_str(), id)
            .await?
            .map(|r| r.payload))
    }

    /// Payloads whose fields equal every non-null filter key.
    ///
    /// No partial or fuzzy matching; a missing field never matches.
    pub async fn query(
        &self,
        collection: Collection,
        filter: Option<&Map<String, Value>>,
    ) -> SyncResult<Vec<Value>> {
        let records = self.records(collection).await?;
        let mut results: Vec<Value> = records.into_iter().map(|r| r.payload).collect();

        if let Some(filter) = filter {
            results.retain(|payload| {
                filter.iter().all(|(key, expected)| {
                    if expected.is_null() {
                        return true;
                    }
                    payload.get(key) == Some(expected)
                })
            });
        }

        Ok(results)
    }

    /// Soft-delete a record: set the deletion flag, bump the version, and
    /// re-enqueue. Unknown ids are a no-op. Physical removal never happens,
    /// so sync history survives.
    pub async fn delete(&self, collection: Collection, id: &str) -> SyncResult<()> {
        let _guard = self.write_lock.lock().await;

        let Some(mut record) = self.load_record(collection.as_str(), id).await? else {
            tracing::debug!(
                collection = collection.as_str(),
                record_id = %id,
                "Delete of unknown record ignored"
            );
            return Ok(());
        };

        if let Value::Object(payload) = &mut record.payload {
            payload.insert(DELETED_FLAG.to_string(), Value::Bool(true));
        }
        record.version += 1;
        record.checksum = checksum(&record.payload);
        record.last_modified = self.clock.now();
        record.sync_status = SyncStatus::Pending;

        self.put_record(collection.as_str(), &record).await?;
        self.enqueue(collection.as_str(), id).await?;
        self.change_log
            .append(id, ChangeOperation::Delete, serde_json::json!({ DELETED_FLAG: true }))
            .await?;

        tracing::debug!(
            collection = collection.as_str(),
            record_id = %id,
            version = record.version,
            "Soft-deleted record"
        );

        Ok(())
    }

    /// Full record with sync metadata.
    pub async fn record(&self, collection: Collection, id: &str) -> SyncResult<Option<SyncableRecord>> {
        self.load_record(collection.as_str(), id).await
    }

    /// All records of a collection.
    pub async fn records(&self, collection: Collection) -> SyncResult<Vec<SyncableRecord>> {
        let mut records = Vec::new();
        for value in self.kv.get_all(collection.as_str()).await? {
            records.push(serde_json::from_value(value)?);
        }
        Ok(records)
    }

    /// Records awaiting sync.
    pub async fn pending_records(&self, collection: Collection) -> SyncResult<Vec<SyncableRecord>> {
        let mut records = self.records(collection).await?;
        records.retain(|r| r.sync_status == SyncStatus::Pending);
        Ok(records)
    }

    /// Move a record to a new sync status.
    pub async fn set_status(
        &self,
        collection: Collection,
        id: &str,
        status: SyncStatus,
    ) -> SyncResult<()> {
        let mut record = self
            .load_record(collection.as_str(), id)
            .await?
            .ok_or_else(|| SyncError::NotFound(format!("record {}", id)))?;

        record.sync_status = status;
        self.put_record(collection.as_str(), &record).await
    }

    /// Write a conflict-resolution result: the record is persisted as a
    /// fresh pending version, re-enqueued, and logged as an update.
    pub async fn write_resolved(
        &self,
        collection: Collection,
        record: SyncableRecord,
    ) -> SyncResult<()> {
        let _guard = self.write_lock.lock().await;

        self.put_record(collection.as_str(), &record).await?;
        self.enqueue(collection.as_str(), &record.id).await?;
        self.change_log
            .append(&record.id, ChangeOperation::Update, record.payload.clone())
            .await?;

        Ok(())
    }

    /// Recompute every stored checksum and report mismatches. A mismatch
    /// means the payload was mutated without going through `save`.
    pub async fn validate_integrity(&self, collection: Collection) -> SyncResult<IntegrityReport> {
        let mut errors = Vec::new();

        for record in self.records(collection).await? {
            let expected = checksum(&record.payload);
            if record.checksum != expected {
                tracing::warn!(
                    collection = collection.as_str(),
                    record_id = %record.id,
                    "Checksum mismatch detected"
                );
                errors.push(format!("Checksum mismatch for record {}", record.id));
            }
        }

        Ok(IntegrityReport {
            valid: errors.is_empty(),
            errors,
        })
    }

    /// Reset records stranded in `syncing` by an interrupted cycle back to
    /// `pending`. Run at startup before the first sync. Returns how many
    /// records were reset.
    pub async fn reset_interrupted(&self, collection: Collection) -> SyncResult<usize> {
        let mut reset = 0;
        for mut record in self.records(collection).await? {
            if record.sync_status == SyncStatus::Syncing {
                record.sync_status = SyncStatus::Pending;
                self.put_record(collection.as_str(), &record).await?;
                reset += 1;
            }
        }

        if reset > 0 {
            tracing::info!(
                collection = collection.as_str(),
                records = reset,
                "Reset interrupted records to pending"
            );
        }

        Ok(reset)
    }

    /// Queue entries, oldest first.
    pub async fn queue_entries(&self) -> SyncResult<Vec<QueueEntry>> {
        let mut entries: Vec<QueueEntry> = Vec::new();
        for value in self.kv.get_all(SYNC_QUEUE_COLLECTION).await? {
            entries.push(serde_json::from_value(value)?);
        }
        entries.sort_by(|a, b| a.enqueued_at.cmp(&b.enqueued_at));
        Ok(entries)
    }

    /// Remove a record from the queue once the remote acknowledged it.
    pub async fn dequeue(&self, collection: Collection, record_id: &str) -> SyncResult<()> {
        self.kv
            .delete(
                SYNC_QUEUE_COLLECTION,
                &QueueEntry::key(collection.as_str(), record_id),
            )
            .await?;
        Ok(())
    }

    /// Record a failed sync attempt for retry-fairness bookkeeping.
    pub async fn mark_attempt_failed(
        &self,
        collection: Collection,
        record_id: &str,
        error: &str,
    ) -> SyncResult<()> {
        let key = QueueEntry::key(collection.as_str(), record_id);
        let Some(value) = self.kv.get(SYNC_QUEUE_COLLECTION, &key).await? else {
            return Ok(());
        };

        let mut entry: QueueEntry = serde_json::from_value(value)?;
        entry.attempts += 1;
        entry.last_error = Some(error.to_string());

        self.kv
            .put(SYNC_QUEUE_COLLECTION, &key, serde_json::to_value(&entry)?)
            .await?;

        tracing::warn!(
            collection = collection.as_str(),
            record_id = record_id,
            attempts = entry.attempts,
            error = error,
            "Sync attempt failed"
        );

        Ok(())
    }

    async fn enqueue(&self, collection: &str, record_id: &str) -> SyncResult<()> {
        let key = QueueEntry::key(collection, record_id);

        // Keep the original enqueue time when the record is already queued
        // so repeated local edits cannot push it to the back forever.
        if self.kv.get(SYNC_QUEUE_COLLECTION, &key).await?.is_some() {
            return Ok(());
        }

        let entry = QueueEntry {
            collection: collection.to_string(),
            record_id: record_id.to_string(),
            enqueued_at: self.clock.now(),
            attempts: 0,
            last_error: None,
        };

        self.kv
            .put(SYNC_QUEUE_COLLECTION, &key, serde_json::to_value(&entry)?)
            .await?;
        Ok(())
    }

    async fn load_record(&self, collection: &str, id: &str) -> SyncResult<Option<SyncableRecord>> {
        match self.kv.get(collection, id).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    async fn put_record(&self, collection: &str, record: &SyncableRecord) -> SyncResult<()> {
        self.kv
            .put(collection, &record.id, serde_json::to_value(record)?)
            .await?;
        Ok(())
    }
}
