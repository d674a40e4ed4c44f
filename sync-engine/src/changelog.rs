//! Append-only change log for record mutations.
//!
//! Every save and soft delete appends one entry. Entries are never mutated
//! or deleted, with a single exception: data-erasure requests anonymize an
//! entry in place (actor replaced, change payload redacted) so the audit
//! trail keeps its shape and timestamps while shedding identifying content.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{SyncError, SyncResult};
use crate::platform::{Clock, KeyValueStore};

/// Storage collection holding change log entries.
pub const CHANGE_LOG_COLLECTION: &str = "change_log";

const REDACTED_ACTOR: &str = "redacted";

/// Kind of mutation recorded in the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOperation {
    Create,
    Update,
    Delete,
}

impl ChangeOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeOperation::Create => "create",
            ChangeOperation::Update => "update",
            ChangeOperation::Delete => "delete",
        }
    }

    pub fn from_str(s: &str) -> SyncResult<Self> {
        match s {
            "create" => Ok(ChangeOperation::Create),
            "update" => Ok(ChangeOperation::Update),
            "delete" => Ok(ChangeOperation::Delete),
            _ => Err(SyncError::InvalidOperation(format!(
                "Unknown change operation: {}",
                s
            ))),
        }
    }
}

/// One audit record of a local mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeLogEntry {
    /// Unique entry id
    pub id: Uuid,

    /// Record the mutation applied to
    pub record_id: String,

    /// Kind of mutation
    pub operation: ChangeOperation,

    /// Payload of the change as submitted
    pub changes: Value,

    /// When the mutation happened, device-local clock
    pub timestamp: DateTime<Utc>,

    /// Who performed the mutation
    pub actor: String,

    /// Device the mutation originated on
    pub device_id: String,

    /// Set once the entry has been anonymized for a data-erasure request
    #[serde(default)]
    pub redacted: bool,
}

/// Append-only writer over the change log collection.
pub struct ChangeLog {
    kv: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    actor: String,
    device_id: String,
}

impl ChangeLog {
    pub fn new(
        kv: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        actor: String,
        device_id: String,
    ) -> Self {
        Self {
            kv,
            clock,
            actor,
            device_id,
        }
    }

    /// Append one entry. Entries are keyed by their own id so existing
    /// entries can never be overwritten by an append.
    pub async fn append(
        &self,
        record_id: &str,
        operation: ChangeOperation,
        changes: Value,
    ) -> SyncResult<ChangeLogEntry> {
        let entry = ChangeLogEntry {
            id: Uuid::new_v4(),
            record_id: record_id.to_string(),
            operation,
            changes,
            timestamp: self.clock.now(),
            actor: self.actor.clone(),
            device_id: self.device_id.clone(),
            redacted: false,
        };

        self.kv
            .put(
                CHANGE_LOG_COLLECTION,
                &entry.id.to_string(),
                serde_json::to_value(&entry)?,
            )
            .await?;

        tracing::debug!(
            record_id = record_id,
            operation = operation.as_str(),
            "Appended change log entry"
        );

        Ok(entry)
    }

    /// All entries, oldest first.
    pub async fn all_entries(&self) -> SyncResult<Vec<ChangeLogEntry>> {
        let mut entries: Vec<ChangeLogEntry> = Vec::new();
        for value in self.kv.get_all(CHANGE_LOG_COLLECTION).await? {
            entries.push(serde_json::from_value(value)?);
        }
        entries.sort_by_key(|e| e.timestamp);
        Ok(entries)
    }

    /// Entries for one record, oldest first.
    pub async fn entries_for(&self, record_id: &str) -> SyncResult<Vec<ChangeLogEntry>> {
        let mut entries = self.all_entries().await?;
        entries.retain(|e| e.record_id == record_id);
        Ok(entries)
    }

    /// Anonymize every entry for a record to satisfy a data-erasure
    /// request. The entries themselves, their timestamps, and their
    /// operations are preserved for audit continuity. Returns the number
    /// of entries rewritten.
    pub async fn anonymize_record(&self, record_id: &str) -> SyncResult<usize> {
        let mut rewritten = 0;
        for mut entry in self.entries_for(record_id).await? {
            entry.actor = REDACTED_ACTOR.to_string();
            entry.changes = Value::Null;
            entry.redacted = true;

            self.kv
                .put(
                    CHANGE_LOG_COLLECTION,
                    &entry.id.to_string(),
                    serde_json::to_value(&entry)?,
                )
                .await?;
            rewritten += 1;
        }

        tracing::info!(
            record_id = record_id,
            entries = rewritten,
            "Anonymized change log entries for erasure request"
        );

        Ok(rewritten)
    }
}
