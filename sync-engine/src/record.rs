//! Syncable record model and status state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{SyncError, SyncResult};

pub use case_model::DELETED_FLAG;

/// Sync lifecycle of a record.
///
/// `pending -> syncing -> {synced, conflict}`; resolving a conflict moves
/// the record back to `pending`. `syncing` is not durable: a record found
/// in that state at startup belongs to an interrupted cycle and is reset
/// to `pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Pending,
    Syncing,
    Synced,
    Conflict,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Pending => "pending",
            SyncStatus::Syncing => "syncing",
            SyncStatus::Synced => "synced",
            SyncStatus::Conflict => "conflict",
        }
    }

    pub fn from_str(s: &str) -> SyncResult<Self> {
        match s {
            "pending" => Ok(SyncStatus::Pending),
            "syncing" => Ok(SyncStatus::Syncing),
            "synced" => Ok(SyncStatus::Synced),
            "conflict" => Ok(SyncStatus::Conflict),
            _ => Err(SyncError::InvalidOperation(format!(
                "Unknown sync status: {}",
                s
            ))),
        }
    }

    /// True when the record carries a local mutation the remote has not
    /// acknowledged yet.
    pub fn has_unsynced_changes(&self) -> bool {
        matches!(
            self,
            SyncStatus::Pending | SyncStatus::Syncing | SyncStatus::Conflict
        )
    }
}

/// Stable per-device identifier stamped on every local mutation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn generate() -> Self {
        Self(format!("device-{}", Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for DeviceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A locally stored record with its sync metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncableRecord {
    /// Stable record id
    pub id: String,

    /// Opaque payload; shape is owned by `case-model`
    pub payload: Value,

    /// Monotonic version, starts at 1, bumps once per local mutation
    pub version: u64,

    /// Device-local wall-clock time of the last mutation
    pub last_modified: DateTime<Utc>,

    /// Content checksum of the payload
    pub checksum: String,

    /// Position in the sync lifecycle
    pub sync_status: SyncStatus,

    /// Device that produced this version
    pub device_id: String,
}

impl SyncableRecord {
    /// True when the payload carries the soft-delete flag.
    pub fn is_deleted(&self) -> bool {
        self.payload
            .get(DELETED_FLAG)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}
