//! Sync orchestration.
//!
//! Drives the synchronization cycle: walks the pending queue, attempts
//! each record against the remote collaborator, and routes outcomes to the
//! store and the conflict registry. Single-flight per device: an atomic
//! in-progress guard prevents overlapping cycles; there is no queue of
//! sync requests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, Notify};

use case_model::Collection;

use crate::conflict::{ConflictRegistry, ConflictType};
use crate::error::{SyncResult, TransientSyncError};
use crate::platform::NetworkMonitor;
use crate::record::{SyncStatus, SyncableRecord};
use crate::store::RecordStore;

/// Outcome of one remote sync attempt.
#[derive(Debug, Clone)]
pub enum SyncOutcome {
    /// Remote accepted this version; no divergence
    Acknowledged,
    /// Remote holds a competing version
    Diverged(SyncableRecord),
}

/// Remote sync collaborator boundary.
///
/// Implementations own their transport, timeout, and retry policy; a
/// failure they consider retryable surfaces as [`TransientSyncError`].
#[async_trait]
pub trait RemoteSyncClient: Send + Sync {
    async fn attempt_sync(&self, record: &SyncableRecord) -> Result<SyncOutcome, TransientSyncError>;
}

/// Cycle status reported to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleStatus {
    Syncing,
    Synced,
    SyncError,
}

impl CycleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CycleStatus::Syncing => "syncing",
            CycleStatus::Synced => "synced",
            CycleStatus::SyncError => "sync_error",
        }
    }
}

/// Event on the observation channel.
///
/// Observation only: observers cannot alter a cycle's outcome, and a
/// lagging or dropped observer never affects the cycle.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    StatusChanged(CycleStatus),
    ConflictDetected {
        record_id: String,
        conflict_type: ConflictType,
    },
}

/// Counters for one sync cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Queue entries examined
    pub processed: usize,
    /// Records acknowledged and marked synced
    pub synced: usize,
    /// Divergences handed to the conflict registry
    pub conflicts: usize,
    /// Records left pending after a transient failure
    pub failed: usize,
}

/// Sync orchestrator configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Periodic trigger interval
    pub interval: Duration,
    /// Observation channel capacity
    pub event_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            // The source platform synced every five minutes when online
            interval: Duration::from_secs(5 * 60),
            event_capacity: 64,
        }
    }
}

/// Drives synchronization for one device.
pub struct SyncOrchestrator {
    store: Arc<RecordStore>,
    registry: Arc<ConflictRegistry>,
    remote: Arc<dyn RemoteSyncClient>,
    network: Arc<dyn NetworkMonitor>,
    config: SyncConfig,
    in_progress: AtomicBool,
    events: broadcast::Sender<SyncEvent>,
    wakeup: Notify,
}

impl SyncOrchestrator {
    pub fn new(
        store: Arc<RecordStore>,
        registry: Arc<ConflictRegistry>,
        remote: Arc<dyn RemoteSyncClient>,
        network: Arc<dyn NetworkMonitor>,
        config: SyncConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity);

        Self {
            store,
            registry,
            remote,
            network,
            config,
            in_progress: AtomicBool::new(false),
            events,
            wakeup: Notify::new(),
        }
    }

    /// Subscribe to status transitions and conflict notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// Whether a cycle is currently executing.
    pub fn sync_in_progress(&self) -> bool {
        self.in_progress.load(Ordering::SeqCst)
    }

    /// Ask the driver loop to run a cycle soon. Requests coalesce; there
    /// is never more than one queued wakeup.
    pub fn request_sync(&self) {
        self.wakeup.notify_one();
    }

    /// Run one sync cycle now.
    ///
    /// Returns `None` without side effects when the device is offline or a
    /// cycle is already in flight.
    pub async fn sync_now(&self) -> SyncResult<Option<SyncStats>> {
        if !self.network.is_online() {
            tracing::debug!("Skipping sync cycle while offline");
            return Ok(None);
        }

        if self
            .in_progress
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("Sync cycle already in progress");
            return Ok(None);
        }

        let result = self.run_cycle().await;
        self.in_progress.store(false, Ordering::SeqCst);

        match result {
            Ok(stats) => Ok(Some(stats)),
            Err(err) => {
                self.emit(SyncEvent::StatusChanged(CycleStatus::SyncError));
                Err(err)
            }
        }
    }

    /// Long-running driver: periodic interval, explicit requests, and the
    /// offline-to-online transition all trigger cycles. Runs until the
    /// task is dropped.
    pub async fn run(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.wakeup.notified() => {}
                _ = self.network.online_transition() => {
                    tracing::info!("Connectivity restored; triggering sync");
                }
            }

            if let Err(err) = self.sync_now().await {
                tracing::error!(error = %err, "Sync cycle failed");
            }
        }
    }

    async fn run_cycle(&self) -> SyncResult<SyncStats> {
        self.emit(SyncEvent::StatusChanged(CycleStatus::Syncing));

        let mut stats = SyncStats::default();
        let entries = self.store.queue_entries().await?;
        tracing::debug!(pending = entries.len(), "Starting sync cycle");

        for entry in entries {
            let collection = match Collection::from_str(&entry.collection) {
                Ok(collection) => collection,
                Err(err) => {
                    tracing::warn!(
                        collection = %entry.collection,
                        record_id = %entry.record_id,
                        error = %err,
                        "Skipping queue entry with unknown collection"
                    );
                    continue;
                }
            };

            let Some(record) = self.store.record(collection, &entry.record_id).await? else {
                // Stale entry; the record is gone from storage
                self.store.dequeue(collection, &entry.record_id).await?;
                continue;
            };

            if record.sync_status != SyncStatus::Pending {
                // Conflicted records wait for resolution before re-sync
                continue;
            }

            stats.processed += 1;
            self.sync_record(collection, record, &mut stats).await?;
        }

        let status = if stats.failed > 0 {
            CycleStatus::SyncError
        } else {
            CycleStatus::Synced
        };
        self.emit(SyncEvent::StatusChanged(status));

        tracing::debug!(
            processed = stats.processed,
            synced = stats.synced,
            conflicts = stats.conflicts,
            failed = stats.failed,
            "Sync cycle finished"
        );

        Ok(stats)
    }

    async fn sync_record(
        &self,
        collection: Collection,
        record: SyncableRecord,
        stats: &mut SyncStats,
    ) -> SyncResult<()> {
        self.store
            .set_status(collection, &record.id, SyncStatus::Syncing)
            .await?;

        match self.remote.attempt_sync(&record).await {
            Ok(SyncOutcome::Acknowledged) => {
                self.store
                    .set_status(collection, &record.id, SyncStatus::Synced)
                    .await?;
                self.store.dequeue(collection, &record.id).await?;
                stats.synced += 1;

                tracing::debug!(record_id = %record.id, version = record.version, "Record synced");
            }
            Ok(SyncOutcome::Diverged(remote_record)) => {
                self.store
                    .set_status(collection, &record.id, SyncStatus::Conflict)
                    .await?;

                let conflict = self
                    .registry
                    .record_conflict(collection, record, remote_record)
                    .await?;

                self.emit(SyncEvent::ConflictDetected {
                    record_id: conflict.record_id.clone(),
                    conflict_type: conflict.conflict_type,
                });
                stats.conflicts += 1;
            }
            Err(err) => {
                // Transient: leave the record pending for a later cycle and
                // keep processing the rest of the queue.
                self.store
                    .set_status(collection, &record.id, SyncStatus::Pending)
                    .await?;
                self.store
                    .mark_attempt_failed(collection, &record.id, &err.to_string())
                    .await?;
                stats.failed += 1;
            }
        }

        Ok(())
    }

    fn emit(&self, event: SyncEvent) {
        // Send fails only when nobody is subscribed, which is fine.
        let _ = self.events.send(event);
    }
}
