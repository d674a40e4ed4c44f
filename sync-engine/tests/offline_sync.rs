//! End-to-end offline sync scenarios.
//!
//! Drives the assembled engine against a scripted remote collaborator:
//! connectivity loss, two-device divergence, conflict resolution, and
//! integrity checking.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Mutex;

use case_model::Collection;
use sync_engine::{
    ChangeOperation, Clock, ConflictType, CycleStatus, KeyValueStore, MemoryStore,
    RecordStore, RemoteSyncClient, ResolutionStrategy, SharedNetworkStatus, StoreConfig,
    SyncEngine, SyncEngineConfig, SyncEvent, SyncOutcome, SyncStatus, SyncableRecord,
    SystemClock, TransientSyncError,
};

/// Remote collaborator driven by a prepared script of outcomes.
///
/// Unscripted attempts acknowledge. Deterministic by construction: the
/// production engine never sees simulated randomness.
struct ScriptedRemote {
    script: Mutex<VecDeque<Result<SyncOutcome, TransientSyncError>>>,
}

impl ScriptedRemote {
    fn new(outcomes: Vec<Result<SyncOutcome, TransientSyncError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(outcomes.into()),
        })
    }

    fn acknowledging() -> Arc<Self> {
        Self::new(Vec::new())
    }
}

#[async_trait]
impl RemoteSyncClient for ScriptedRemote {
    async fn attempt_sync(
        &self,
        _record: &SyncableRecord,
    ) -> Result<SyncOutcome, TransientSyncError> {
        self.script
            .lock()
            .await
            .pop_front()
            .unwrap_or(Ok(SyncOutcome::Acknowledged))
    }
}

fn case_payload(id: &str, notes: &str) -> Value {
    json!({
        "id": id,
        "patient_id": "patient-1",
        "symptoms": ["fever"],
        "notes": notes,
    })
}

async fn build_engine(
    online: bool,
    remote: Arc<dyn RemoteSyncClient>,
) -> (SyncEngine, Arc<SharedNetworkStatus>) {
    let network = SharedNetworkStatus::new(online);
    let engine = SyncEngine::new(
        MemoryStore::new(),
        Arc::new(SystemClock),
        network.clone(),
        remote,
        SyncEngineConfig::default(),
    )
    .await
    .unwrap();
    (engine, network)
}

/// A version the remote claims was written by another device.
fn remote_version(local: &SyncableRecord, version: u64, notes: &str) -> SyncableRecord {
    let mut payload = local.payload.clone();
    payload["notes"] = json!(notes);

    SyncableRecord {
        id: local.id.clone(),
        checksum: sync_engine::checksum(&payload),
        payload,
        version,
        last_modified: local.last_modified + chrono::Duration::seconds(1),
        sync_status: SyncStatus::Synced,
        device_id: "device-b".to_string(),
    }
}

#[tokio::test]
async fn test_offline_saves_stay_pending_without_crash() {
    let (engine, _network) = build_engine(false, ScriptedRemote::acknowledging()).await;

    engine
        .save(
            Collection::Cases,
            case_payload("case-1", "first visit"),
            ChangeOperation::Create,
        )
        .await
        .unwrap();
    engine
        .save(
            Collection::Cases,
            case_payload("case-1", "second visit"),
            ChangeOperation::Update,
        )
        .await
        .unwrap();

    let record = engine
        .store()
        .record(Collection::Cases, "case-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.version, 2);
    assert_eq!(record.sync_status, SyncStatus::Pending);

    // Triggering sync while offline changes nothing
    let stats = engine.orchestrator().sync_now().await.unwrap();
    assert!(stats.is_none());

    let record = engine
        .store()
        .record(Collection::Cases, "case-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.sync_status, SyncStatus::Pending);
    assert_eq!(engine.status().await.unwrap().pending_count, 1);
}

#[tokio::test]
async fn test_sync_after_reconnect_acknowledges_records() {
    let (engine, network) = build_engine(false, ScriptedRemote::acknowledging()).await;

    engine
        .save(
            Collection::Cases,
            case_payload("case-1", "offline intake"),
            ChangeOperation::Create,
        )
        .await
        .unwrap();

    network.set_online(true);
    let stats = engine.orchestrator().sync_now().await.unwrap().unwrap();
    assert_eq!(stats.synced, 1);

    let record = engine
        .store()
        .record(Collection::Cases, "case-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.sync_status, SyncStatus::Synced);
    assert_eq!(engine.status().await.unwrap().pending_count, 0);
}

#[tokio::test]
async fn test_two_device_divergence_surfaces_concurrent_conflict() {
    let (engine, _network) = build_engine(true, ScriptedRemote::acknowledging()).await;

    // Device A's local edit, acknowledged by the remote
    engine
        .save(
            Collection::Cases,
            case_payload("case-1", "device A notes"),
            ChangeOperation::Create,
        )
        .await
        .unwrap();
    engine.orchestrator().sync_now().await.unwrap().unwrap();

    // Device A edits again while device B's competing edit reached the
    // remote first
    engine
        .save(
            Collection::Cases,
            case_payload("case-1", "device A revision"),
            ChangeOperation::Update,
        )
        .await
        .unwrap();

    let local = engine
        .store()
        .record(Collection::Cases, "case-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(local.version, 2);

    let remote = remote_version(&local, 3, "device B revision");
    let diverging = ScriptedRemote::new(vec![Ok(SyncOutcome::Diverged(remote))]);
    let (engine, _network) = rebuild_over(engine, diverging).await;

    let mut events = engine.subscribe();
    let stats = engine.orchestrator().sync_now().await.unwrap().unwrap();
    assert_eq!(stats.conflicts, 1);

    let conflicts = engine.conflicts().open_conflicts().await.unwrap();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].conflict_type, ConflictType::Concurrent);
    assert_eq!(conflicts[0].record_id, "case-1");

    let record = engine
        .store()
        .record(Collection::Cases, "case-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.sync_status, SyncStatus::Conflict);

    // The conflict was announced on the observation channel
    let mut saw_conflict = false;
    while let Ok(event) = events.try_recv() {
        if let SyncEvent::ConflictDetected {
            record_id,
            conflict_type,
        } = event
        {
            assert_eq!(record_id, "case-1");
            assert_eq!(conflict_type, ConflictType::Concurrent);
            saw_conflict = true;
        }
    }
    assert!(saw_conflict);

    // Resolving with `local` discards device B's edit and produces
    // version max(2, 3) + 1 as a fresh pending record
    let resolved = engine
        .resolve_conflict("case-1", ResolutionStrategy::Local, None)
        .await
        .unwrap();
    assert_eq!(resolved.version, 4);
    assert_eq!(resolved.sync_status, SyncStatus::Pending);
    assert_eq!(resolved.payload["notes"], json!("device A revision"));

    assert!(engine.conflicts().open_conflicts().await.unwrap().is_empty());
    assert_eq!(engine.status().await.unwrap().pending_count, 1);
}

#[tokio::test]
async fn test_merge_resolution_takes_max_version_plus_one() {
    let (engine, _network) = build_engine(true, ScriptedRemote::acknowledging()).await;

    engine
        .save(
            Collection::Cases,
            case_payload("case-1", "local"),
            ChangeOperation::Create,
        )
        .await
        .unwrap();

    let local = engine
        .store()
        .record(Collection::Cases, "case-1")
        .await
        .unwrap()
        .unwrap();
    let remote = remote_version(&local, 5, "remote");

    let diverging = ScriptedRemote::new(vec![Ok(SyncOutcome::Diverged(remote))]);
    let (engine, _network) = rebuild_over(engine, diverging).await;
    engine.orchestrator().sync_now().await.unwrap().unwrap();

    let merged = case_payload("case-1", "merged by clinician");
    let resolved = engine
        .resolve_conflict("case-1", ResolutionStrategy::Merge, Some(merged.clone()))
        .await
        .unwrap();

    assert_eq!(resolved.version, 6);
    assert_eq!(resolved.payload, merged);
    assert!(engine.conflicts().open_conflicts().await.unwrap().is_empty());

    // Merge without a payload is rejected while the conflict is open
    let diverging = ScriptedRemote::new(vec![Ok(SyncOutcome::Diverged(remote_version(
        &resolved, 9, "remote again",
    )))]);
    let (engine, _network) = rebuild_over(engine, diverging).await;
    engine.orchestrator().sync_now().await.unwrap().unwrap();

    let missing = engine
        .resolve_conflict("case-1", ResolutionStrategy::Merge, None)
        .await;
    assert!(missing.is_err());
}

#[tokio::test]
async fn test_transient_error_skips_record_and_continues_cycle() {
    // First record fails transiently, second syncs in the same cycle
    let remote = ScriptedRemote::new(vec![
        Err(TransientSyncError("connection reset".to_string())),
        Ok(SyncOutcome::Acknowledged),
    ]);
    let (engine, _network) = build_engine(true, remote).await;

    engine
        .save(
            Collection::Cases,
            case_payload("case-a", "first"),
            ChangeOperation::Create,
        )
        .await
        .unwrap();
    engine
        .save(
            Collection::Cases,
            case_payload("case-b", "second"),
            ChangeOperation::Create,
        )
        .await
        .unwrap();

    let mut events = engine.subscribe();
    let stats = engine.orchestrator().sync_now().await.unwrap().unwrap();
    assert_eq!(stats.processed, 2);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.synced, 1);

    let failed = engine
        .store()
        .record(Collection::Cases, "case-a")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(failed.sync_status, SyncStatus::Pending);

    let synced = engine
        .store()
        .record(Collection::Cases, "case-b")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(synced.sync_status, SyncStatus::Synced);

    let entries = engine.store().queue_entries().await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].record_id, "case-a");
    assert_eq!(entries[0].attempts, 1);

    // The cycle reported an error status but still completed
    let mut statuses = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let SyncEvent::StatusChanged(status) = event {
            statuses.push(status);
        }
    }
    assert_eq!(statuses, vec![CycleStatus::Syncing, CycleStatus::SyncError]);

    // The failed record syncs on the next cycle
    let stats = engine.orchestrator().sync_now().await.unwrap().unwrap();
    assert_eq!(stats.synced, 1);
    assert_eq!(engine.status().await.unwrap().pending_count, 0);
}

#[tokio::test]
async fn test_integrity_check_pinpoints_tampered_record() {
    let kv = MemoryStore::new();
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = RecordStore::new(kv.clone(), clock, StoreConfig::default());

    store
        .save(
            Collection::Cases,
            case_payload("case-1", "intact"),
            ChangeOperation::Create,
        )
        .await
        .unwrap();
    store
        .save(
            Collection::Cases,
            case_payload("case-2", "to be tampered"),
            ChangeOperation::Create,
        )
        .await
        .unwrap();

    // Mutate the payload behind the store's back
    let mut raw = kv.get("cases", "case-2").await.unwrap().unwrap();
    raw["payload"]["notes"] = json!("tampered");
    kv.put("cases", "case-2", raw).await.unwrap();

    let report = store.validate_integrity(Collection::Cases).await.unwrap();
    assert!(!report.valid);
    assert_eq!(report.errors, vec!["Checksum mismatch for record case-2"]);
}

#[tokio::test]
async fn test_versions_are_gapless_under_concurrent_saves() {
    let kv = MemoryStore::new();
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = Arc::new(RecordStore::new(kv, clock, StoreConfig::default()));

    let mut tasks = Vec::new();
    for i in 0..100 {
        let store = store.clone();
        tasks.push(tokio::spawn(async move {
            store
                .save(
                    Collection::Cases,
                    case_payload("case-1", &format!("writer {}", i)),
                    ChangeOperation::Update,
                )
                .await
                .unwrap();
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let record = store
        .record(Collection::Cases, "case-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.version, 100);

    // One change log entry per save; the sequence has no gaps or repeats
    let entries = store.change_log().entries_for("case-1").await.unwrap();
    assert_eq!(entries.len(), 100);
}

#[tokio::test]
async fn test_deleted_divergence_classified_as_deleted_conflict() {
    let (engine, _network) = build_engine(true, ScriptedRemote::acknowledging()).await;

    engine
        .save(
            Collection::Cases,
            case_payload("case-1", "doomed"),
            ChangeOperation::Create,
        )
        .await
        .unwrap();
    engine.orchestrator().sync_now().await.unwrap().unwrap();

    // Local soft delete races a remote edit
    engine.delete(Collection::Cases, "case-1").await.unwrap();

    let local = engine
        .store()
        .record(Collection::Cases, "case-1")
        .await
        .unwrap()
        .unwrap();
    assert!(local.is_deleted());

    let mut remote = remote_version(&local, local.version + 1, "remote kept editing");
    if let Value::Object(payload) = &mut remote.payload {
        payload.remove("_deleted");
    }
    remote.checksum = sync_engine::checksum(&remote.payload);

    let diverging = ScriptedRemote::new(vec![Ok(SyncOutcome::Diverged(remote))]);
    let (engine, _network) = rebuild_over(engine, diverging).await;
    engine.orchestrator().sync_now().await.unwrap().unwrap();

    let conflicts = engine.conflicts().open_conflicts().await.unwrap();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].conflict_type, ConflictType::Deleted);
}

/// Rebuild an engine over the same storage with a different remote script,
/// simulating the next session of the same device.
async fn rebuild_over(
    engine: SyncEngine,
    remote: Arc<dyn RemoteSyncClient>,
) -> (SyncEngine, Arc<SharedNetworkStatus>) {
    let kv = engine.storage().clone();
    let network = SharedNetworkStatus::new(true);
    let engine = SyncEngine::new(
        kv,
        Arc::new(SystemClock),
        network.clone(),
        remote,
        SyncEngineConfig::default(),
    )
    .await
    .unwrap();
    (engine, network)
}
