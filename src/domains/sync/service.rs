use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use log::{debug, error, info, warn};

use crate::config::SyncConfig;
use crate::domains::core::record_store::LocalStore;
use crate::domains::sync::dedup::deduplicate;
use crate::domains::sync::remote::RemoteStore;
use crate::domains::sync::seed::sample_records;
use crate::domains::sync::types::{SyncOutcome, SyncPhase, SyncStatus, TableSyncReport};
use crate::errors::{SyncError, SyncResult};
use crate::types::{Record, RecordExt, TableName};
use crate::validation::Validator;

/// High-level trait for the synchronisation service.
#[async_trait]
pub trait SyncService: Send + Sync {
    /// Upload every local table to the remote store.
    async fn push_local_changes(&self) -> SyncResult<SyncOutcome>;

    /// Merge every remote table into the local store.
    async fn pull_remote_changes(&self) -> SyncResult<SyncOutcome>;

    /// Push then pull, as one sync run.
    async fn sync_bidirectional(&self) -> SyncResult<SyncOutcome>;

    /// Drop all local data and rebuild it from the remote store.
    async fn reset_and_resync(&self) -> SyncResult<SyncOutcome>;

    async fn status(&self) -> SyncStatus;
}

/// Sync Engine between the local store and the remote store.
///
/// Only one run (push, pull, bidirectional or reset) may be active at a
/// time; a second caller gets [`SyncError::SyncInProgress`] immediately.
pub struct SyncEngine {
    store: Arc<LocalStore>,
    remote: Arc<dyn RemoteStore>,
    validator: Validator,
    config: SyncConfig,
    in_progress: AtomicBool,
    phase: Mutex<SyncPhase>,
    last_outcome: Mutex<Option<SyncOutcome>>,
}

/// Clears the in-progress flag when a run ends, however it ends.
struct RunGuard<'a> {
    engine: &'a SyncEngine,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.engine.set_phase(SyncPhase::Idle);
        self.engine.in_progress.store(false, Ordering::SeqCst);
    }
}

impl SyncEngine {
    pub fn new(
        store: Arc<LocalStore>,
        remote: Arc<dyn RemoteStore>,
        validator: Validator,
        config: SyncConfig,
    ) -> Self {
        Self {
            store,
            remote,
            validator,
            config,
            in_progress: AtomicBool::new(false),
            phase: Mutex::new(SyncPhase::Idle),
            last_outcome: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &Arc<LocalStore> {
        &self.store
    }

    fn begin(&self) -> SyncResult<RunGuard<'_>> {
        self.in_progress
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| SyncError::SyncInProgress)?;
        Ok(RunGuard { engine: self })
    }

    fn set_phase(&self, phase: SyncPhase) {
        if let Ok(mut current) = self.phase.lock() {
            *current = phase;
        }
    }

    fn current_phase(&self) -> SyncPhase {
        self.phase.lock().map(|p| *p).unwrap_or(SyncPhase::Idle)
    }

    fn finish(&self, outcome: SyncOutcome) -> SyncOutcome {
        if let Ok(mut last) = self.last_outcome.lock() {
            *last = Some(outcome.clone());
        }
        match &outcome.error {
            Some(err) => warn!("Sync finished: {} record(s) synced, errors: {}", outcome.count, err),
            None => info!("Sync finished: {} record(s) synced", outcome.count),
        }
        outcome
    }

    async fn ensure_authenticated(&self) -> SyncResult<()> {
        match self.remote.current_user().await? {
            Some(user) => {
                debug!("Syncing as user {}", user.id);
                Ok(())
            }
            None => Err(SyncError::AuthRequired),
        }
    }

    async fn push_all(&self) -> SyncOutcome {
        let started_at = Utc::now();
        let mut reports = Vec::with_capacity(TableName::ALL.len());
        let mut duplicates = 0;

        for table in TableName::ALL {
            match self.push_table(table).await {
                Ok((report, skipped)) => {
                    duplicates += skipped;
                    reports.push(report);
                }
                Err(e) => {
                    error!("Push of {} failed: {}", table, e);
                    reports.push(TableSyncReport::failed_table(table, e.to_string()));
                }
            }
        }
        SyncOutcome::from_reports(started_at, reports, duplicates)
    }

    /// Push one table. Per-record failures are reported, not returned.
    async fn push_table(&self, table: TableName) -> SyncResult<(TableSyncReport, usize)> {
        let mut report = TableSyncReport::new(table);
        self.push_deletes(table, &mut report).await?;

        let records = self.store.records(table).await;
        if records.is_empty() {
            return Ok((report, 0));
        }

        let cleaned: Vec<Record> = records
            .iter()
            .map(|r| self.validator.clean(r, table).record)
            .collect();
        let batch = deduplicate(table, cleaned);
        report.attempted += batch.records.len();

        let confirmed: Vec<(String, Option<String>)> = match self.upsert_with_retry(table, &batch.records).await {
            Ok(()) => batch.records.iter().filter_map(confirmation).collect(),
            Err(e @ SyncError::AuthenticationFailed(_)) => return Err(e),
            Err(e) => {
                warn!(
                    "Batch upsert of {} {} record(s) failed ({}), retrying record by record",
                    batch.records.len(),
                    table,
                    e
                );
                self.push_one_by_one(table, &batch.records, &mut report).await
            }
        };

        report.synced += confirmed.len();
        self.store.mark_synced(table, &confirmed).await?;
        debug!("Pushed {}/{} {} record(s)", report.synced, report.attempted, table);
        Ok((report, batch.skipped))
    }

    async fn push_deletes(&self, table: TableName, report: &mut TableSyncReport) -> SyncResult<()> {
        let mut ids: Vec<String> = Vec::new();
        for entry in self.store.pending_deletes(table).await {
            if let Some(id) = entry.id {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }
        if ids.is_empty() {
            return Ok(());
        }

        let mut deleted = Vec::with_capacity(ids.len());
        for id in ids {
            report.attempted += 1;
            match self.remote.delete(table, &id).await {
                Ok(()) => deleted.push(id),
                Err(e @ SyncError::AuthenticationFailed(_)) => return Err(e),
                Err(e) => {
                    warn!("Remote delete of {} {} failed: {}", table, id, e);
                    report.failed += 1;
                    report.failed_ids.push(id);
                }
            }
        }

        report.synced += deleted.len();
        self.store.confirm_deletes(table, &deleted).await?;
        Ok(())
    }

    async fn push_one_by_one(
        &self,
        table: TableName,
        records: &[Record],
        report: &mut TableSyncReport,
    ) -> Vec<(String, Option<String>)> {
        let mut confirmed = Vec::new();
        for record in records {
            match self.upsert_with_retry(table, std::slice::from_ref(record)).await {
                Ok(()) => confirmed.extend(confirmation(record)),
                Err(e) => {
                    let id = record.id().unwrap_or_default().to_string();
                    error!("Failed to push {} {}: {}", table, id, e);
                    report.failed += 1;
                    report.failed_ids.push(id);
                }
            }
        }
        confirmed
    }

    /// One upsert call with bounded retry of transient failures.
    async fn upsert_with_retry(&self, table: TableName, records: &[Record]) -> SyncResult<()> {
        let max_attempts = self.config.upsert_max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.remote.upsert(table, records).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    let delay = self.config.upsert_backoff * attempt;
                    warn!(
                        "Upsert of {} failed (attempt {}/{}): {}; retrying in {:?}",
                        table, attempt, max_attempts, e, delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn pull_all(&self) -> (SyncOutcome, usize) {
        let started_at = Utc::now();
        let mut reports = Vec::with_capacity(TableName::ALL.len());
        let mut remote_rows = 0;

        for table in TableName::ALL {
            match self.pull_table(table).await {
                Ok(report) => {
                    remote_rows += report.attempted;
                    reports.push(report);
                }
                Err(e) => {
                    error!("Pull of {} failed: {}", table, e);
                    reports.push(TableSyncReport::failed_table(table, e.to_string()));
                }
            }
        }
        (SyncOutcome::from_reports(started_at, reports, 0), remote_rows)
    }

    async fn pull_table(&self, table: TableName) -> SyncResult<TableSyncReport> {
        let remote = self.remote.select_all(table).await?;
        let mut report = TableSyncReport::new(table);
        report.attempted = remote.len();

        let stats = self.store.merge_remote(table, remote).await?;
        report.synced = stats.applied();
        debug!(
            "Pulled {}: {} inserted, {} updated, {} kept local",
            table, stats.inserted, stats.updated, stats.kept_local
        );
        Ok(report)
    }

    async fn seed_sample_data(&self) -> SyncResult<usize> {
        let mut seeded = 0;
        for (table, rows) in sample_records() {
            for row in rows {
                self.store.create(table, row).await?;
                seeded += 1;
            }
        }
        info!("Remote store is empty, seeded {} sample record(s)", seeded);
        Ok(seeded)
    }
}

/// The id and pushed `updated_at` the remote now holds for `record`.
fn confirmation(record: &Record) -> Option<(String, Option<String>)> {
    record
        .id()
        .map(|id| (id.to_string(), record.updated_at().map(str::to_string)))
}

#[async_trait]
impl SyncService for SyncEngine {
    async fn push_local_changes(&self) -> SyncResult<SyncOutcome> {
        let _guard = self.begin()?;
        self.ensure_authenticated().await?;

        self.set_phase(SyncPhase::Pushing);
        let outcome = self.push_all().await;
        Ok(self.finish(outcome))
    }

    async fn pull_remote_changes(&self) -> SyncResult<SyncOutcome> {
        let _guard = self.begin()?;
        self.ensure_authenticated().await?;

        self.set_phase(SyncPhase::Pulling);
        let (outcome, _) = self.pull_all().await;
        Ok(self.finish(outcome))
    }

    async fn sync_bidirectional(&self) -> SyncResult<SyncOutcome> {
        let _guard = self.begin()?;
        self.ensure_authenticated().await?;

        self.set_phase(SyncPhase::Pushing);
        let push = self.push_all().await;
        self.set_phase(SyncPhase::Pulling);
        let (pull, _) = self.pull_all().await;
        Ok(self.finish(SyncOutcome::merge(push, pull)))
    }

    async fn reset_and_resync(&self) -> SyncResult<SyncOutcome> {
        let _guard = self.begin()?;
        self.ensure_authenticated().await?;

        self.set_phase(SyncPhase::ResettingLocal);
        self.store.clear_all().await?;

        self.set_phase(SyncPhase::PullingAll);
        let (outcome, remote_rows) = self.pull_all().await;
        if remote_rows == 0 && outcome.error.is_none() {
            self.seed_sample_data().await?;
        }
        Ok(self.finish(outcome))
    }

    async fn status(&self) -> SyncStatus {
        SyncStatus {
            phase: self.current_phase(),
            pending_changes: self.store.pending_change_count().await,
            last_outcome: self.last_outcome.lock().ok().and_then(|o| o.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::domains::core::persistence::MemoryPersistence;
    use crate::domains::sync::remote::MockRemoteStore;
    use serde_json::{json, Value};
    use std::time::Duration;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    async fn setup() -> (Arc<SyncEngine>, Arc<LocalStore>, Arc<MockRemoteStore>) {
        let store = Arc::new(
            LocalStore::open(Arc::new(MemoryPersistence::new()), Some("device-a".into()), StoreConfig::default())
                .await
                .unwrap(),
        );
        let remote = Arc::new(MockRemoteStore::new());
        let config = SyncConfig {
            upsert_max_attempts: 3,
            upsert_backoff: Duration::from_millis(1),
            auto_sync_interval: None,
        };
        let engine = Arc::new(SyncEngine::new(
            store.clone(),
            remote.clone(),
            Validator::new().unwrap(),
            config,
        ));
        (engine, store, remote)
    }

    async fn pause() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    #[tokio::test]
    async fn test_push_is_idempotent_and_marks_records_synced() {
        let (engine, store, remote) = setup().await;
        store.create(TableName::Staff, record(json!({"id": "s1", "name": "Rudo", "role": "therapist"}))).await.unwrap();
        store.create(TableName::Staff, record(json!({"id": "s2", "name": "Tendai", "role": "chef"}))).await.unwrap();

        let first = engine.push_local_changes().await.unwrap();
        assert!(first.success);
        assert_eq!(first.count, 2);
        let second = engine.push_local_changes().await.unwrap();
        assert_eq!(second.count, 2);

        let rows = remote.rows(TableName::Staff);
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.get("is_synced").is_none()));
        assert!(store.records(TableName::Staff).await.iter().all(|r| r.is_synced()));
        assert_eq!(store.pending_change_count().await, 0);
    }

    #[tokio::test]
    async fn test_push_after_local_edit_updates_the_same_remote_row() {
        let (engine, store, remote) = setup().await;
        store.create(TableName::Staff, record(json!({"id": "s1", "name": "Rudo", "role": "therapist"}))).await.unwrap();
        engine.push_local_changes().await.unwrap();

        let edited = store
            .update(TableName::Staff, "s1", record(json!({"name": "Rudo M.", "role": "manager"})))
            .await
            .unwrap();
        assert!(!edited.is_synced());
        let outcome = engine.push_local_changes().await.unwrap();
        assert!(outcome.success);

        let rows = remote.rows(TableName::Staff);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], "s1");
        assert_eq!(rows[0]["name"], "Rudo M.");
        assert_eq!(rows[0]["role"], "manager");
        assert_eq!(rows[0]["updated_at"], edited["updated_at"]);

        let local = store.get(TableName::Staff, "s1").await.unwrap();
        assert!(local.is_synced());
        assert_eq!(store.pending_change_count().await, 0);
    }

    #[tokio::test]
    async fn test_pull_applies_strictly_newer_remote_versions() {
        let (engine, store, remote) = setup().await;
        store
            .merge_remote(
                TableName::Customers,
                vec![
                    record(json!({"id": "c1", "name": "Old", "updated_at": "2024-01-01T10:00:00Z"})),
                    record(json!({"id": "c2", "name": "Local", "updated_at": "2024-01-03T10:00:00Z"})),
                ],
            )
            .await
            .unwrap();
        remote.seed(
            TableName::Customers,
            vec![
                record(json!({"id": "c1", "name": "New", "updated_at": "2024-01-02T10:00:00Z"})),
                record(json!({"id": "c2", "name": "Stale", "updated_at": "2024-01-02T10:00:00Z"})),
            ],
        );

        let outcome = engine.pull_remote_changes().await.unwrap();
        assert_eq!(outcome.count, 1);

        let c1 = store.get(TableName::Customers, "c1").await.unwrap();
        assert_eq!(c1["name"], json!("New"));
        assert_eq!(c1.updated_at(), Some("2024-01-02T10:00:00Z"));
        assert!(c1.is_synced());
        assert_eq!(store.get(TableName::Customers, "c2").await.unwrap()["name"], json!("Local"));
    }

    #[tokio::test]
    async fn test_push_collapses_business_key_duplicates() {
        let (engine, store, remote) = setup().await;
        store
            .create(TableName::Customers, record(json!({"id": "c1", "name": "Jane", "email": "jane@x.com"})))
            .await
            .unwrap();
        pause().await;
        store
            .create(TableName::Customers, record(json!({"id": "c2", "name": "Jane D", "email": "JANE@x.com"})))
            .await
            .unwrap();

        let outcome = engine.push_local_changes().await.unwrap();
        assert_eq!(outcome.duplicates_skipped, 1);

        let rows = remote.rows(TableName::Customers);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id(), Some("c2"));
    }

    #[tokio::test]
    async fn test_push_sends_normalized_records() {
        let (engine, store, remote) = setup().await;
        store
            .create(
                TableName::Bookings,
                record(json!({
                    "id": "b1",
                    "customer_name": "Jane",
                    "booking_date": "2024-06-01",
                    "booking_time": "10:00",
                    "booking_type": "Spa Treatment",
                    "price": "abc",
                    "_offline": true
                })),
            )
            .await
            .unwrap();

        engine.push_local_changes().await.unwrap();
        let rows = remote.rows(TableName::Bookings);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["booking_type"], json!("spa"));
        assert_eq!(rows[0]["price"], json!(0));
        assert_eq!(rows[0]["status"], json!("pending"));
        assert!(rows[0].get("_offline").is_none());
    }

    #[tokio::test]
    async fn test_rejected_record_is_isolated() {
        let (engine, store, remote) = setup().await;
        for id in ["s1", "s2", "s3"] {
            store
                .create(TableName::Staff, record(json!({"id": id, "name": id, "role": "waiter"})))
                .await
                .unwrap();
        }
        remote.reject("s2");

        let outcome = engine.push_local_changes().await.unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.count, 2);
        assert!(outcome.error.is_some());
        let staff = outcome.tables.iter().find(|t| t.table == TableName::Staff).unwrap();
        assert_eq!(staff.failed_ids, vec!["s2".to_string()]);

        assert_eq!(remote.rows(TableName::Staff).len(), 2);
        assert!(!store.get(TableName::Staff, "s2").await.unwrap().is_synced());
        assert!(store.get(TableName::Staff, "s3").await.unwrap().is_synced());
    }

    #[tokio::test]
    async fn test_transient_upsert_failures_are_retried() {
        let (engine, store, remote) = setup().await;
        store.create(TableName::Staff, record(json!({"id": "s1", "name": "A", "role": "chef"}))).await.unwrap();
        remote.fail_next_upserts(2);

        let outcome = engine.push_local_changes().await.unwrap();
        assert_eq!(outcome.count, 1);
        assert!(outcome.error.is_none());
        assert_eq!(remote.rows(TableName::Staff).len(), 1);
    }

    #[tokio::test]
    async fn test_sync_without_session_fails_before_any_work() {
        let (engine, store, remote) = setup().await;
        store.create(TableName::Staff, record(json!({"id": "s1", "name": "A", "role": "chef"}))).await.unwrap();
        remote.set_authenticated(false);

        let err = engine.push_local_changes().await.unwrap_err();
        assert!(matches!(err, SyncError::AuthRequired));
        assert_eq!(remote.call_count(), 1);
        assert!(remote.rows(TableName::Staff).is_empty());
        assert_eq!(store.pending_change_count().await, 1);
        assert_eq!(engine.status().await.phase, SyncPhase::Idle);
    }

    #[tokio::test]
    async fn test_second_sync_is_rejected_while_reset_runs() {
        let (engine, _store, remote) = setup().await;
        let gate = remote.install_gate();

        let running = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.reset_and_resync().await })
        };
        gate.entered.notified().await;
        assert_eq!(engine.status().await.phase, SyncPhase::PullingAll);

        let calls_before = remote.call_count();
        let err = engine.push_local_changes().await.unwrap_err();
        assert!(matches!(err, SyncError::SyncInProgress));
        assert_eq!(remote.call_count(), calls_before);

        gate.release.notify_one();
        running.await.unwrap().unwrap();
        assert!(engine.push_local_changes().await.is_ok());
    }

    #[tokio::test]
    async fn test_reset_seeds_sample_data_when_remote_is_empty() {
        let (engine, store, _remote) = setup().await;
        store.create(TableName::Staff, record(json!({"id": "local-only", "name": "X", "role": "chef"}))).await.unwrap();

        let outcome = engine.reset_and_resync().await.unwrap();
        assert!(outcome.success);
        assert!(store.get(TableName::Staff, "local-only").await.is_none());
        assert!(!store.records(TableName::SpaServices).await.is_empty());
        assert!(!store.records(TableName::BusinessSettings).await.is_empty());
        assert!(store.pending_change_count().await > 0);
    }

    #[tokio::test]
    async fn test_reset_mirrors_remote_without_seeding() {
        let (engine, store, remote) = setup().await;
        store.create(TableName::Staff, record(json!({"id": "local-only", "name": "X", "role": "chef"}))).await.unwrap();
        remote.seed(
            TableName::MenuItems,
            vec![record(json!({"id": "m1", "name": "Tea", "category": "drinks", "price": 3, "updated_at": "2024-01-01T00:00:00Z"}))],
        );

        let outcome = engine.reset_and_resync().await.unwrap();
        assert_eq!(outcome.count, 1);
        assert!(store.records(TableName::Staff).await.is_empty());
        assert!(store.records(TableName::SpaServices).await.is_empty());
        assert!(store.get(TableName::MenuItems, "m1").await.unwrap().is_synced());
        assert_eq!(store.pending_change_count().await, 0);
    }

    #[tokio::test]
    async fn test_local_deletes_propagate_to_remote() {
        let (engine, store, remote) = setup().await;
        store.create(TableName::Feedback, record(json!({"id": "f1", "rating": 5}))).await.unwrap();
        engine.push_local_changes().await.unwrap();
        assert_eq!(remote.rows(TableName::Feedback).len(), 1);

        store.delete(TableName::Feedback, "f1").await.unwrap();
        let outcome = engine.push_local_changes().await.unwrap();
        assert_eq!(outcome.count, 1);
        assert!(remote.rows(TableName::Feedback).is_empty());
        assert_eq!(store.pending_change_count().await, 0);
    }

    #[tokio::test]
    async fn test_bidirectional_sync_keeps_local_creations() {
        let (engine, store, remote) = setup().await;
        store.create(TableName::Staff, record(json!({"id": "local", "name": "L", "role": "chef"}))).await.unwrap();
        remote.seed(
            TableName::Staff,
            vec![record(json!({"id": "remote", "name": "R", "role": "waiter", "updated_at": "2024-01-01T00:00:00Z"}))],
        );

        let outcome = engine.sync_bidirectional().await.unwrap();
        assert!(outcome.success);
        assert!(store.get(TableName::Staff, "local").await.unwrap().is_synced());
        assert!(store.get(TableName::Staff, "remote").await.unwrap().is_synced());
        assert_eq!(remote.rows(TableName::Staff).len(), 2);

        let status = engine.status().await;
        assert_eq!(status.phase, SyncPhase::Idle);
        assert_eq!(status.pending_changes, 0);
        assert!(status.last_outcome.is_some());
    }
}
