use std::sync::Arc;
use std::time::Duration;

use crate::domains::core::background::BackgroundTask;
use crate::domains::sync::service::SyncService;
use crate::errors::SyncError;

/// Run a bidirectional sync every `period`. Runs that find another sync in
/// flight, or no signed-in user, are skipped quietly.
pub fn spawn_auto_sync(engine: Arc<dyn SyncService>, period: Duration) -> BackgroundTask {
    BackgroundTask::spawn("auto_sync", period, move || {
        let engine = Arc::clone(&engine);
        async move {
            match engine.sync_bidirectional().await {
                Ok(outcome) => log::debug!("Auto-sync synced {} record(s)", outcome.count),
                Err(SyncError::SyncInProgress) => log::debug!("Auto-sync skipped, a sync is already running"),
                Err(SyncError::AuthRequired) => log::debug!("Auto-sync skipped, no signed-in user"),
                Err(e) => log::warn!("Auto-sync failed: {}", e),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::sync::types::{SyncOutcome, SyncPhase, SyncStatus};
    use crate::errors::SyncResult;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingSync {
        runs: AtomicUsize,
    }

    #[async_trait]
    impl SyncService for CountingSync {
        async fn push_local_changes(&self) -> SyncResult<SyncOutcome> {
            Err(SyncError::Other("unused".into()))
        }

        async fn pull_remote_changes(&self) -> SyncResult<SyncOutcome> {
            Err(SyncError::Other("unused".into()))
        }

        async fn sync_bidirectional(&self) -> SyncResult<SyncOutcome> {
            // Every other run collides with a manual sync.
            if self.runs.fetch_add(1, Ordering::SeqCst) % 2 == 1 {
                return Err(SyncError::SyncInProgress);
            }
            Ok(SyncOutcome::from_reports(Utc::now(), Vec::new(), 0))
        }

        async fn reset_and_resync(&self) -> SyncResult<SyncOutcome> {
            Err(SyncError::Other("unused".into()))
        }

        async fn status(&self) -> SyncStatus {
            SyncStatus {
                phase: SyncPhase::Idle,
                pending_changes: 0,
                last_outcome: None,
            }
        }
    }

    #[tokio::test]
    async fn test_auto_sync_keeps_running_after_skipped_runs() {
        let engine = Arc::new(CountingSync::default());
        let task = spawn_auto_sync(engine.clone(), Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(65)).await;
        task.stop().await;
        assert!(engine.runs.load(Ordering::SeqCst) >= 3);
    }
}
