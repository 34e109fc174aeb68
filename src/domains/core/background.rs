use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::domains::core::cache::QueryCache;

/// A periodic job running on the tokio runtime until stopped.
pub struct BackgroundTask {
    name: &'static str,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl BackgroundTask {
    /// Run `job` every `period`, starting one period from now. A tick that
    /// fires while the previous job is still running is skipped.
    pub fn spawn<F, Fut>(name: &'static str, period: Duration, job: F) -> Self
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            log::info!("Starting background task '{}' every {:?}", name, period);
            let mut interval = time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately.
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = interval.tick() => job().await,
                    _ = &mut shutdown_rx => {
                        log::info!("Received shutdown signal, stopping background task '{}'", name);
                        break;
                    }
                }
            }
        });

        Self {
            name,
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().map(|h| !h.is_finished()).unwrap_or(false)
    }

    /// Signal the loop to exit and wait for the job in flight to finish.
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                log::error!("Background task '{}' ended abnormally: {}", self.name, e);
            }
        }
    }
}

impl Drop for BackgroundTask {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// Periodically drop expired query cache entries.
pub fn spawn_cache_sweeper(cache: Arc<QueryCache>, period: Duration) -> BackgroundTask {
    BackgroundTask::spawn("cache_sweeper", period, move || {
        let cache = Arc::clone(&cache);
        async move {
            let removed = cache.sweep_expired();
            if removed > 0 {
                log::debug!("Swept {} expired cache entries", removed);
            }
        }
    })
}
