use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use lazy_static::lazy_static;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use crate::config::AppConfig;
use crate::domains::core::background::{spawn_cache_sweeper, BackgroundTask};
use crate::domains::core::persistence::{LocalPersistence, MemoryPersistence, SqlitePersistence};
use crate::domains::core::record_store::LocalStore;
use crate::domains::sync::remote::RestRemoteStore;
use crate::domains::sync::scheduler::spawn_auto_sync;
use crate::domains::sync::service::{SyncEngine, SyncService};
use crate::ffi::error::{FFIError, FFIResult};
use crate::validation::Validator;

// Global state definitions
lazy_static! {
    static ref INIT_MUTEX: tokio::sync::Mutex<()> = tokio::sync::Mutex::new(());
    static ref INITIALIZED: AtomicBool = AtomicBool::new(false);

    static ref STORE: Mutex<Option<Arc<LocalStore>>> = Mutex::new(None);
    static ref REMOTE: Mutex<Option<Arc<RestRemoteStore>>> = Mutex::new(None);
    static ref SYNC_ENGINE: Mutex<Option<Arc<SyncEngine>>> = Mutex::new(None);

    static ref BACKGROUND_TASKS: tokio::sync::Mutex<Vec<BackgroundTask>> = tokio::sync::Mutex::new(Vec::new());
}

// --- Getter Functions ---

pub fn get_store() -> FFIResult<Arc<LocalStore>> {
    STORE
        .lock()
        .map_err(|_| FFIError::internal("STORE lock poisoned".to_string()))?
        .clone()
        .ok_or_else(|| FFIError::not_initialized("Record store"))
}

pub fn get_remote() -> FFIResult<Arc<RestRemoteStore>> {
    REMOTE
        .lock()
        .map_err(|_| FFIError::internal("REMOTE lock poisoned".to_string()))?
        .clone()
        .ok_or_else(|| FFIError::not_initialized("Remote store"))
}

pub fn get_sync_engine() -> FFIResult<Arc<SyncEngine>> {
    SYNC_ENGINE
        .lock()
        .map_err(|_| FFIError::internal("SYNC_ENGINE lock poisoned".to_string()))?
        .clone()
        .ok_or_else(|| FFIError::not_initialized("Sync engine"))
}

pub fn get_device_id() -> FFIResult<String> {
    Ok(get_store()?.device_id().to_string())
}

pub fn is_initialized() -> bool {
    INITIALIZED.load(Ordering::Acquire)
}

// --- Initialization ---

/// Build the store, remote client and sync engine and start background work.
/// Repeated calls after a successful one are no-ops.
pub async fn initialize(config: AppConfig) -> FFIResult<()> {
    let _guard = INIT_MUTEX.lock().await;

    if INITIALIZED.load(Ordering::Acquire) {
        log::debug!("Library already initialized");
        return Ok(());
    }

    initialize_internal(config).await?;
    INITIALIZED.store(true, Ordering::Release);
    Ok(())
}

async fn initialize_internal(config: AppConfig) -> FFIResult<()> {
    log::info!("Starting internal initialization");

    let validator = Validator::new()?;
    let persistence = open_persistence(config.db_url.as_deref()).await?;

    let store = Arc::new(LocalStore::open(persistence, config.device_id.clone(), config.store.clone()).await?);
    log::info!("Record store opened for device {}", store.device_id());

    let remote = Arc::new(RestRemoteStore::new(&config.remote));
    let engine = Arc::new(SyncEngine::new(store.clone(), remote.clone(), validator, config.sync.clone()));

    let mut tasks = BACKGROUND_TASKS.lock().await;
    tasks.push(spawn_cache_sweeper(store.cache(), config.store.cache_sweep_interval));
    if let Some(period) = config.sync.auto_sync_interval {
        let service: Arc<dyn SyncService> = engine.clone();
        tasks.push(spawn_auto_sync(service, period));
    }
    log::debug!("Started {} background task(s)", tasks.len());

    *STORE.lock().map_err(|_| FFIError::internal("STORE lock poisoned".to_string()))? = Some(store);
    *REMOTE.lock().map_err(|_| FFIError::internal("REMOTE lock poisoned".to_string()))? = Some(remote);
    *SYNC_ENGINE.lock().map_err(|_| FFIError::internal("SYNC_ENGINE lock poisoned".to_string()))? = Some(engine);

    log::info!("Initialization complete");
    Ok(())
}

async fn open_persistence(db_url: Option<&str>) -> FFIResult<Arc<dyn LocalPersistence>> {
    let Some(db_url) = db_url else {
        log::warn!("No database URL configured, local data will not survive a restart");
        return Ok(Arc::new(MemoryPersistence::new()));
    };

    log::debug!("Database URL: {}", db_url);
    let options = SqliteConnectOptions::from_str(db_url)
        .map_err(|e| FFIError::invalid_argument(&format!("Invalid database URL: {}", e)))?
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .map_err(|e| FFIError::internal(format!("Database connection failed: {}", e)))?;

    Ok(Arc::new(SqlitePersistence::new(pool).await?))
}

/// Stop background tasks and drop every global handle.
pub async fn shutdown() {
    let _guard = INIT_MUTEX.lock().await;

    let tasks: Vec<BackgroundTask> = BACKGROUND_TASKS.lock().await.drain(..).collect();
    for task in tasks {
        log::debug!("Stopping background task {}", task.name());
        task.stop().await;
    }

    if let Ok(mut engine) = SYNC_ENGINE.lock() {
        *engine = None;
    }
    if let Ok(mut remote) = REMOTE.lock() {
        *remote = None;
    }
    if let Ok(mut store) = STORE.lock() {
        *store = None;
    }

    INITIALIZED.store(false, Ordering::Release);
    log::info!("Library shut down");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RecordExt, TableName};
    use serde_json::json;

    #[tokio::test]
    async fn test_initialize_and_shutdown_in_memory() {
        let config = AppConfig {
            device_id: Some("test-device".to_string()),
            ..AppConfig::default()
        };

        initialize(config.clone()).await.unwrap();
        initialize(config).await.unwrap();
        assert!(is_initialized());
        assert_eq!(get_device_id().unwrap(), "test-device");

        let store = get_store().unwrap();
        let data = json!({ "name": "Walk-in" }).as_object().cloned().unwrap();
        let created = store.create(TableName::Customers, data).await.unwrap();
        assert!(created.id().is_some());
        assert!(get_sync_engine().is_ok());

        shutdown().await;
        assert!(!is_initialized());
        assert!(get_store().is_err());
    }
}
