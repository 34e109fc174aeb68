use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tokio::sync::Mutex;

use crate::domains::sync::change_log::ChangeLog;
use crate::errors::DbResult;
use crate::types::Record;

/// Key of the single blob row holding the whole local database.
pub const LOCAL_STORE_KEY: &str = "spa_pos_db";

const SNAPSHOT_VERSION: u32 = 1;

/// Everything the store needs to survive a restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedSnapshot {
    pub version: u32,
    pub device_id: String,
    pub tables: BTreeMap<String, Vec<Record>>,
    pub change_log: ChangeLog,
    pub saved_at: String,
}

impl PersistedSnapshot {
    pub fn new(device_id: String, tables: BTreeMap<String, Vec<Record>>, change_log: ChangeLog) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            device_id,
            tables,
            change_log,
            saved_at: crate::types::now_timestamp(),
        }
    }
}

/// Durable keyed blob storage for the local database.
#[async_trait]
pub trait LocalPersistence: Send + Sync {
    /// Read the last saved snapshot, if any.
    async fn load(&self) -> DbResult<Option<PersistedSnapshot>>;

    /// Overwrite the saved snapshot.
    async fn save(&self, snapshot: &PersistedSnapshot) -> DbResult<()>;
}

/// Snapshot stored as one JSON row in SQLite.
pub struct SqlitePersistence {
    pool: SqlitePool,
    key: String,
}

impl SqlitePersistence {
    /// Run migrations and return a persistence bound to `pool`.
    pub async fn new(pool: SqlitePool) -> DbResult<Self> {
        crate::db_migration::initialize_database(&pool).await?;
        Ok(Self {
            pool,
            key: LOCAL_STORE_KEY.to_string(),
        })
    }
}

#[async_trait]
impl LocalPersistence for SqlitePersistence {
    async fn load(&self) -> DbResult<Option<PersistedSnapshot>> {
        let raw: Option<String> = sqlx::query_scalar("SELECT value FROM local_store WHERE key = ?")
            .bind(&self.key)
            .fetch_optional(&self.pool)
            .await?;

        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, snapshot: &PersistedSnapshot) -> DbResult<()> {
        let raw = serde_json::to_string(snapshot)?;
        sqlx::query(
            r#"
            INSERT INTO local_store (key, value, updated_at) VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(&self.key)
        .bind(raw)
        .bind(&snapshot.saved_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// Keeps the serialized snapshot in memory. Used when no database URL is
/// configured, and by tests.
#[derive(Default)]
pub struct MemoryPersistence {
    raw: Mutex<Option<String>>,
    saves: AtomicUsize,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful saves so far.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LocalPersistence for MemoryPersistence {
    async fn load(&self) -> DbResult<Option<PersistedSnapshot>> {
        let raw = self.raw.lock().await;
        match raw.as_deref() {
            Some(raw) => Ok(Some(serde_json::from_str(raw)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, snapshot: &PersistedSnapshot) -> DbResult<()> {
        let serialized = serde_json::to_string(snapshot)?;
        *self.raw.lock().await = Some(serialized);
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::sync::types::{ChangeEntry, ChangeOperationType};
    use crate::types::TableName;
    use serde_json::json;
    use sqlx::sqlite::SqlitePoolOptions;

    fn snapshot() -> PersistedSnapshot {
        let booking = json!({"id": "b1", "customer_name": "Jane", "is_synced": 0})
            .as_object()
            .cloned()
            .unwrap();
        let mut log = ChangeLog::new();
        log.record(ChangeEntry {
            operation_type: ChangeOperationType::Create,
            table: TableName::Bookings,
            id: Some("b1".into()),
            data: booking.clone(),
            timestamp: "2024-05-01T10:00:00.000Z".into(),
            device_id: "device-a".into(),
        });
        let mut tables = BTreeMap::new();
        tables.insert("bookings".to_string(), vec![booking]);
        PersistedSnapshot::new("device-a".into(), tables, log)
    }

    #[tokio::test]
    async fn test_memory_persistence_round_trip() {
        let persistence = MemoryPersistence::new();
        assert!(persistence.load().await.unwrap().is_none());

        let saved = snapshot();
        persistence.save(&saved).await.unwrap();
        assert_eq!(persistence.load().await.unwrap(), Some(saved));
        assert_eq!(persistence.save_count(), 1);
    }

    #[tokio::test]
    async fn test_sqlite_persistence_overwrites_single_row() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let persistence = SqlitePersistence::new(pool.clone()).await.unwrap();
        assert!(persistence.load().await.unwrap().is_none());

        let mut saved = snapshot();
        persistence.save(&saved).await.unwrap();
        saved.device_id = "device-b".into();
        persistence.save(&saved).await.unwrap();

        let loaded = persistence.load().await.unwrap().unwrap();
        assert_eq!(loaded.device_id, "device-b");
        assert_eq!(loaded.change_log.len(), 1);

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM local_store")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[tokio::test]
    async fn test_store_survives_restart_on_disk() {
        use crate::config::StoreConfig;
        use crate::domains::core::record_store::LocalStore;
        use sqlx::sqlite::SqliteConnectOptions;
        use std::sync::Arc;

        let dir = tempfile::tempdir().unwrap();
        let options = SqliteConnectOptions::new()
            .filename(dir.path().join("pos.db"))
            .create_if_missing(true);

        let created_id = {
            let pool = SqlitePoolOptions::new().connect_with(options.clone()).await.unwrap();
            let persistence = Arc::new(SqlitePersistence::new(pool.clone()).await.unwrap());
            let store = LocalStore::open(persistence, Some("till-1".into()), StoreConfig::default())
                .await
                .unwrap();
            let data = json!({"name": "Espresso", "price": 2.5}).as_object().cloned().unwrap();
            let created = store.create(TableName::MenuItems, data).await.unwrap();
            pool.close().await;
            created["id"].as_str().unwrap().to_string()
        };

        let pool = SqlitePoolOptions::new().connect_with(options).await.unwrap();
        let persistence = Arc::new(SqlitePersistence::new(pool).await.unwrap());
        let store = LocalStore::open(persistence, None, StoreConfig::default()).await.unwrap();

        assert_eq!(store.device_id(), "till-1");
        let reloaded = store.get(TableName::MenuItems, &created_id).await.unwrap();
        assert_eq!(reloaded["name"], "Espresso");
        assert_eq!(store.pending_change_count().await, 1);
    }
}
