use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use crate::types::TableName;

const DEFAULT_CACHE_CAPACITY: usize = 100;
const DEFAULT_CACHE_TTL_SECS: u64 = 300;
const DEFAULT_CACHE_SWEEP_SECS: u64 = 60;
const DEFAULT_UPSERT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_UPSERT_BACKOFF_MS: u64 = 250;
const DEFAULT_REMOTE_TIMEOUT_SECS: u64 = 30;

/// Record Store, cache and index settings.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub cache_capacity: usize,
    pub cache_ttl: Duration,
    pub cache_sweep_interval: Duration,
    /// Fields that get a hash index the first time they are filtered on.
    pub indexed_fields: HashMap<TableName, Vec<String>>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            cache_sweep_interval: Duration::from_secs(DEFAULT_CACHE_SWEEP_SECS),
            indexed_fields: default_indexed_fields(),
        }
    }
}

impl StoreConfig {
    pub fn is_indexed(&self, table: TableName, field: &str) -> bool {
        self.indexed_fields
            .get(&table)
            .map(|fields| fields.iter().any(|f| f == field))
            .unwrap_or(false)
    }
}

fn default_indexed_fields() -> HashMap<TableName, Vec<String>> {
    let entries: &[(TableName, &[&str])] = &[
        (TableName::Bookings, &["booking_date", "customer_name", "status"]),
        (TableName::Transactions, &["transaction_date", "customer_name"]),
        (TableName::TransactionItems, &["transaction_id"]),
        (TableName::MenuItems, &["category"]),
        (TableName::SpaServices, &["category"]),
        (TableName::Inventory, &["category"]),
        (TableName::Customers, &["email", "phone"]),
        (TableName::Feedback, &["status"]),
        (TableName::Staff, &["role"]),
    ];
    entries
        .iter()
        .map(|(table, fields)| (*table, fields.iter().map(|f| f.to_string()).collect()))
        .collect()
}

/// Sync Engine settings.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Attempts per remote upsert call, including the first.
    pub upsert_max_attempts: u32,
    /// Linear backoff step between attempts (attempt * step).
    pub upsert_backoff: Duration,
    /// Period of the automatic bidirectional sync; `None` disables it.
    pub auto_sync_interval: Option<Duration>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            upsert_max_attempts: DEFAULT_UPSERT_MAX_ATTEMPTS,
            upsert_backoff: Duration::from_millis(DEFAULT_UPSERT_BACKOFF_MS),
            auto_sync_interval: None,
        }
    }
}

/// Remote REST store connection settings.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout: Duration,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            timeout: Duration::from_secs(DEFAULT_REMOTE_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    /// SQLite URL of the durable store; `None` keeps state in memory only.
    pub db_url: Option<String>,
    pub device_id: Option<String>,
    pub store: StoreConfig,
    pub sync: SyncConfig,
    pub remote: RemoteConfig,
}

impl AppConfig {
    /// Build the configuration from `SPA_*` environment variables, loading a
    /// `.env` file first when one exists.
    pub fn from_env() -> Self {
        if let Err(e) = dotenv::dotenv() {
            log::debug!("No .env file loaded: {}", e);
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let parsed = |key: &str, default| parse_or(key, non_empty(key), default);

        let auto_sync_secs: u64 = parsed("SPA_AUTO_SYNC_SECS", 0);

        Self {
            db_url: non_empty("SPA_DB_URL"),
            device_id: non_empty("SPA_DEVICE_ID"),
            store: StoreConfig {
                cache_capacity: parse_or("SPA_CACHE_CAPACITY", non_empty("SPA_CACHE_CAPACITY"), DEFAULT_CACHE_CAPACITY),
                cache_ttl: Duration::from_secs(parsed("SPA_CACHE_TTL_SECS", DEFAULT_CACHE_TTL_SECS)),
                cache_sweep_interval: Duration::from_secs(parsed("SPA_CACHE_SWEEP_SECS", DEFAULT_CACHE_SWEEP_SECS)),
                indexed_fields: default_indexed_fields(),
            },
            sync: SyncConfig {
                upsert_max_attempts: parse_or(
                    "SPA_UPSERT_MAX_ATTEMPTS",
                    non_empty("SPA_UPSERT_MAX_ATTEMPTS"),
                    DEFAULT_UPSERT_MAX_ATTEMPTS,
                )
                .max(1),
                upsert_backoff: Duration::from_millis(parsed("SPA_UPSERT_BACKOFF_MS", DEFAULT_UPSERT_BACKOFF_MS)),
                auto_sync_interval: (auto_sync_secs > 0).then(|| Duration::from_secs(auto_sync_secs)),
            },
            remote: RemoteConfig {
                base_url: non_empty("SPA_REMOTE_URL").unwrap_or_default(),
                api_key: non_empty("SPA_REMOTE_API_KEY").unwrap_or_default(),
                timeout: Duration::from_secs(parsed("SPA_REMOTE_TIMEOUT_SECS", DEFAULT_REMOTE_TIMEOUT_SECS)),
            },
        }
    }
}

fn parse_or<T: FromStr>(key: &str, raw: Option<String>, default: T) -> T {
    match raw {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            log::warn!("Ignoring invalid value '{}' for {}, using default", raw, key);
            default
        }),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_environment() {
        let config = AppConfig::from_lookup(|_| None);
        assert!(config.db_url.is_none());
        assert_eq!(config.store.cache_capacity, 100);
        assert_eq!(config.store.cache_ttl, Duration::from_secs(300));
        assert_eq!(config.sync.upsert_max_attempts, 3);
        assert!(config.sync.auto_sync_interval.is_none());
        assert!(config.store.is_indexed(TableName::MenuItems, "category"));
        assert!(!config.store.is_indexed(TableName::MenuItems, "name"));
    }

    #[test]
    fn test_values_read_and_invalid_numbers_fall_back() {
        let config = AppConfig::from_lookup(|key| match key {
            "SPA_DB_URL" => Some("sqlite://pos.db?mode=rwc".to_string()),
            "SPA_CACHE_CAPACITY" => Some("lots".to_string()),
            "SPA_AUTO_SYNC_SECS" => Some("120".to_string()),
            "SPA_UPSERT_MAX_ATTEMPTS" => Some("0".to_string()),
            _ => None,
        });
        assert_eq!(config.db_url.as_deref(), Some("sqlite://pos.db?mode=rwc"));
        assert_eq!(config.store.cache_capacity, 100);
        assert_eq!(config.sync.auto_sync_interval, Some(Duration::from_secs(120)));
        assert_eq!(config.sync.upsert_max_attempts, 1);
    }
}
