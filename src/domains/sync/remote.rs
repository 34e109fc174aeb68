use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::RwLock;

use crate::config::RemoteConfig;
use crate::errors::{SyncError, SyncResult};
use crate::types::{Record, TableName};

/// The signed-in remote user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Operations the Sync Engine needs from the cloud store.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// The authenticated user, or `None` when no session exists.
    async fn current_user(&self) -> SyncResult<Option<RemoteUser>>;

    /// Insert or replace records by `id`. Replaying the same batch must not
    /// create duplicates.
    async fn upsert(&self, table: TableName, records: &[Record]) -> SyncResult<()>;

    /// Every record of a table, most recently updated first.
    async fn select_all(&self, table: TableName) -> SyncResult<Vec<Record>>;

    /// Delete one record by id. Deleting a missing id succeeds.
    async fn delete(&self, table: TableName, id: &str) -> SyncResult<()>;
}

/// PostgREST-style HTTP implementation.
pub struct RestRemoteStore {
    client: Client,
    base_url: String,
    api_key: String,
    access_token: RwLock<Option<String>>,
}

impl RestRemoteStore {
    pub fn new(config: &RemoteConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.timeout.min(std::time::Duration::from_secs(10)))
            .build()
            .unwrap_or_else(|e| {
                warn!("Failed to build HTTP client ({}), falling back to defaults without timeouts", e);
                Client::new()
            });

        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            access_token: RwLock::new(None),
        }
    }

    /// Store the bearer token of a signed-in user.
    pub fn set_session(&self, access_token: &str) {
        if let Ok(mut token) = self.access_token.write() {
            *token = Some(access_token.to_string());
        }
    }

    pub fn clear_session(&self) {
        if let Ok(mut token) = self.access_token.write() {
            *token = None;
        }
    }

    fn token(&self) -> Option<String> {
        self.access_token.read().ok().and_then(|t| t.clone())
    }

    fn table_url(&self, table: TableName) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn upsert_request(&self, table: TableName, records: &[Record]) -> RequestBuilder {
        self.client
            .post(self.table_url(table))
            .query(&[("on_conflict", "id".to_string()), ("columns", upsert_columns(records))])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(records)
    }

    fn delete_request(&self, table: TableName, id: &str) -> RequestBuilder {
        self.client
            .delete(self.table_url(table))
            .query(&[("id", format!("eq.{}", id))])
    }

    fn authorized(&self, request: RequestBuilder) -> SyncResult<RequestBuilder> {
        let token = self.token().ok_or(SyncError::AuthRequired)?;
        Ok(request
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", token)))
    }

    async fn send(&self, request: RequestBuilder, context: &str) -> SyncResult<Response> {
        request.send().await.map_err(|e| {
            if e.is_timeout() {
                SyncError::Timeout
            } else {
                SyncError::Network(format!("Failed to {}: {}", context, e))
            }
        })
    }
}

/// Union of the keys of `records`, in first-seen order. Sent as `columns` so
/// a bulk upsert accepts objects with different key sets.
fn upsert_columns(records: &[Record]) -> String {
    let mut columns: Vec<&str> = Vec::new();
    for key in records.iter().flat_map(|r| r.keys()) {
        if !columns.contains(&key.as_str()) {
            columns.push(key);
        }
    }
    columns.join(",")
}

/// Map a non-success response to the sync error taxonomy.
async fn error_for_status(response: Response, table: TableName, id: &str) -> SyncError {
    let status = response.status();
    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unable to get error details".to_string());

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SyncError::AuthenticationFailed(error_text),
        StatusCode::BAD_REQUEST | StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
            SyncError::RemoteRejected {
                table: table.to_string(),
                id: id.to_string(),
                message: format!("{}: {}", status, error_text),
            }
        }
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => SyncError::Timeout,
        s if s.is_server_error() || s == StatusCode::TOO_MANY_REQUESTS => {
            SyncError::ServerError(format!("Server returned error {}: {}", status, error_text))
        }
        _ => SyncError::Other(format!("Server returned error {}: {}", status, error_text)),
    }
}

#[async_trait]
impl RemoteStore for RestRemoteStore {
    async fn current_user(&self) -> SyncResult<Option<RemoteUser>> {
        let Some(token) = self.token() else {
            return Ok(None);
        };
        if self.base_url.is_empty() {
            warn!("Remote URL not configured; treating session as signed out");
            return Ok(None);
        }

        let request = self
            .client
            .get(format!("{}/auth/v1/user", self.base_url))
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", token));
        let response = self.send(request, "fetch current user").await?;

        match response.status() {
            s if s.is_success() => {
                let user = response
                    .json::<RemoteUser>()
                    .await
                    .map_err(|e| SyncError::Other(format!("Failed to parse user response: {}", e)))?;
                Ok(Some(user))
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(None),
            s if s.is_server_error() => Err(SyncError::ServerError(format!("User lookup failed with status {}", s))),
            s => Err(SyncError::Other(format!("User lookup failed with status {}", s))),
        }
    }

    async fn upsert(&self, table: TableName, records: &[Record]) -> SyncResult<()> {
        if records.is_empty() {
            return Ok(());
        }
        debug!("Upserting {} {} record(s)", records.len(), table);

        let request = self.upsert_request(table, records);
        let response = self.send(self.authorized(request)?, "upsert records").await?;

        if response.status().is_success() {
            Ok(())
        } else {
            let id = match records {
                [single] => single.get("id").and_then(|v| v.as_str()).unwrap_or_default(),
                _ => "<batch>",
            };
            Err(error_for_status(response, table, id).await)
        }
    }

    async fn select_all(&self, table: TableName) -> SyncResult<Vec<Record>> {
        debug!("Fetching all {} records", table);
        let request = self
            .client
            .get(self.table_url(table))
            .query(&[("select", "*"), ("order", "updated_at.desc")]);
        let response = self.send(self.authorized(request)?, "fetch records").await?;

        if response.status().is_success() {
            response
                .json::<Vec<Record>>()
                .await
                .map_err(|e| SyncError::Other(format!("Failed to parse {} records: {}", table, e)))
        } else {
            Err(error_for_status(response, table, "").await)
        }
    }

    async fn delete(&self, table: TableName, id: &str) -> SyncResult<()> {
        debug!("Deleting remote {} {}", table, id);
        let request = self.delete_request(table, id);
        let response = self.send(self.authorized(request)?, "delete record").await?;

        if response.status().is_success() || response.status() == StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(error_for_status(response, table, id).await)
        }
    }
}

/// In-memory remote for tests.
#[cfg(test)]
pub struct MockRemoteStore {
    authenticated: std::sync::atomic::AtomicBool,
    storage: std::sync::Mutex<std::collections::HashMap<TableName, Vec<Record>>>,
    reject_ids: std::sync::Mutex<std::collections::HashSet<String>>,
    transient_failures: std::sync::atomic::AtomicUsize,
    calls: std::sync::atomic::AtomicUsize,
    gate: std::sync::Mutex<Option<std::sync::Arc<MockGate>>>,
}

/// Lets a test hold a `select_all` call open.
#[cfg(test)]
#[derive(Default)]
pub struct MockGate {
    pub entered: tokio::sync::Notify,
    pub release: tokio::sync::Notify,
}

#[cfg(test)]
impl MockRemoteStore {
    pub fn new() -> Self {
        Self {
            authenticated: std::sync::atomic::AtomicBool::new(true),
            storage: Default::default(),
            reject_ids: Default::default(),
            transient_failures: Default::default(),
            calls: Default::default(),
            gate: Default::default(),
        }
    }

    pub fn set_authenticated(&self, authenticated: bool) {
        self.authenticated.store(authenticated, std::sync::atomic::Ordering::SeqCst);
    }

    /// Any upsert touching `id` is rejected as invalid.
    pub fn reject(&self, id: &str) {
        self.reject_ids.lock().unwrap().insert(id.to_string());
    }

    /// The next `count` upserts fail with a network error.
    pub fn fail_next_upserts(&self, count: usize) {
        self.transient_failures.store(count, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn install_gate(&self) -> std::sync::Arc<MockGate> {
        let gate = std::sync::Arc::new(MockGate::default());
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }

    pub fn rows(&self, table: TableName) -> Vec<Record> {
        self.storage.lock().unwrap().get(&table).cloned().unwrap_or_default()
    }

    pub fn seed(&self, table: TableName, records: Vec<Record>) {
        self.storage.lock().unwrap().entry(table).or_default().extend(records);
    }

    fn count_call(&self) {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }

    fn ensure_authenticated(&self) -> SyncResult<()> {
        if self.authenticated.load(std::sync::atomic::Ordering::SeqCst) {
            Ok(())
        } else {
            Err(SyncError::AuthenticationFailed("no session".into()))
        }
    }
}

#[cfg(test)]
#[async_trait]
impl RemoteStore for MockRemoteStore {
    async fn current_user(&self) -> SyncResult<Option<RemoteUser>> {
        self.count_call();
        Ok(self
            .authenticated
            .load(std::sync::atomic::Ordering::SeqCst)
            .then(|| RemoteUser {
                id: "user-1".into(),
                email: Some("owner@spa.test".into()),
            }))
    }

    async fn upsert(&self, table: TableName, records: &[Record]) -> SyncResult<()> {
        use crate::types::RecordExt;
        use std::sync::atomic::Ordering;

        self.count_call();
        self.ensure_authenticated()?;

        let remaining = self.transient_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.transient_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(SyncError::Network("connection reset".into()));
        }

        {
            let rejected = self.reject_ids.lock().unwrap();
            if let Some(bad) = records.iter().filter_map(|r| r.id()).find(|id| rejected.contains(*id)) {
                return Err(SyncError::RemoteRejected {
                    table: table.to_string(),
                    id: bad.to_string(),
                    message: "violates check constraint".into(),
                });
            }
        }

        let mut storage = self.storage.lock().unwrap();
        let rows = storage.entry(table).or_default();
        for record in records {
            match rows.iter_mut().find(|r| r.id() == record.id()) {
                Some(existing) => *existing = record.clone(),
                None => rows.push(record.clone()),
            }
        }
        Ok(())
    }

    async fn select_all(&self, table: TableName) -> SyncResult<Vec<Record>> {
        use crate::types::{compare_timestamps, RecordExt};

        self.count_call();
        self.ensure_authenticated()?;

        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }

        let mut rows = self.rows(table);
        rows.sort_by(|a, b| match (a.updated_at(), b.updated_at()) {
            (Some(x), Some(y)) => compare_timestamps(y, x),
            _ => std::cmp::Ordering::Equal,
        });
        Ok(rows)
    }

    async fn delete(&self, table: TableName, id: &str) -> SyncResult<()> {
        use crate::types::RecordExt;

        self.count_call();
        self.ensure_authenticated()?;
        if let Some(rows) = self.storage.lock().unwrap().get_mut(&table) {
            rows.retain(|r| r.id() != Some(id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: &str, name: &str) -> Record {
        json!({"id": id, "name": name}).as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_rest_store_without_session_reports_no_user() {
        let store = RestRemoteStore::new(&RemoteConfig {
            base_url: "http://127.0.0.1:9".into(),
            ..RemoteConfig::default()
        });
        assert_eq!(store.current_user().await.unwrap(), None);

        let err = store.select_all(TableName::Staff).await.unwrap_err();
        assert!(matches!(err, SyncError::AuthRequired));
    }

    #[test]
    fn test_upsert_sends_union_of_columns() {
        let store = RestRemoteStore::new(&RemoteConfig {
            base_url: "http://localhost:54321/".into(),
            ..RemoteConfig::default()
        });
        let plain = json!({"id": "b1", "customer_name": "Ann"}).as_object().cloned().unwrap();
        let with_notes = json!({"id": "b2", "customer_name": "Bo", "notes": "window seat"})
            .as_object()
            .cloned()
            .unwrap();

        let request = store
            .upsert_request(TableName::Bookings, &[plain, with_notes])
            .build()
            .unwrap();
        let pairs: Vec<(String, String)> = request.url().query_pairs().into_owned().collect();

        assert_eq!(request.url().path(), "/rest/v1/bookings");
        assert!(pairs.contains(&("on_conflict".into(), "id".into())));
        let columns = pairs
            .iter()
            .find(|(k, _)| k == "columns")
            .map(|(_, v)| v.split(',').map(str::to_string).collect::<Vec<_>>())
            .unwrap();
        assert_eq!(columns.len(), 3);
        for column in ["id", "customer_name", "notes"] {
            assert!(columns.iter().any(|c| c == column), "missing column {}", column);
        }
    }

    #[test]
    fn test_delete_filter_escapes_id() {
        let store = RestRemoteStore::new(&RemoteConfig {
            base_url: "http://localhost:54321".into(),
            ..RemoteConfig::default()
        });
        let request = store
            .delete_request(TableName::Customers, "a&b=c")
            .build()
            .unwrap();

        assert!(request.url().query().unwrap().contains("id=eq.a%26b%3Dc"));
        let pairs: Vec<(String, String)> = request.url().query_pairs().into_owned().collect();
        assert_eq!(pairs, vec![("id".to_string(), "eq.a&b=c".to_string())]);
    }

    #[tokio::test]
    async fn test_rest_store_session_toggles() {
        let store = RestRemoteStore::new(&RemoteConfig::default());
        store.set_session("token-1");
        assert_eq!(store.token().as_deref(), Some("token-1"));
        store.clear_session();
        assert!(store.token().is_none());
    }

    #[tokio::test]
    async fn test_mock_upsert_replaces_by_id() {
        let remote = MockRemoteStore::new();
        remote.upsert(TableName::Staff, &[record("s1", "A")]).await.unwrap();
        remote.upsert(TableName::Staff, &[record("s1", "B"), record("s2", "C")]).await.unwrap();

        let rows = remote.rows(TableName::Staff);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["name"], json!("B"));
    }

    #[tokio::test]
    async fn test_mock_rejects_whole_batch_containing_bad_id() {
        let remote = MockRemoteStore::new();
        remote.reject("bad");
        let err = remote
            .upsert(TableName::Staff, &[record("good", "A"), record("bad", "B")])
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::RemoteRejected { ref id, .. } if id == "bad"));
        assert!(remote.rows(TableName::Staff).is_empty());
    }
}
