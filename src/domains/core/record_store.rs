use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::config::StoreConfig;
use crate::domains::core::cache::{CachePattern, QueryCache};
use crate::domains::core::indexer::QueryIndexer;
use crate::domains::core::persistence::{LocalPersistence, PersistedSnapshot};
use crate::domains::sync::change_log::ChangeLog;
use crate::domains::sync::types::{ChangeEntry, ChangeOperationType, MergeStats};
use crate::errors::{DomainError, DomainResult};
use crate::types::{
    compare_timestamps, next_timestamp, now_timestamp, Filters, Record, RecordExt, TableName,
    FIELD_CREATED_AT, FIELD_ID, FIELD_UPDATED_AT,
};

#[derive(Debug, Default)]
struct StoreState {
    tables: HashMap<TableName, Vec<Record>>,
    change_log: ChangeLog,
}

impl StoreState {
    fn table(&self, table: TableName) -> &[Record] {
        self.tables.get(&table).map(Vec::as_slice).unwrap_or(&[])
    }

    fn position(&self, table: TableName, id: &str) -> Option<usize> {
        self.table(table).iter().position(|r| r.id() == Some(id))
    }
}

/// State to restore when persisting a mutation fails.
struct Checkpoint {
    table: Option<(TableName, Vec<Record>)>,
    change_log: ChangeLog,
}

/// Result of [`LocalStore::delete`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteOutcome {
    pub success: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableStats {
    pub table: TableName,
    pub records: usize,
    pub unsynced: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub tables: Vec<TableStats>,
    pub pending_changes: usize,
    pub cache_entries: usize,
}

/// The local, durable table store. Every write is persisted and clears the
/// table's cached queries and indexes before it returns.
pub struct LocalStore {
    state: Mutex<StoreState>,
    cache: Arc<QueryCache>,
    indexer: QueryIndexer,
    persistence: Arc<dyn LocalPersistence>,
    device_id: String,
    config: StoreConfig,
}

impl LocalStore {
    /// Load the last persisted snapshot (if any) and build the store.
    ///
    /// Device identity comes from `device_id`, then the snapshot, then a new
    /// random id.
    pub async fn open(
        persistence: Arc<dyn LocalPersistence>,
        device_id: Option<String>,
        config: StoreConfig,
    ) -> DomainResult<Self> {
        let snapshot = persistence.load().await?;

        let mut state = StoreState::default();
        let mut persisted_device = None;
        if let Some(snapshot) = snapshot {
            for (name, records) in snapshot.tables {
                match name.parse::<TableName>() {
                    Ok(table) => {
                        state.tables.insert(table, records);
                    }
                    Err(_) => log::warn!("Ignoring unknown persisted table '{}'", name),
                }
            }
            state.change_log = snapshot.change_log;
            persisted_device = Some(snapshot.device_id);
        }

        let device_id = device_id
            .or(persisted_device)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        log::info!(
            "Local store opened for device {} ({} records, {} pending changes)",
            device_id,
            state.tables.values().map(Vec::len).sum::<usize>(),
            state.change_log.len()
        );

        Ok(Self {
            state: Mutex::new(state),
            cache: Arc::new(QueryCache::new(config.cache_capacity, config.cache_ttl)),
            indexer: QueryIndexer::new(),
            persistence,
            device_id,
            config,
        })
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn cache(&self) -> Arc<QueryCache> {
        Arc::clone(&self.cache)
    }

    pub async fn get(&self, table: TableName, id: &str) -> Option<Record> {
        let state = self.state.lock().await;
        state.table(table).iter().find(|r| r.id() == Some(id)).cloned()
    }

    /// Records matching every filter, in insertion order. Served from the
    /// query cache when possible.
    pub async fn list(&self, table: TableName, filters: &Filters) -> Vec<Record> {
        let key = cache_key(table, filters);
        if let Some(hit) = self.cache.get(&key) {
            log::debug!("Cache hit for {}", key);
            return hit;
        }

        let state = self.state.lock().await;
        let records = state.table(table);
        let result = if filters.is_empty() {
            records.to_vec()
        } else {
            self.filter_records(table, records, filters)
        };
        // Still under the state lock, so no write can slip in between.
        self.cache.set(&key, &result, None);
        result
    }

    fn filter_records(&self, table: TableName, records: &[Record], filters: &Filters) -> Vec<Record> {
        let indexed = filters
            .iter()
            .find(|(field, _)| self.config.is_indexed(table, field));

        if let Some((field, value)) = indexed {
            if !self.indexer.has_index(table, field) {
                self.indexer.create_index(table, field, records);
            }
            if let Some(candidates) = self.indexer.query_by_index(table, field, value) {
                return candidates.into_iter().filter(|r| r.matches(filters)).collect();
            }
        }

        records.iter().filter(|r| r.matches(filters)).cloned().collect()
    }

    pub async fn create(&self, table: TableName, data: Record) -> DomainResult<Record> {
        let mut state = self.state.lock().await;

        let mut record = data;
        let id = match record.id() {
            Some(id) if !id.trim().is_empty() => id.to_string(),
            _ => Uuid::new_v4().to_string(),
        };
        if state.position(table, &id).is_some() {
            return Err(DomainError::DuplicateId(table.to_string(), id));
        }

        let now = now_timestamp();
        record.insert(FIELD_ID.to_string(), id.clone().into());
        if record.str_field(FIELD_CREATED_AT).is_none() {
            record.insert(FIELD_CREATED_AT.to_string(), now.clone().into());
        }
        record.insert(FIELD_UPDATED_AT.to_string(), now.clone().into());
        record.set_synced(false);

        let checkpoint = checkpoint(&state, Some(table));
        state.tables.entry(table).or_default().push(record.clone());
        let entry = self.change_entry(ChangeOperationType::Create, table, &id, &record, now);
        state.change_log.record(entry);

        self.commit(&mut state, checkpoint, table).await?;
        log::debug!("Created {} {}", table, id);
        Ok(record)
    }

    pub async fn update(&self, table: TableName, id: &str, partial: Record) -> DomainResult<Record> {
        let mut state = self.state.lock().await;
        let position = state
            .position(table, id)
            .ok_or_else(|| DomainError::EntityNotFound(table.to_string(), id.to_string()))?;

        let checkpoint = checkpoint(&state, Some(table));
        let records = state.tables.entry(table).or_default();
        let existing = &mut records[position];

        for (field, value) in partial {
            if field == FIELD_ID || field == FIELD_CREATED_AT {
                continue;
            }
            existing.insert(field, value);
        }
        let now = next_timestamp(existing.updated_at());
        existing.insert(FIELD_UPDATED_AT.to_string(), now.clone().into());
        existing.set_synced(false);
        let record = existing.clone();

        let entry = self.change_entry(ChangeOperationType::Update, table, id, &record, now);
        state.change_log.record(entry);

        self.commit(&mut state, checkpoint, table).await?;
        log::debug!("Updated {} {}", table, id);
        Ok(record)
    }

    /// Remove a record. Deleting a missing id succeeds without logging a change.
    pub async fn delete(&self, table: TableName, id: &str) -> DomainResult<DeleteOutcome> {
        let mut state = self.state.lock().await;
        let Some(position) = state.position(table, id) else {
            return Ok(DeleteOutcome { success: true });
        };

        let checkpoint = checkpoint(&state, Some(table));
        let removed = state.tables.entry(table).or_default().remove(position);
        let entry = self.change_entry(ChangeOperationType::Delete, table, id, &removed, now_timestamp());
        state.change_log.record(entry);

        self.commit(&mut state, checkpoint, table).await?;
        log::debug!("Deleted {} {}", table, id);
        Ok(DeleteOutcome { success: true })
    }

    /// All records of a table, bypassing the query cache.
    pub async fn records(&self, table: TableName) -> Vec<Record> {
        self.state.lock().await.table(table).to_vec()
    }

    pub async fn pending_deletes(&self, table: TableName) -> Vec<ChangeEntry> {
        self.state.lock().await.change_log.pending_deletes(table)
    }

    pub async fn pending_change_count(&self) -> usize {
        self.state.lock().await.change_log.len()
    }

    pub async fn change_entries(&self) -> Vec<ChangeEntry> {
        self.state.lock().await.change_log.entries().to_vec()
    }

    /// Mark pushed records as confirmed by the remote.
    ///
    /// `confirmed` pairs an id with the `updated_at` that was pushed. A record
    /// edited again since then stays unsynced and keeps its newer entries.
    pub async fn mark_synced(&self, table: TableName, confirmed: &[(String, Option<String>)]) -> DomainResult<usize> {
        if confirmed.is_empty() {
            return Ok(0);
        }
        let mut state = self.state.lock().await;
        let checkpoint = checkpoint(&state, Some(table));
        let mut marked = 0;

        for (id, pushed_at) in confirmed {
            state.change_log.drain_confirmed(table, id, pushed_at.as_deref());
            let still_pending = state.change_log.has_pending(table, id);
            if let Some(position) = state.position(table, id) {
                let record = &mut state.tables.entry(table).or_default()[position];
                if record.updated_at() == pushed_at.as_deref() && !still_pending {
                    record.set_synced(true);
                    marked += 1;
                }
            }
        }

        self.commit(&mut state, checkpoint, table).await?;
        Ok(marked)
    }

    /// Drain delete entries (and anything else pending for those ids) once
    /// the remote deletions succeeded.
    pub async fn confirm_deletes(&self, table: TableName, ids: &[String]) -> DomainResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let mut state = self.state.lock().await;
        let checkpoint = checkpoint(&state, None);
        for id in ids {
            if state.position(table, id).is_none() {
                state.change_log.drain_confirmed(table, id, None);
            } else {
                state.change_log.drain_delete(table, id);
            }
        }
        self.commit(&mut state, checkpoint, table).await
    }

    /// Merge remote records with last-write-wins on `updated_at`. Remote
    /// replaces local only when strictly newer; ties keep the local copy.
    pub async fn merge_remote(&self, table: TableName, remote: Vec<Record>) -> DomainResult<MergeStats> {
        let mut state = self.state.lock().await;
        let checkpoint = checkpoint(&state, Some(table));
        let mut stats = MergeStats::default();

        for mut incoming in remote {
            let Some(id) = incoming.id().map(str::to_string) else {
                log::warn!("Skipping remote {} record without id", table);
                continue;
            };
            incoming.set_synced(true);

            match state.position(table, &id) {
                None => {
                    let locally_deleted = state
                        .change_log
                        .pending_for(table)
                        .any(|e| e.id.as_deref() == Some(id.as_str()) && e.operation_type == ChangeOperationType::Delete);
                    if locally_deleted {
                        stats.kept_local += 1;
                        continue;
                    }
                    state.tables.entry(table).or_default().push(incoming);
                    stats.inserted += 1;
                }
                Some(position) => {
                    let local = &state.table(table)[position];
                    if !remote_is_newer(local, &incoming) {
                        stats.kept_local += 1;
                        continue;
                    }
                    if !local.is_synced() {
                        log::info!(
                            "Remote {} {} ({}) overwrites unsynced local edit ({})",
                            table,
                            id,
                            incoming.updated_at().unwrap_or("?"),
                            local.updated_at().unwrap_or("?")
                        );
                    }
                    state.tables.entry(table).or_default()[position] = incoming;
                    state.change_log.drain_confirmed(table, &id, None);
                    stats.updated += 1;
                }
            }
        }

        if stats.applied() > 0 {
            self.commit(&mut state, checkpoint, table).await?;
        }
        Ok(stats)
    }

    /// Drop every table and the change log.
    pub async fn clear_all(&self) -> DomainResult<()> {
        let mut state = self.state.lock().await;
        let previous_tables = std::mem::take(&mut state.tables);
        let previous_log = std::mem::take(&mut state.change_log);

        if let Err(e) = self.persist(&state).await {
            state.tables = previous_tables;
            state.change_log = previous_log;
            return Err(e);
        }
        self.cache.clear();
        self.indexer.clear();
        log::info!("Local store cleared");
        Ok(())
    }

    pub async fn stats(&self) -> StoreStats {
        let state = self.state.lock().await;
        let tables = TableName::ALL
            .iter()
            .map(|table| {
                let records = state.table(*table);
                TableStats {
                    table: *table,
                    records: records.len(),
                    unsynced: records.iter().filter(|r| !r.is_synced()).count(),
                }
            })
            .collect();
        StoreStats {
            tables,
            pending_changes: state.change_log.len(),
            cache_entries: self.cache.len(),
        }
    }

    fn change_entry(
        &self,
        operation_type: ChangeOperationType,
        table: TableName,
        id: &str,
        data: &Record,
        timestamp: String,
    ) -> ChangeEntry {
        ChangeEntry {
            operation_type,
            table,
            id: Some(id.to_string()),
            data: data.clone(),
            timestamp,
            device_id: self.device_id.clone(),
        }
    }

    /// Persist the mutated state, rolling back on failure, then drop the
    /// table's derived state.
    async fn commit(
        &self,
        state: &mut MutexGuard<'_, StoreState>,
        checkpoint: Checkpoint,
        table: TableName,
    ) -> DomainResult<()> {
        if let Err(e) = self.persist(state).await {
            log::error!("Failed to persist {} change, rolling back: {}", table, e);
            if let Some((table, records)) = checkpoint.table {
                state.tables.insert(table, records);
            }
            state.change_log = checkpoint.change_log;
            return Err(e);
        }
        self.invalidate(table);
        Ok(())
    }

    async fn persist(&self, state: &StoreState) -> DomainResult<()> {
        let tables: BTreeMap<String, Vec<Record>> = state
            .tables
            .iter()
            .map(|(table, records)| (table.to_string(), records.clone()))
            .collect();
        let snapshot = PersistedSnapshot::new(self.device_id.clone(), tables, state.change_log.clone());
        self.persistence.save(&snapshot).await?;
        Ok(())
    }

    fn invalidate(&self, table: TableName) {
        let removed = self.cache.invalidate(&CachePattern::table(table.as_str()));
        self.indexer.invalidate_index(table, None);
        if removed > 0 {
            log::debug!("Invalidated {} cached {} queries", removed, table);
        }
    }
}

fn checkpoint(state: &StoreState, table: Option<TableName>) -> Checkpoint {
    Checkpoint {
        table: table.map(|t| (t, state.table(t).to_vec())),
        change_log: state.change_log.clone(),
    }
}

fn cache_key(table: TableName, filters: &Filters) -> String {
    let serialized = serde_json::to_string(filters).unwrap_or_default();
    format!("{}:{}", table, serialized)
}

fn remote_is_newer(local: &Record, remote: &Record) -> bool {
    match (local.updated_at(), remote.updated_at()) {
        (_, None) => false,
        (None, Some(_)) => true,
        (Some(local), Some(remote)) => compare_timestamps(remote, local) == Ordering::Greater,
    }
}
