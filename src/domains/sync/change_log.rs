use serde::{Deserialize, Serialize};

use crate::domains::sync::types::{ChangeEntry, ChangeOperationType};
use crate::types::{compare_timestamps, TableName};

/// Append-only FIFO of pending local mutations. Entries leave the log only
/// when the Sync Engine drains them after the remote confirmed the change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeLog {
    entries: Vec<ChangeEntry>,
}

impl ChangeLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, entry: ChangeEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[ChangeEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pending entries of one table in append order.
    pub fn pending_for(&self, table: TableName) -> impl Iterator<Item = &ChangeEntry> {
        self.entries.iter().filter(move |e| e.table == table)
    }

    /// Pending delete entries of one table.
    pub fn pending_deletes(&self, table: TableName) -> Vec<ChangeEntry> {
        self.pending_for(table)
            .filter(|e| e.operation_type == ChangeOperationType::Delete)
            .cloned()
            .collect()
    }

    pub fn has_pending(&self, table: TableName, id: &str) -> bool {
        self.pending_for(table).any(|e| e.id.as_deref() == Some(id))
    }

    /// Drain entries for `id` that are not newer than `up_to`. An entry
    /// appended after the confirmed state stays pending.
    pub fn drain_confirmed(&mut self, table: TableName, id: &str, up_to: Option<&str>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| {
            let same_record = e.table == table && e.id.as_deref() == Some(id);
            let confirmed = match up_to {
                Some(limit) => compare_timestamps(&e.timestamp, limit) != std::cmp::Ordering::Greater,
                None => true,
            };
            !(same_record && confirmed)
        });
        before - self.entries.len()
    }

    /// Drop one specific delete entry once the remote deletion succeeded.
    pub fn drain_delete(&mut self, table: TableName, id: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| {
            !(e.table == table
                && e.id.as_deref() == Some(id)
                && e.operation_type == ChangeOperationType::Delete)
        });
        before - self.entries.len()
    }
}
