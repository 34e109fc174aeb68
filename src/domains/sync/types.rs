use crate::errors::{DomainError, ValidationError};
use crate::types::{Record, TableName};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// The type of change operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOperationType {
    Create,
    Update,
    Delete,
}

impl ChangeOperationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeOperationType::Create => "create",
            ChangeOperationType::Update => "update",
            ChangeOperationType::Delete => "delete",
        }
    }
}

impl FromStr for ChangeOperationType {
    type Err = DomainError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(ChangeOperationType::Create),
            "update" => Ok(ChangeOperationType::Update),
            "delete" => Ok(ChangeOperationType::Delete),
            _ => Err(DomainError::Validation(ValidationError::custom(
                &format!("Invalid ChangeOperationType string: {}", s)
            ))),
        }
    }
}

impl From<ChangeOperationType> for String {
    fn from(op_type: ChangeOperationType) -> Self {
        op_type.as_str().to_string()
    }
}

/// One local mutation, appended to the change log and never edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEntry {
    #[serde(rename = "type")]
    pub operation_type: ChangeOperationType,
    pub table: TableName,
    pub id: Option<String>,
    /// Record after the change; for deletes, the last known snapshot.
    pub data: Record,
    pub timestamp: String,
    pub device_id: String,
}

/// Phase of the sync state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    Idle,
    Pushing,
    Pulling,
    ResettingLocal,
    PullingAll,
}

/// What happened to one table during a sync run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSyncReport {
    pub table: TableName,
    pub attempted: usize,
    pub synced: usize,
    pub failed: usize,
    pub failed_ids: Vec<String>,
    pub error: Option<String>,
}

impl TableSyncReport {
    pub fn new(table: TableName) -> Self {
        Self {
            table,
            attempted: 0,
            synced: 0,
            failed: 0,
            failed_ids: Vec::new(),
            error: None,
        }
    }

    pub fn failed_table(table: TableName, error: String) -> Self {
        Self {
            error: Some(error),
            ..Self::new(table)
        }
    }
}

/// Result of a push, pull, bidirectional sync or reset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncOutcome {
    /// False only when nothing synced and something failed.
    pub success: bool,
    /// Records synchronized, counted even under partial failure.
    pub count: usize,
    pub error: Option<String>,
    pub tables: Vec<TableSyncReport>,
    pub duplicates_skipped: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl SyncOutcome {
    pub fn from_reports(
        started_at: DateTime<Utc>,
        tables: Vec<TableSyncReport>,
        duplicates_skipped: usize,
    ) -> Self {
        let count = tables.iter().map(|t| t.synced).sum();
        let failures: Vec<String> = tables
            .iter()
            .filter_map(|t| {
                if let Some(err) = &t.error {
                    Some(format!("{}: {}", t.table, err))
                } else if t.failed > 0 {
                    Some(format!("{}: {} record(s) failed", t.table, t.failed))
                } else {
                    None
                }
            })
            .collect();
        let error = (!failures.is_empty()).then(|| failures.join("; "));
        Self {
            success: count > 0 || error.is_none(),
            count,
            error,
            tables,
            duplicates_skipped,
            started_at,
            finished_at: Utc::now(),
        }
    }

    /// Combine the push and pull halves of a bidirectional sync.
    pub fn merge(push: SyncOutcome, pull: SyncOutcome) -> Self {
        let mut tables = push.tables;
        tables.extend(pull.tables);
        let mut outcome = Self::from_reports(
            push.started_at,
            tables,
            push.duplicates_skipped + pull.duplicates_skipped,
        );
        outcome.finished_at = pull.finished_at;
        outcome
    }
}

/// Counts from merging a batch of remote records into the local store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeStats {
    pub inserted: usize,
    pub updated: usize,
    pub kept_local: usize,
}

impl MergeStats {
    pub fn applied(&self) -> usize {
        self.inserted + self.updated
    }
}

/// Snapshot of the sync engine for status displays.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncStatus {
    pub phase: SyncPhase,
    pub pending_changes: usize,
    pub last_outcome: Option<SyncOutcome>,
}
