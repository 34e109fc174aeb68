use serde::Serialize;
use thiserror::Error;

/// Durable persistence errors
#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Snapshot serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Database error: {0}")]
    Other(String),
}

impl serde::Serialize for DbError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("DbError", 2)?;
        let kind = match self {
            DbError::Sqlx(_) => "Sqlx",
            DbError::Serialization(_) => "Serialization",
            DbError::Migration(_) => "Migration",
            DbError::Other(_) => "Other",
        };
        state.serialize_field("type", kind)?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Manual Clone implementation for DbError
impl Clone for DbError {
    fn clone(&self) -> Self {
        match self {
            DbError::Sqlx(err) => DbError::Other(format!("SQLx error: {}", err)),
            DbError::Serialization(err) => {
                DbError::Other(format!("Snapshot serialization error: {}", err))
            }
            DbError::Migration(s) => DbError::Migration(s.clone()),
            DbError::Other(s) => DbError::Other(s.clone()),
        }
    }
}

/// Store-level errors surfaced to callers of the Record Store
#[derive(Debug, Error, Clone, Serialize)]
pub enum DomainError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Entity not found: {0} with ID {1}")]
    EntityNotFound(String, String),

    #[error("Record {1} already exists in {0}")]
    DuplicateId(String, String),

    #[error("Unknown table: {0}")]
    UnknownTable(String),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Sync-specific errors
#[derive(Debug, Error, Clone, Serialize)]
pub enum SyncError {
    #[error("Authentication required: sign in before syncing")]
    AuthRequired,

    #[error("Sync already in progress, please wait for it to finish")]
    SyncInProgress,

    #[error("Remote store rejected {table} record {id}: {message}")]
    RemoteRejected {
        table: String,
        id: String,
        message: String,
    },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Sync timeout")]
    Timeout,

    #[error("Local database error: {0}")]
    LocalDatabase(#[from] DbError),

    #[error("Sync error: {0}")]
    Other(String),
}

impl SyncError {
    /// Whether retrying the same remote call could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SyncError::Network(_) | SyncError::ServerError(_) | SyncError::Timeout
        )
    }
}

impl From<DomainError> for SyncError {
    fn from(error: DomainError) -> Self {
        match error {
            DomainError::Database(db) => SyncError::LocalDatabase(db),
            DomainError::Sync(sync) => sync,
            other => SyncError::Other(other.to_string()),
        }
    }
}

/// Validation errors
#[derive(Debug, Error, Clone, Serialize)]
pub enum ValidationError {
    #[error("Schema for table '{table}' is invalid: {reason}")]
    Schema {
        table: String,
        reason: String,
    },

    #[error("Validation error: {0}")]
    Custom(String),
}

impl ValidationError {
    pub fn schema(table: &str, reason: &str) -> Self {
        Self::Schema {
            table: table.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn custom(message: &str) -> Self {
        Self::Custom(message.to_string())
    }
}
