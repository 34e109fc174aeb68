mod error;

pub use error::{DomainError, DbError, SyncError, ValidationError};

/// Result type for database operations
pub type DbResult<T> = Result<T, DbError>;

/// Result type for domain operations
pub type DomainResult<T> = Result<T, DomainError>;

/// Result type for sync operations
pub type SyncResult<T> = Result<T, SyncError>;
