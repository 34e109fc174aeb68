use std::cell::RefCell;
use std::ffi::CString;
use std::fmt;
use std::os::raw::c_char;

use serde::{Deserialize, Serialize};

use crate::errors::{DbError, DomainError, SyncError, ValidationError};

/// Error codes for FFI boundary
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Success (no error)
    Success = 0,

    // General errors (1-99)
    Unknown = 1,
    InvalidArgument = 2,
    NullPointer = 3,
    InvalidUtf8 = 4,
    InternalError = 6,
    NotInitialized = 7,

    // Database errors (100-199)
    DatabaseGeneral = 100,
    DatabaseMigration = 106,
    DatabaseSerialization = 107,

    // Domain errors (200-299)
    DomainGeneral = 200,
    EntityNotFound = 201,
    DuplicateId = 202,
    UnknownTable = 203,
    ValidationFailed = 204,

    // Sync errors (400-499)
    SyncGeneral = 400,
    SyncNetworkError = 401,
    SyncAuthenticationFailed = 402,
    SyncServerError = 405,
    SyncTimeout = 411,
    SyncAuthRequired = 413,
    SyncInProgress = 414,
    SyncRemoteRejected = 415,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} ({})", self, *self as i32)
    }
}

/// Error type for FFI boundary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FFIError {
    /// Error code for programmatic handling
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Optional additional details (JSON string)
    pub details: Option<String>,
}

impl fmt::Display for FFIError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(details) = &self.details {
            write!(f, "{}: {} ({})", self.code, self.message, details)
        } else {
            write!(f, "{}: {}", self.code, self.message)
        }
    }
}

impl std::error::Error for FFIError {}

impl FFIError {
    pub fn new(code: ErrorCode, message: &str) -> Self {
        Self {
            code,
            message: message.to_string(),
            details: None,
        }
    }

    pub fn with_details(code: ErrorCode, message: &str, details: &str) -> Self {
        Self {
            code,
            message: message.to_string(),
            details: Some(details.to_string()),
        }
    }

    pub fn invalid_argument(message: &str) -> Self {
        Self::new(ErrorCode::InvalidArgument, message)
    }

    pub fn null_pointer(name: &str) -> Self {
        Self::new(ErrorCode::NullPointer, &format!("Null pointer provided for {}", name))
    }

    pub fn internal(message: String) -> Self {
        Self::new(ErrorCode::InternalError, &message)
    }

    pub fn not_initialized(what: &str) -> Self {
        Self::new(ErrorCode::NotInitialized, &format!("{} not initialized, call initialize_library first", what))
    }
}

fn entity_details(table: &str, id: &str) -> String {
    serde_json::json!({ "table": table, "id": id }).to_string()
}

impl From<DbError> for FFIError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Sqlx(sqlx_err) => Self::new(ErrorCode::DatabaseGeneral, &sqlx_err.to_string()),
            DbError::Serialization(e) => Self::new(ErrorCode::DatabaseSerialization, &e.to_string()),
            DbError::Migration(msg) => Self::new(ErrorCode::DatabaseMigration, &msg),
            DbError::Other(msg) => Self::new(ErrorCode::DatabaseGeneral, &msg),
        }
    }
}

impl From<DomainError> for FFIError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Database(db_err) => db_err.into(),
            DomainError::EntityNotFound(table, id) => Self::with_details(
                ErrorCode::EntityNotFound,
                &format!("Entity not found: {} with ID {}", table, id),
                &entity_details(&table, &id),
            ),
            DomainError::DuplicateId(table, id) => Self::with_details(
                ErrorCode::DuplicateId,
                &format!("Record {} already exists in {}", id, table),
                &entity_details(&table, &id),
            ),
            DomainError::UnknownTable(table) => Self::with_details(
                ErrorCode::UnknownTable,
                &format!("Unknown table: {}", table),
                &serde_json::json!({ "table": table }).to_string(),
            ),
            DomainError::Validation(val_err) => val_err.into(),
            DomainError::Sync(sync_err) => sync_err.into(),
            DomainError::Internal(msg) => Self::new(ErrorCode::InternalError, &msg),
        }
    }
}

impl From<SyncError> for FFIError {
    fn from(err: SyncError) -> Self {
        let message = err.to_string();
        match err {
            SyncError::AuthRequired => Self::new(ErrorCode::SyncAuthRequired, &message),
            SyncError::SyncInProgress => Self::new(ErrorCode::SyncInProgress, &message),
            SyncError::RemoteRejected { table, id, .. } => {
                Self::with_details(ErrorCode::SyncRemoteRejected, &message, &entity_details(&table, &id))
            }
            SyncError::AuthenticationFailed(_) => Self::new(ErrorCode::SyncAuthenticationFailed, &message),
            SyncError::Network(_) => Self::new(ErrorCode::SyncNetworkError, &message),
            SyncError::ServerError(_) => Self::new(ErrorCode::SyncServerError, &message),
            SyncError::Timeout => Self::new(ErrorCode::SyncTimeout, &message),
            SyncError::LocalDatabase(db_err) => db_err.into(),
            SyncError::Other(_) => Self::new(ErrorCode::SyncGeneral, &message),
        }
    }
}

impl From<ValidationError> for FFIError {
    fn from(err: ValidationError) -> Self {
        let message = err.to_string();
        let details = match &err {
            ValidationError::Schema { table, reason } => {
                serde_json::json!({ "table": table, "type": "schema", "reason": reason })
            }
            ValidationError::Custom(msg) => serde_json::json!({ "type": "custom", "message": msg }),
        };
        Self::with_details(ErrorCode::ValidationFailed, &message, &details.to_string())
    }
}

impl From<std::ffi::NulError> for FFIError {
    fn from(_: std::ffi::NulError) -> Self {
        Self::new(ErrorCode::InvalidUtf8, "String contains null bytes, cannot create CString")
    }
}

thread_local! {
    static LAST_ERROR: RefCell<Option<FFIError>> = const { RefCell::new(None) };
}

/// Remember the error of the last failed call on this thread.
pub fn set_last_error(error: &FFIError) {
    LAST_ERROR.with(|slot| *slot.borrow_mut() = Some(error.clone()));
}

pub fn clear_last_error() {
    LAST_ERROR.with(|slot| *slot.borrow_mut() = None);
}

pub fn last_error() -> Option<FFIError> {
    LAST_ERROR.with(|slot| slot.borrow().clone())
}

/// The last error as a JSON C string, or null when the last call succeeded.
pub fn get_last_error_message() -> *mut c_char {
    let Some(error) = last_error() else {
        return std::ptr::null_mut();
    };
    let json = serde_json::to_string(&error).unwrap_or_else(|_| error.message.clone());
    CString::new(json).map_or(std::ptr::null_mut(), |c| c.into_raw())
}

// Result type alias for FFI functions
pub type FFIResult<T> = Result<T, FFIError>;
