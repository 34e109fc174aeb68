pub mod change_log;
pub mod dedup;
pub mod remote;
pub mod scheduler;
pub mod seed;
pub mod service;
pub mod types;

pub use change_log::ChangeLog;
pub use remote::{RemoteStore, RemoteUser, RestRemoteStore};
pub use service::{SyncEngine, SyncService};
pub use types::{ChangeEntry, ChangeOperationType, SyncOutcome, SyncPhase, SyncStatus, TableSyncReport};
