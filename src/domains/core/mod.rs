pub mod background;
pub mod cache;
pub mod indexer;
pub mod persistence;
pub mod record_store;
pub mod repository;

pub use background::BackgroundTask;
pub use cache::{CachePattern, QueryCache};
pub use indexer::QueryIndexer;
pub use persistence::{LocalPersistence, MemoryPersistence, SqlitePersistence};
pub use record_store::{DeleteOutcome, LocalStore, StoreStats, TableStats};
pub use repository::{EntityRepository, TableEntity};
