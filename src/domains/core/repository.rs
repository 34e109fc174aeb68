use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::domains::core::record_store::{DeleteOutcome, LocalStore};
use crate::errors::{DomainError, DomainResult};
use crate::types::{Filters, Record, TableName};

/// A typed view of one business table.
pub trait TableEntity: Serialize + DeserializeOwned + Send + Sync {
    const TABLE: TableName;
}

/// Typed CRUD over the [`LocalStore`]. All writes go through the store so
/// change logging and cache invalidation always apply.
pub struct EntityRepository<T> {
    store: Arc<LocalStore>,
    _entity: PhantomData<fn() -> T>,
}

impl<T> Clone for EntityRepository<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            _entity: PhantomData,
        }
    }
}

impl<T: TableEntity> EntityRepository<T> {
    pub fn new(store: Arc<LocalStore>) -> Self {
        Self {
            store,
            _entity: PhantomData,
        }
    }

    pub async fn create(&self, entity: &T) -> DomainResult<T> {
        let record = self.store.create(T::TABLE, to_record(entity)?).await?;
        from_record(record)
    }

    pub async fn find_by_id(&self, id: &str) -> DomainResult<T> {
        let record = self
            .store
            .get(T::TABLE, id)
            .await
            .ok_or_else(|| DomainError::EntityNotFound(T::TABLE.to_string(), id.to_string()))?;
        from_record(record)
    }

    pub async fn find_all(&self) -> DomainResult<Vec<T>> {
        self.find_where(&Filters::new()).await
    }

    pub async fn find_where(&self, filters: &Filters) -> DomainResult<Vec<T>> {
        self.store
            .list(T::TABLE, filters)
            .await
            .into_iter()
            .map(from_record)
            .collect()
    }

    /// Apply the non-null fields of `patch`.
    pub async fn update<P: Serialize>(&self, id: &str, patch: &P) -> DomainResult<T> {
        let record = self.store.update(T::TABLE, id, to_record(patch)?).await?;
        from_record(record)
    }

    pub async fn delete(&self, id: &str) -> DomainResult<DeleteOutcome> {
        self.store.delete(T::TABLE, id).await
    }
}

/// Serialize to a record, leaving out unset fields.
pub fn to_record<P: Serialize>(value: &P) -> DomainResult<Record> {
    match serde_json::to_value(value) {
        Ok(Value::Object(mut map)) => {
            map.retain(|_, v| !v.is_null());
            Ok(map)
        }
        Ok(other) => Err(DomainError::Internal(format!("Expected an object, got {}", other))),
        Err(e) => Err(DomainError::Internal(format!("Failed to serialize entity: {}", e))),
    }
}

pub fn from_record<T: DeserializeOwned>(record: Record) -> DomainResult<T> {
    serde_json::from_value(Value::Object(record))
        .map_err(|e| DomainError::Internal(format!("Failed to read stored record: {}", e)))
}

/// Single-field equality filter.
pub fn filter_by(field: &str, value: impl Into<Value>) -> Filters {
    let mut filters = Filters::new();
    filters.insert(field.to_string(), value.into());
    filters
}
