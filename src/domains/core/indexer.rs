use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use serde_json::Value;

use crate::types::{value_key, Record, TableName};

type FieldIndex = HashMap<String, Vec<Record>>;

/// Single-field hash indexes per table. Purely an accelerator: a missing
/// index means "scan", never "no results".
#[derive(Debug, Default)]
pub struct QueryIndexer {
    indexes: Mutex<HashMap<TableName, HashMap<String, FieldIndex>>>,
}

impl QueryIndexer {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<TableName, HashMap<String, FieldIndex>>> {
        self.indexes.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Build (or replace) the index of `field` over `records`.
    pub fn create_index(&self, table: TableName, field: &str, records: &[Record]) {
        let mut index: FieldIndex = HashMap::new();
        for record in records {
            if let Some(value) = record.get(field) {
                index.entry(value_key(value)).or_default().push(record.clone());
            }
        }
        log::debug!(
            "Built index {}.{} ({} records, {} keys)",
            table,
            field,
            records.len(),
            index.len()
        );
        self.lock().entry(table).or_default().insert(field.to_string(), index);
    }

    /// Records whose `field` equals `value`, or `None` when no index exists.
    pub fn query_by_index(&self, table: TableName, field: &str, value: &Value) -> Option<Vec<Record>> {
        let indexes = self.lock();
        let index = indexes.get(&table)?.get(field)?;
        Some(index.get(&value_key(value)).cloned().unwrap_or_default())
    }

    pub fn has_index(&self, table: TableName, field: &str) -> bool {
        self.lock()
            .get(&table)
            .map(|fields| fields.contains_key(field))
            .unwrap_or(false)
    }

    /// Drop one index of a table, or all of them when `field` is `None`.
    pub fn invalidate_index(&self, table: TableName, field: Option<&str>) {
        let mut indexes = self.lock();
        match field {
            Some(field) => {
                if let Some(fields) = indexes.get_mut(&table) {
                    fields.remove(field);
                }
            }
            None => {
                indexes.remove(&table);
            }
        }
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn items() -> Vec<Record> {
        vec![
            json!({"id": "1", "category": "food", "price": 4}),
            json!({"id": "2", "category": "drinks", "price": 2}),
            json!({"id": "3", "category": "food", "price": 6}),
            json!({"id": "4", "price": 1}),
        ]
        .into_iter()
        .map(|v| v.as_object().cloned().unwrap())
        .collect()
    }

    #[test]
    fn test_query_without_index_returns_none() {
        let indexer = QueryIndexer::new();
        assert!(indexer.query_by_index(TableName::MenuItems, "category", &json!("food")).is_none());
    }

    #[test]
    fn test_index_lookup_matches_equality() {
        let indexer = QueryIndexer::new();
        indexer.create_index(TableName::MenuItems, "category", &items());

        let food = indexer
            .query_by_index(TableName::MenuItems, "category", &json!("food"))
            .unwrap();
        let ids: Vec<_> = food.iter().map(|r| r["id"].clone()).collect();
        assert_eq!(ids, vec![json!("1"), json!("3")]);

        let none = indexer
            .query_by_index(TableName::MenuItems, "category", &json!("desserts"))
            .unwrap();
        assert!(none.is_empty());

        let by_price = indexer.query_by_index(TableName::MenuItems, "price", &json!(2));
        assert!(by_price.is_none());
    }

    #[test]
    fn test_invalidate_single_field_and_whole_table() {
        let indexer = QueryIndexer::new();
        indexer.create_index(TableName::MenuItems, "category", &items());
        indexer.create_index(TableName::MenuItems, "price", &items());

        indexer.invalidate_index(TableName::MenuItems, Some("price"));
        assert!(indexer.has_index(TableName::MenuItems, "category"));
        assert!(!indexer.has_index(TableName::MenuItems, "price"));

        indexer.invalidate_index(TableName::MenuItems, None);
        assert!(!indexer.has_index(TableName::MenuItems, "category"));
    }
}
