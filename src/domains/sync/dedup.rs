use std::cmp::Ordering;

use crate::types::{compare_timestamps, Record, RecordExt, TableName};

/// Amounts closer than this are considered equal.
const AMOUNT_TOLERANCE: f64 = 0.01;

/// Business-key rule deciding when two records describe the same real entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateRule {
    /// Same email, or same name and phone.
    Customer,
    /// Same customer name, date, time and booking type.
    Booking,
    /// Same customer name, date, payment method and (near) equal total.
    Transaction,
    /// Same parent transaction, item name and (near) equal price.
    TransactionItem,
    /// Same name and category (menu items, spa services).
    CatalogItem,
    None,
}

impl DuplicateRule {
    pub fn for_table(table: TableName) -> Self {
        match table {
            TableName::Customers => Self::Customer,
            TableName::Bookings => Self::Booking,
            TableName::Transactions => Self::Transaction,
            TableName::TransactionItems => Self::TransactionItem,
            TableName::MenuItems | TableName::SpaServices => Self::CatalogItem,
            _ => Self::None,
        }
    }

    /// Whether `a` and `b` are the same entity. Records missing any key
    /// field never match.
    pub fn same_entity(&self, a: &Record, b: &Record) -> bool {
        match self {
            Self::Customer => {
                if let (Some(x), Some(y)) = (text(a, "email"), text(b, "email")) {
                    if x == y {
                        return true;
                    }
                }
                match (text(a, "name"), text(a, "phone"), text(b, "name"), text(b, "phone")) {
                    (Some(an), Some(ap), Some(bn), Some(bp)) => an == bn && ap == bp,
                    _ => false,
                }
            }
            Self::Booking => {
                keys_equal(a, b, &["customer_name", "booking_date", "booking_time", "booking_type"])
            }
            Self::Transaction => {
                keys_equal(a, b, &["customer_name", "transaction_date", "payment_method"])
                    && amounts_close(a, b, "total_amount")
            }
            Self::TransactionItem => {
                keys_equal(a, b, &["transaction_id", "item_name"]) && amounts_close(a, b, "price")
            }
            Self::CatalogItem => keys_equal(a, b, &["name", "category"]),
            Self::None => false,
        }
    }

    /// Which of two duplicates to keep. `Greater` means `a` wins.
    pub fn prefer(&self, a: &Record, b: &Record) -> Ordering {
        match self {
            Self::TransactionItem => by_freshness(a, b).then_with(|| by_number(a, b, "quantity")),
            Self::CatalogItem => match (a.freshness(), b.freshness()) {
                (Some(x), Some(y)) if x != y => compare_timestamps(x, y),
                _ => by_number(a, b, "price"),
            },
            _ => by_freshness(a, b),
        }
    }
}

/// Result of collapsing a batch to one record per business key.
#[derive(Debug, Clone, PartialEq)]
pub struct Deduplicated {
    pub records: Vec<Record>,
    pub skipped: usize,
}

/// Keep the preferred record of every duplicate group. Survivors keep their
/// original relative order.
pub fn deduplicate(table: TableName, records: Vec<Record>) -> Deduplicated {
    let rule = DuplicateRule::for_table(table);
    if rule == DuplicateRule::None || records.len() < 2 {
        return Deduplicated { records, skipped: 0 };
    }

    let mut ranked: Vec<usize> = (0..records.len()).collect();
    // Stable sort, so equally preferred records keep the earlier one.
    ranked.sort_by(|&x, &y| rule.prefer(&records[y], &records[x]));

    let mut kept: Vec<usize> = Vec::with_capacity(records.len());
    for candidate in ranked {
        let duplicate = kept
            .iter()
            .any(|&k| rule.same_entity(&records[k], &records[candidate]));
        if duplicate {
            log::debug!(
                "Skipping duplicate {} record {}",
                table,
                records[candidate].id().unwrap_or("<no id>")
            );
        } else {
            kept.push(candidate);
        }
    }
    kept.sort_unstable();

    let skipped = records.len() - kept.len();
    if skipped > 0 {
        log::info!("Skipped {} duplicate {} record(s) before push", skipped, table);
    }
    let mut slots: Vec<Option<Record>> = records.into_iter().map(Some).collect();
    let records = kept.into_iter().filter_map(|i| slots[i].take()).collect();
    Deduplicated { records, skipped }
}

/// Trimmed, lower-cased, non-empty text value.
fn text(record: &Record, field: &str) -> Option<String> {
    record
        .str_field(field)
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
}

fn keys_equal(a: &Record, b: &Record, fields: &[&str]) -> bool {
    fields.iter().all(|field| match (text(a, field), text(b, field)) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    })
}

fn amounts_close(a: &Record, b: &Record, field: &str) -> bool {
    match (a.num_field(field), b.num_field(field)) {
        (Some(x), Some(y)) => (x - y).abs() <= AMOUNT_TOLERANCE,
        _ => false,
    }
}

fn by_freshness(a: &Record, b: &Record) -> Ordering {
    match (a.freshness(), b.freshness()) {
        (Some(x), Some(y)) => compare_timestamps(x, y),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    }
}

fn by_number(a: &Record, b: &Record, field: &str) -> Ordering {
    let x = a.num_field(field).unwrap_or(0.0);
    let y = b.num_field(field).unwrap_or(0.0);
    x.partial_cmp(&y).unwrap_or(Ordering::Equal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    fn ids(result: &Deduplicated) -> Vec<&str> {
        result.records.iter().map(|r| r.id().unwrap()).collect()
    }

    #[test]
    fn test_customers_match_on_email_or_name_and_phone() {
        let rule = DuplicateRule::Customer;
        let a = record(json!({"id": "1", "name": "Tariro", "email": "T@x.com ", "phone": "0771"}));
        let b = record(json!({"id": "2", "name": "Other", "email": "t@x.com"}));
        let c = record(json!({"id": "3", "name": "tariro", "phone": "0771"}));
        let d = record(json!({"id": "4", "name": "Tariro"}));
        let e = record(json!({"id": "5", "email": ""}));
        let f = record(json!({"id": "6", "email": ""}));

        assert!(rule.same_entity(&a, &b));
        assert!(rule.same_entity(&a, &c));
        assert!(!rule.same_entity(&a, &d));
        assert!(!rule.same_entity(&e, &f));
    }

    #[test]
    fn test_bookings_keep_the_most_recent_copy() {
        let batch = vec![
            record(json!({"id": "old", "customer_name": "Jane", "booking_date": "2024-06-01", "booking_time": "10:00", "booking_type": "spa", "updated_at": "2024-05-01T10:00:00Z"})),
            record(json!({"id": "other", "customer_name": "Jane", "booking_date": "2024-06-01", "booking_time": "11:00", "booking_type": "spa", "updated_at": "2024-05-01T09:00:00Z"})),
            record(json!({"id": "new", "customer_name": "JANE", "booking_date": "2024-06-01", "booking_time": "10:00", "booking_type": "spa", "updated_at": "2024-05-01T12:00:00Z"})),
        ];
        let result = deduplicate(TableName::Bookings, batch);
        assert_eq!(result.skipped, 1);
        assert_eq!(ids(&result), vec!["other", "new"]);
    }

    #[test]
    fn test_transactions_tolerate_rounding_in_totals() {
        let rule = DuplicateRule::Transaction;
        let base = json!({"customer_name": "Jane", "transaction_date": "2024-06-01", "payment_method": "cash"});
        let mut a = record(base.clone());
        a.insert("total_amount".into(), json!(25.00));
        let mut b = record(base.clone());
        b.insert("total_amount".into(), json!("25.005"));
        let mut c = record(base);
        c.insert("total_amount".into(), json!(25.5));

        assert!(rule.same_entity(&a, &b));
        assert!(!rule.same_entity(&a, &c));
    }

    #[test]
    fn test_transaction_items_prefer_higher_quantity_on_equal_time() {
        let batch = vec![
            record(json!({"id": "i1", "transaction_id": "t1", "item_name": "Massage", "price": 40, "quantity": 1, "updated_at": "2024-05-01T10:00:00Z"})),
            record(json!({"id": "i2", "transaction_id": "t1", "item_name": "massage", "price": 40.001, "quantity": 2, "updated_at": "2024-05-01T10:00:00Z"})),
        ];
        let result = deduplicate(TableName::TransactionItems, batch);
        assert_eq!(ids(&result), vec!["i2"]);
    }

    #[test]
    fn test_catalog_items_fall_back_to_price_without_timestamps() {
        let batch = vec![
            record(json!({"id": "cheap", "name": "Hot Stone", "category": "massage", "price": 30})),
            record(json!({"id": "dear", "name": "hot stone", "category": "Massage", "price": 45})),
        ];
        let result = deduplicate(TableName::SpaServices, batch);
        assert_eq!(ids(&result), vec!["dear"]);

        let dated = vec![
            record(json!({"id": "newer", "name": "Tea", "category": "drinks", "price": 1, "updated_at": "2024-05-02T00:00:00Z"})),
            record(json!({"id": "older", "name": "Tea", "category": "drinks", "price": 2, "updated_at": "2024-05-01T00:00:00Z"})),
        ];
        assert_eq!(ids(&deduplicate(TableName::MenuItems, dated)), vec!["newer"]);
    }

    #[test]
    fn test_records_missing_key_fields_are_never_collapsed() {
        let batch = vec![
            record(json!({"id": "a", "name": "Tea"})),
            record(json!({"id": "b", "name": "Tea"})),
        ];
        let result = deduplicate(TableName::MenuItems, batch);
        assert_eq!(result.skipped, 0);

        let staff = vec![record(json!({"id": "s1", "name": "A"})), record(json!({"id": "s2", "name": "A"}))];
        assert_eq!(deduplicate(TableName::Staff, staff).records.len(), 2);
    }
}
