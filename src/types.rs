use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::errors::DomainError;

/// Untyped record as it exists at the serialization boundary (durable
/// storage, remote wire format). Typed views live in the entity modules.
pub type Record = Map<String, Value>;

/// Exact-match filters, field -> value. Ordered so the serialized form is
/// stable and can be used as a cache key.
pub type Filters = BTreeMap<String, Value>;

pub const FIELD_ID: &str = "id";
pub const FIELD_CREATED_AT: &str = "created_at";
pub const FIELD_UPDATED_AT: &str = "updated_at";
pub const FIELD_IS_SYNCED: &str = "is_synced";

/// Business tables held by the store. Declaration order is the order tables
/// are pushed and pulled (parents before children).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableName {
    BusinessSettings,
    GeneralSettings,
    Staff,
    SpaServices,
    MenuItems,
    Inventory,
    Customers,
    Bookings,
    Transactions,
    TransactionItems,
    Feedback,
}

impl TableName {
    pub const ALL: [TableName; 11] = [
        TableName::BusinessSettings,
        TableName::GeneralSettings,
        TableName::Staff,
        TableName::SpaServices,
        TableName::MenuItems,
        TableName::Inventory,
        TableName::Customers,
        TableName::Bookings,
        TableName::Transactions,
        TableName::TransactionItems,
        TableName::Feedback,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TableName::BusinessSettings => "business_settings",
            TableName::GeneralSettings => "general_settings",
            TableName::Staff => "staff",
            TableName::SpaServices => "spa_services",
            TableName::MenuItems => "menu_items",
            TableName::Inventory => "inventory",
            TableName::Customers => "customers",
            TableName::Bookings => "bookings",
            TableName::Transactions => "transactions",
            TableName::TransactionItems => "transaction_items",
            TableName::Feedback => "feedback",
        }
    }
}

impl FromStr for TableName {
    type Err = DomainError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TableName::ALL
            .iter()
            .copied()
            .find(|table| table.as_str() == s)
            .ok_or_else(|| DomainError::UnknownTable(s.to_string()))
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current time as an RFC 3339 UTC string with millisecond precision.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Timestamp for a write that follows `previous`. Strictly greater than a
/// parseable `previous`, even when the clock is behind it or in the same
/// millisecond, so each write gets a distinct `updated_at`.
pub fn next_timestamp(previous: Option<&str>) -> String {
    let now = Utc::now();
    match previous.and_then(parse_timestamp) {
        Some(prev) if now <= prev => (prev + chrono::Duration::milliseconds(1))
            .to_rfc3339_opts(SecondsFormat::Millis, true),
        _ => now.to_rfc3339_opts(SecondsFormat::Millis, true),
    }
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Orders two ISO-8601 timestamps. Falls back to string order when either
/// side does not parse.
pub fn compare_timestamps(a: &str, b: &str) -> Ordering {
    match (parse_timestamp(a), parse_timestamp(b)) {
        (Some(a), Some(b)) => a.cmp(&b),
        _ => a.cmp(b),
    }
}

/// Stringified form used for equality filters and index keys.
pub fn value_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Parse a JSON value as a number, accepting numeric strings.
pub fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

/// Field accessors over untyped records.
pub trait RecordExt {
    fn id(&self) -> Option<&str>;
    fn str_field(&self, field: &str) -> Option<&str>;
    fn num_field(&self, field: &str) -> Option<f64>;
    fn updated_at(&self) -> Option<&str>;
    /// `updated_at`, or `created_at` when the record was never updated.
    fn freshness(&self) -> Option<&str>;
    fn is_synced(&self) -> bool;
    fn set_synced(&mut self, synced: bool);
    fn matches(&self, filters: &Filters) -> bool;
}

impl RecordExt for Record {
    fn id(&self) -> Option<&str> {
        self.str_field(FIELD_ID)
    }

    fn str_field(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }

    fn num_field(&self, field: &str) -> Option<f64> {
        self.get(field).and_then(value_as_f64)
    }

    fn updated_at(&self) -> Option<&str> {
        self.str_field(FIELD_UPDATED_AT)
    }

    fn freshness(&self) -> Option<&str> {
        self.updated_at().or_else(|| self.str_field(FIELD_CREATED_AT))
    }

    fn is_synced(&self) -> bool {
        match self.get(FIELD_IS_SYNCED) {
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_i64() == Some(1),
            _ => false,
        }
    }

    fn set_synced(&mut self, synced: bool) {
        self.insert(FIELD_IS_SYNCED.to_string(), Value::from(if synced { 1 } else { 0 }));
    }

    fn matches(&self, filters: &Filters) -> bool {
        filters.iter().all(|(field, expected)| {
            self.get(field)
                .map(|actual| value_key(actual) == value_key(expected))
                .unwrap_or(false)
        })
    }
}

/// Accepts a number, a numeric string, or null. Anything else becomes `None`
/// so locally-entered values never break typed reads.
pub fn deserialize_lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(value_as_f64))
}

/// Accepts `true`/`false`, `0`/`1`, or their string forms.
pub fn deserialize_lenient_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Bool(b)) => Some(b),
        Some(Value::Number(n)) => n.as_i64().map(|n| n != 0),
        Some(Value::String(s)) => match s.as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    })
}

/// Accepts strings, and numbers or booleans in their display form.
pub fn deserialize_lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_table_name_round_trip() {
        for table in TableName::ALL {
            assert_eq!(table.as_str().parse::<TableName>().unwrap(), table);
        }
        assert!("drop_tables".parse::<TableName>().is_err());
    }

    #[test]
    fn test_compare_timestamps_uses_instants() {
        assert_eq!(
            compare_timestamps("2024-01-02T00:00:00Z", "2024-01-01T23:00:00-02:00"),
            Ordering::Less
        );
        assert_eq!(
            compare_timestamps("2024-01-02T00:00:00Z", "2024-01-02T01:00:00+02:00"),
            Ordering::Greater
        );
        assert_eq!(
            compare_timestamps("2024-01-01T00:00:00.000Z", "2024-01-01T00:00:00Z"),
            Ordering::Equal
        );
    }

    #[test]
    fn test_next_timestamp_always_moves_forward() {
        let future = "2999-01-01T00:00:00.000Z";
        let after_future = next_timestamp(Some(future));
        assert_eq!(after_future, "2999-01-01T00:00:00.001Z");
        assert_eq!(next_timestamp(Some(&after_future)), "2999-01-01T00:00:00.002Z");

        let now = now_timestamp();
        assert_eq!(compare_timestamps(&next_timestamp(Some(&now)), &now), Ordering::Greater);
        assert_ne!(next_timestamp(Some("2000-01-01T00:00:00Z")), "2000-01-01T00:00:00Z");
        assert!(parse_timestamp(&next_timestamp(Some("not a date"))).is_some());
    }

    #[test]
    fn test_record_matches_uses_stringified_values() {
        let record = json!({"id": "1", "category": "food", "price": 5})
            .as_object()
            .cloned()
            .unwrap();

        let mut filters = Filters::new();
        filters.insert("category".into(), json!("food"));
        filters.insert("price".into(), json!("5"));
        assert!(record.matches(&filters));

        filters.insert("missing".into(), json!("x"));
        assert!(!record.matches(&filters));
    }

    #[test]
    fn test_is_synced_accepts_int_and_bool() {
        let mut record = Record::new();
        assert!(!record.is_synced());
        record.set_synced(true);
        assert!(record.is_synced());
        record.insert(FIELD_IS_SYNCED.into(), json!(false));
        assert!(!record.is_synced());
    }
}
