use crate::errors::ValidationError;
use crate::types::{
    value_as_f64, Record, RecordExt, TableName, FIELD_CREATED_AT, FIELD_ID, FIELD_IS_SYNCED,
    FIELD_UPDATED_AT,
};
use regex::Regex;
use serde::Serialize;
use serde_json::{json, Number, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

/// Client-only bookkeeping fields that never leave the device.
pub const CLIENT_ONLY_FIELDS: &[&str] = &["_offline", "_queueId", "_createdAt", "_pendingSync"];

/// Fields coerced to numbers on every table that declares them.
pub const NUMERIC_FIELDS: &[&str] = &[
    "price",
    "duration",
    "total_amount",
    "tax_amount",
    "tip_amount",
    "subtotal",
];

fn email_regex() -> &'static Regex {
    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    EMAIL_REGEX.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap()
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Number,
    Boolean,
    Email,
}

/// Allowed values for an enum field and the value used when a record holds
/// anything else.
#[derive(Debug, Clone)]
pub struct EnumRule {
    pub field: &'static str,
    pub allowed: &'static [&'static str],
    pub default: &'static str,
}

/// Declared shape of one table: its allow-list, required fields, enum
/// constraints and defaults.
#[derive(Debug, Clone)]
pub struct TableSchema {
    pub table: TableName,
    pub fields: Vec<(&'static str, FieldKind)>,
    pub required: Vec<&'static str>,
    pub enums: Vec<EnumRule>,
    pub defaults: Vec<(&'static str, Value)>,
}

impl TableSchema {
    fn new(table: TableName, fields: &[(&'static str, FieldKind)]) -> Self {
        let mut all = vec![
            (FIELD_ID, FieldKind::Text),
            (FIELD_CREATED_AT, FieldKind::Text),
            (FIELD_UPDATED_AT, FieldKind::Text),
        ];
        all.extend_from_slice(fields);
        Self {
            table,
            fields: all,
            required: vec![FIELD_ID],
            enums: Vec::new(),
            defaults: Vec::new(),
        }
    }

    fn required(mut self, fields: &[&'static str]) -> Self {
        self.required.extend_from_slice(fields);
        self
    }

    fn enum_field(mut self, field: &'static str, allowed: &'static [&'static str], default: &'static str) -> Self {
        self.enums.push(EnumRule { field, allowed, default });
        self
    }

    fn default_value(mut self, field: &'static str, value: Value) -> Self {
        self.defaults.push((field, value));
        self
    }

    pub fn kind_of(&self, field: &str) -> Option<FieldKind> {
        self.fields.iter().find(|(name, _)| *name == field).map(|(_, kind)| *kind)
    }

    fn default_for(&self, field: &str) -> Option<&Value> {
        self.defaults.iter().find(|(name, _)| *name == field).map(|(_, value)| value)
    }

    /// Checks the declaration is internally consistent.
    fn check(&self) -> Result<(), ValidationError> {
        let table = self.table.as_str();
        for field in self.required.iter().chain(self.defaults.iter().map(|(f, _)| f)) {
            if self.kind_of(field).is_none() {
                return Err(ValidationError::schema(table, &format!("'{}' is not in the field list", field)));
            }
        }
        for rule in &self.enums {
            if self.kind_of(rule.field) != Some(FieldKind::Text) {
                return Err(ValidationError::schema(table, &format!("enum field '{}' must be a text field", rule.field)));
            }
            if !rule.allowed.contains(&rule.default) {
                return Err(ValidationError::schema(
                    table,
                    &format!("default '{}' is not an allowed value of '{}'", rule.default, rule.field),
                ));
            }
        }
        for (name, kind) in &self.fields {
            if NUMERIC_FIELDS.contains(name) && *kind != FieldKind::Number {
                return Err(ValidationError::schema(table, &format!("'{}' must be numeric", name)));
            }
        }
        Ok(())
    }
}

/// A soft validation problem: the record was fixed up, not rejected.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationWarning {
    EnumCoerced { field: String, from: Value, to: String },
    NumberCoerced { field: String, from: Value },
    BooleanCoerced { field: String, from: Value },
    RequiredFilled { field: String },
    InvalidFormat { field: String, value: String },
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationWarning::EnumCoerced { field, from, to } => {
                write!(f, "'{}' value {} is not allowed, using '{}'", field, from, to)
            }
            ValidationWarning::NumberCoerced { field, from } => {
                write!(f, "'{}' value {} is not numeric, using 0", field, from)
            }
            ValidationWarning::BooleanCoerced { field, from } => {
                write!(f, "'{}' value {} is not a boolean, using false", field, from)
            }
            ValidationWarning::RequiredFilled { field } => write!(f, "required field '{}' was missing", field),
            ValidationWarning::InvalidFormat { field, value } => write!(f, "'{}' has an invalid format: {}", field, value),
        }
    }
}

/// Output of [`Validator::clean`].
#[derive(Debug, Clone)]
pub struct CleanedRecord {
    pub record: Record,
    pub warnings: Vec<ValidationWarning>,
}

/// Per-table normalizer applied to records before they are sent to the
/// remote store.
#[derive(Debug, Clone)]
pub struct Validator {
    schemas: HashMap<TableName, TableSchema>,
}

impl Validator {
    /// Build the validator from the built-in schema registry.
    pub fn new() -> Result<Self, ValidationError> {
        Self::with_schemas(TableName::ALL.iter().map(|t| builtin_schema(*t)).collect())
    }

    pub fn with_schemas(schemas: Vec<TableSchema>) -> Result<Self, ValidationError> {
        let mut map = HashMap::new();
        for schema in schemas {
            schema.check()?;
            map.insert(schema.table, schema);
        }
        for table in TableName::ALL {
            if !map.contains_key(&table) {
                return Err(ValidationError::schema(table.as_str(), "no schema declared"));
            }
        }
        Ok(Self { schemas: map })
    }

    pub fn schema(&self, table: TableName) -> Option<&TableSchema> {
        self.schemas.get(&table)
    }

    /// Narrow, default and coerce a record for remote transmission. Never
    /// fails: every problem is repaired and reported as a warning.
    pub fn clean(&self, record: &Record, table: TableName) -> CleanedRecord {
        let mut warnings = Vec::new();
        let schema = match self.schemas.get(&table) {
            Some(schema) => schema,
            None => {
                return CleanedRecord { record: record.clone(), warnings };
            }
        };

        let mut cleaned: Record = record
            .iter()
            .filter(|(field, _)| {
                !CLIENT_ONLY_FIELDS.contains(&field.as_str())
                    && field.as_str() != FIELD_IS_SYNCED
                    && schema.kind_of(field).is_some()
            })
            .map(|(field, value)| (field.clone(), value.clone()))
            .collect();

        for (field, value) in &schema.defaults {
            let missing = cleaned.get(*field).map(Value::is_null).unwrap_or(true);
            if missing {
                cleaned.insert(field.to_string(), value.clone());
            }
        }

        for rule in &schema.enums {
            let Some(value) = cleaned.get(rule.field).cloned() else {
                continue;
            };
            if let Some(coerced) = coerce_enum(&value, rule) {
                // A case-only difference is a canonicalization, not a violation.
                let case_only = value
                    .as_str()
                    .map(|s| s.trim().eq_ignore_ascii_case(&coerced))
                    .unwrap_or(false);
                if !case_only {
                    warnings.push(ValidationWarning::EnumCoerced {
                        field: rule.field.to_string(),
                        from: value.clone(),
                        to: coerced.clone(),
                    });
                }
                cleaned.insert(rule.field.to_string(), Value::String(coerced));
            }
        }

        for (field, kind) in &schema.fields {
            let Some(value) = cleaned.get(*field).cloned() else {
                continue;
            };
            match kind {
                FieldKind::Number => {
                    let number = value_as_f64(&value);
                    if number.is_none() {
                        warnings.push(ValidationWarning::NumberCoerced {
                            field: field.to_string(),
                            from: value.clone(),
                        });
                    }
                    cleaned.insert(field.to_string(), number_value(number.unwrap_or(0.0)));
                }
                FieldKind::Boolean if !value.is_null() => {
                    let flag = coerce_bool(&value);
                    if flag.is_none() {
                        warnings.push(ValidationWarning::BooleanCoerced {
                            field: field.to_string(),
                            from: value.clone(),
                        });
                    }
                    cleaned.insert(field.to_string(), Value::Bool(flag.unwrap_or(false)));
                }
                FieldKind::Email => {
                    if let Some(email) = value.as_str() {
                        let normalized = email.trim().to_lowercase();
                        if !normalized.is_empty() && !email_regex().is_match(&normalized) {
                            warnings.push(ValidationWarning::InvalidFormat {
                                field: field.to_string(),
                                value: normalized.clone(),
                            });
                        }
                        cleaned.insert(field.to_string(), Value::String(normalized));
                    }
                }
                _ => {}
            }
        }

        for field in &schema.required {
            let missing = match cleaned.get(*field) {
                None | Some(Value::Null) => true,
                Some(Value::String(s)) => s.trim().is_empty(),
                _ => false,
            };
            if missing {
                let filler = schema.default_for(field).cloned().unwrap_or_else(|| {
                    match schema.kind_of(field) {
                        Some(FieldKind::Number) => json!(0),
                        Some(FieldKind::Boolean) => json!(false),
                        _ => json!(""),
                    }
                });
                cleaned.insert(field.to_string(), filler);
                warnings.push(ValidationWarning::RequiredFilled { field: field.to_string() });
            }
        }

        if !warnings.is_empty() {
            let id = record.id().unwrap_or("<no id>");
            for warning in &warnings {
                log::warn!("{} {}: {}", table, id, warning);
            }
        }

        CleanedRecord { record: cleaned, warnings }
    }
}

/// Returns the value to store for an enum field, or `None` when it is
/// already canonical.
fn coerce_enum(value: &Value, rule: &EnumRule) -> Option<String> {
    match value.as_str() {
        Some(s) if rule.allowed.contains(&s) => None,
        Some(s) => Some(
            rule.allowed
                .iter()
                .find(|allowed| allowed.eq_ignore_ascii_case(s.trim()))
                .unwrap_or(&rule.default)
                .to_string(),
        ),
        None => Some(rule.default.to_string()),
    }
}

fn coerce_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|n| n != 0.0),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Integral values stay integers so integer remote columns accept them.
fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Value::from(n as i64)
    } else {
        Number::from_f64(n).map(Value::Number).unwrap_or_else(|| Value::from(0))
    }
}

pub const BOOKING_TYPES: &[&str] = &["spa", "restaurant"];
pub const BOOKING_STATUSES: &[&str] = &["pending", "confirmed", "completed", "cancelled", "no_show"];
pub const PAYMENT_METHODS: &[&str] = &["cash", "card", "ecocash", "bank_transfer", "other"];
pub const PAYMENT_STATUSES: &[&str] = &["pending", "completed", "refunded", "cancelled"];
pub const FISCAL_STATUSES: &[&str] = &["pending", "submitted", "failed"];
pub const ITEM_TYPES: &[&str] = &["service", "menu_item", "product"];
pub const STAFF_ROLES: &[&str] = &["admin", "manager", "therapist", "chef", "waiter", "cashier", "receptionist"];
pub const FEEDBACK_CATEGORIES: &[&str] = &["service", "food", "ambiance", "staff", "other"];
pub const FEEDBACK_STATUSES: &[&str] = &["new", "reviewed", "resolved"];
pub const THEMES: &[&str] = &["light", "dark", "system"];

/// The built-in declaration for each business table.
pub fn builtin_schema(table: TableName) -> TableSchema {
    use FieldKind::*;
    match table {
        TableName::Bookings => TableSchema::new(
            table,
            &[
                ("customer_id", Text),
                ("customer_name", Text),
                ("customer_email", Email),
                ("customer_phone", Text),
                ("booking_date", Text),
                ("booking_time", Text),
                ("booking_type", Text),
                ("service_id", Text),
                ("service_name", Text),
                ("staff_id", Text),
                ("party_size", Number),
                ("duration", Number),
                ("price", Number),
                ("status", Text),
                ("notes", Text),
            ],
        )
        .required(&["customer_name", "booking_date", "booking_time", "booking_type"])
        .enum_field("booking_type", BOOKING_TYPES, "spa")
        .enum_field("status", BOOKING_STATUSES, "pending")
        .default_value("status", json!("pending")),

        TableName::Customers => TableSchema::new(
            table,
            &[
                ("name", Text),
                ("email", Email),
                ("phone", Text),
                ("address", Text),
                ("notes", Text),
                ("loyalty_points", Number),
                ("total_visits", Number),
                ("total_spent", Number),
            ],
        )
        .required(&["name"])
        .default_value("loyalty_points", json!(0))
        .default_value("total_visits", json!(0)),

        TableName::Transactions => TableSchema::new(
            table,
            &[
                ("customer_id", Text),
                ("customer_name", Text),
                ("booking_id", Text),
                ("staff_id", Text),
                ("transaction_date", Text),
                ("subtotal", Number),
                ("tax_amount", Number),
                ("tip_amount", Number),
                ("discount_amount", Number),
                ("total_amount", Number),
                ("payment_method", Text),
                ("payment_status", Text),
                ("receipt_number", Text),
                ("fiscal_status", Text),
                ("fiscal_receipt_id", Text),
                ("notes", Text),
            ],
        )
        .required(&["transaction_date", "total_amount"])
        .enum_field("payment_method", PAYMENT_METHODS, "cash")
        .enum_field("payment_status", PAYMENT_STATUSES, "completed")
        .enum_field("fiscal_status", FISCAL_STATUSES, "pending")
        .default_value("payment_method", json!("cash"))
        .default_value("payment_status", json!("completed"))
        .default_value("tax_amount", json!(0))
        .default_value("tip_amount", json!(0)),

        TableName::TransactionItems => TableSchema::new(
            table,
            &[
                ("transaction_id", Text),
                ("item_type", Text),
                ("item_id", Text),
                ("item_name", Text),
                ("quantity", Number),
                ("price", Number),
                ("total_price", Number),
                ("staff_id", Text),
            ],
        )
        .required(&["transaction_id", "item_name", "price"])
        .enum_field("item_type", ITEM_TYPES, "service")
        .default_value("quantity", json!(1)),

        TableName::Staff => TableSchema::new(
            table,
            &[
                ("name", Text),
                ("email", Email),
                ("phone", Text),
                ("role", Text),
                ("specialties", Text),
                ("commission_rate", Number),
                ("hire_date", Text),
                ("is_active", Boolean),
            ],
        )
        .required(&["name", "role"])
        .enum_field("role", STAFF_ROLES, "receptionist")
        .default_value("role", json!("receptionist"))
        .default_value("is_active", json!(true)),

        TableName::SpaServices => TableSchema::new(
            table,
            &[
                ("name", Text),
                ("description", Text),
                ("category", Text),
                ("duration", Number),
                ("price", Number),
                ("is_active", Boolean),
            ],
        )
        .required(&["name", "price"])
        .default_value("duration", json!(60))
        .default_value("category", json!("general"))
        .default_value("is_active", json!(true)),

        TableName::MenuItems => TableSchema::new(
            table,
            &[
                ("name", Text),
                ("description", Text),
                ("category", Text),
                ("price", Number),
                ("preparation_time", Number),
                ("is_available", Boolean),
            ],
        )
        .required(&["name", "price"])
        .default_value("category", json!("food"))
        .default_value("is_available", json!(true)),

        TableName::Inventory => TableSchema::new(
            table,
            &[
                ("name", Text),
                ("category", Text),
                ("quantity", Number),
                ("unit", Text),
                ("reorder_level", Number),
                ("cost_price", Number),
                ("supplier", Text),
                ("last_restocked", Text),
            ],
        )
        .required(&["name"])
        .default_value("quantity", json!(0))
        .default_value("reorder_level", json!(0)),

        TableName::BusinessSettings => TableSchema::new(
            table,
            &[
                ("business_name", Text),
                ("address", Text),
                ("phone", Text),
                ("email", Email),
                ("tax_number", Text),
                ("vat_number", Text),
                ("currency", Text),
                ("tax_rate", Number),
                ("receipt_footer", Text),
                ("logo_url", Text),
            ],
        )
        .required(&["business_name"])
        .default_value("currency", json!("USD"))
        .default_value("tax_rate", json!(15)),

        TableName::GeneralSettings => TableSchema::new(
            table,
            &[
                ("theme", Text),
                ("language", Text),
                ("timezone", Text),
                ("date_format", Text),
                ("notifications_enabled", Boolean),
                ("auto_sync", Boolean),
                ("sync_interval", Number),
            ],
        )
        .enum_field("theme", THEMES, "system")
        .default_value("theme", json!("system"))
        .default_value("language", json!("en"))
        .default_value("timezone", json!("Africa/Harare"))
        .default_value("notifications_enabled", json!(true))
        .default_value("auto_sync", json!(true))
        .default_value("sync_interval", json!(5)),

        TableName::Feedback => TableSchema::new(
            table,
            &[
                ("customer_id", Text),
                ("customer_name", Text),
                ("booking_id", Text),
                ("transaction_id", Text),
                ("rating", Number),
                ("comment", Text),
                ("category", Text),
                ("status", Text),
            ],
        )
        .required(&["rating"])
        .enum_field("category", FEEDBACK_CATEGORIES, "other")
        .enum_field("status", FEEDBACK_STATUSES, "new")
        .default_value("category", json!("other"))
        .default_value("status", json!("new")),
    }
}
