use serde_json::{json, Value};

use crate::types::{Record, TableName};

/// Built-in records for a fresh install with an empty remote store.
pub fn sample_records() -> Vec<(TableName, Vec<Record>)> {
    vec![
        (
            TableName::BusinessSettings,
            records(vec![json!({
                "business_name": "Serenity Spa & Bistro",
                "address": "12 Samora Machel Ave, Harare",
                "phone": "+263 242 000000",
                "email": "hello@serenity.example",
                "currency": "USD",
                "tax_rate": 15,
                "receipt_footer": "Thank you for visiting!"
            })]),
        ),
        (
            TableName::GeneralSettings,
            records(vec![json!({
                "theme": "system",
                "language": "en",
                "timezone": "Africa/Harare",
                "date_format": "yyyy-MM-dd",
                "notifications_enabled": true,
                "auto_sync": true,
                "sync_interval": 5
            })]),
        ),
        (
            TableName::Staff,
            records(vec![json!({
                "name": "Administrator",
                "email": "admin@serenity.example",
                "role": "admin",
                "commission_rate": 0,
                "is_active": true
            })]),
        ),
        (
            TableName::SpaServices,
            records(vec![
                json!({"name": "Swedish Massage", "category": "massage", "duration": 60, "price": 45, "is_active": true}),
                json!({"name": "Hot Stone Massage", "category": "massage", "duration": 90, "price": 65, "is_active": true}),
                json!({"name": "Classic Facial", "category": "facial", "duration": 45, "price": 35, "is_active": true}),
                json!({"name": "Manicure", "category": "nails", "duration": 30, "price": 20, "is_active": true}),
            ]),
        ),
        (
            TableName::MenuItems,
            records(vec![
                json!({"name": "Garden Salad", "category": "food", "price": 8, "preparation_time": 10, "is_available": true}),
                json!({"name": "Grilled Bream", "category": "food", "price": 16, "preparation_time": 25, "is_available": true}),
                json!({"name": "Rooibos Tea", "category": "drinks", "price": 3, "preparation_time": 5, "is_available": true}),
                json!({"name": "Fresh Juice", "category": "drinks", "price": 4, "preparation_time": 5, "is_available": true}),
            ]),
        ),
    ]
}

fn records(values: Vec<Value>) -> Vec<Record> {
    values
        .into_iter()
        .filter_map(|v| match v {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .collect()
}
