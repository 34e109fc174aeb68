use serde::{Deserialize, Serialize};

use crate::domains::core::repository::TableEntity;
use crate::types::{deserialize_lenient_bool, deserialize_lenient_f64, TableName};

/// A bookable spa treatment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpaService {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    /// Minutes.
    #[serde(default, deserialize_with = "deserialize_lenient_f64")]
    pub duration: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_lenient_f64")]
    pub price: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_lenient_bool")]
    pub is_active: Option<bool>,
    #[serde(default, skip_serializing)]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing)]
    pub updated_at: Option<String>,
    #[serde(default, deserialize_with = "deserialize_lenient_bool", skip_serializing)]
    pub is_synced: Option<bool>,
}

impl TableEntity for SpaService {
    const TABLE: TableName = TableName::SpaServices;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MenuItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "deserialize_lenient_f64")]
    pub price: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_lenient_f64")]
    pub preparation_time: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_lenient_bool")]
    pub is_available: Option<bool>,
    #[serde(default, skip_serializing)]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing)]
    pub updated_at: Option<String>,
    #[serde(default, deserialize_with = "deserialize_lenient_bool", skip_serializing)]
    pub is_synced: Option<bool>,
}

impl TableEntity for MenuItem {
    const TABLE: TableName = TableName::MenuItems;
}

/// Stock kept for the spa and the kitchen.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "deserialize_lenient_f64")]
    pub quantity: Option<f64>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default, deserialize_with = "deserialize_lenient_f64")]
    pub reorder_level: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_lenient_f64")]
    pub cost_price: Option<f64>,
    #[serde(default)]
    pub supplier: Option<String>,
    #[serde(default)]
    pub last_restocked: Option<String>,
    #[serde(default, skip_serializing)]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing)]
    pub updated_at: Option<String>,
    #[serde(default, deserialize_with = "deserialize_lenient_bool", skip_serializing)]
    pub is_synced: Option<bool>,
}

impl InventoryItem {
    pub fn needs_reorder(&self) -> bool {
        match (self.quantity, self.reorder_level) {
            (Some(quantity), Some(level)) => quantity <= level,
            _ => false,
        }
    }
}

impl TableEntity for InventoryItem {
    const TABLE: TableName = TableName::Inventory;
}
