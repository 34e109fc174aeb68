use serde::{Deserialize, Serialize};

use crate::domains::core::repository::TableEntity;
use crate::types::{deserialize_lenient_bool, deserialize_lenient_f64, deserialize_lenient_string, TableName};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "deserialize_lenient_string")]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default, deserialize_with = "deserialize_lenient_f64")]
    pub loyalty_points: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_lenient_f64")]
    pub total_visits: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_lenient_f64")]
    pub total_spent: Option<f64>,
    #[serde(default, skip_serializing)]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing)]
    pub updated_at: Option<String>,
    #[serde(default, deserialize_with = "deserialize_lenient_bool", skip_serializing)]
    pub is_synced: Option<bool>,
}

impl TableEntity for Customer {
    const TABLE: TableName = TableName::Customers;
}
