use serde::{Deserialize, Serialize};

use crate::domains::core::repository::TableEntity;
use crate::types::{deserialize_lenient_bool, deserialize_lenient_f64, TableName};

/// Guest feedback on a visit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub booking_id: Option<String>,
    #[serde(default)]
    pub transaction_id: Option<String>,
    /// 1 to 5.
    #[serde(default, deserialize_with = "deserialize_lenient_f64")]
    pub rating: Option<f64>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, skip_serializing)]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing)]
    pub updated_at: Option<String>,
    #[serde(default, deserialize_with = "deserialize_lenient_bool", skip_serializing)]
    pub is_synced: Option<bool>,
}

impl TableEntity for Feedback {
    const TABLE: TableName = TableName::Feedback;
}
