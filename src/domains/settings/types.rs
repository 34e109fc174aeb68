use serde::{Deserialize, Serialize};

use crate::domains::core::repository::TableEntity;
use crate::types::{deserialize_lenient_bool, deserialize_lenient_f64, deserialize_lenient_string, TableName};

/// Business identity printed on receipts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BusinessSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub business_name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default, deserialize_with = "deserialize_lenient_string")]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "deserialize_lenient_string")]
    pub tax_number: Option<String>,
    #[serde(default, deserialize_with = "deserialize_lenient_string")]
    pub vat_number: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    /// Percent.
    #[serde(default, deserialize_with = "deserialize_lenient_f64")]
    pub tax_rate: Option<f64>,
    #[serde(default)]
    pub receipt_footer: Option<String>,
    #[serde(default)]
    pub logo_url: Option<String>,
    #[serde(default, skip_serializing)]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing)]
    pub updated_at: Option<String>,
    #[serde(default, deserialize_with = "deserialize_lenient_bool", skip_serializing)]
    pub is_synced: Option<bool>,
}

impl TableEntity for BusinessSettings {
    const TABLE: TableName = TableName::BusinessSettings;
}

/// Device preferences.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeneralSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub theme: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub date_format: Option<String>,
    #[serde(default, deserialize_with = "deserialize_lenient_bool")]
    pub notifications_enabled: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_lenient_bool")]
    pub auto_sync: Option<bool>,
    /// Minutes.
    #[serde(default, deserialize_with = "deserialize_lenient_f64")]
    pub sync_interval: Option<f64>,
    #[serde(default, skip_serializing)]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing)]
    pub updated_at: Option<String>,
    #[serde(default, deserialize_with = "deserialize_lenient_bool", skip_serializing)]
    pub is_synced: Option<bool>,
}

impl TableEntity for GeneralSettings {
    const TABLE: TableName = TableName::GeneralSettings;
}
