use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domains::core::repository::TableEntity;
use crate::types::{deserialize_lenient_bool, deserialize_lenient_f64, deserialize_lenient_string, TableName};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaffRole {
    Admin,
    Manager,
    Therapist,
    Chef,
    Waiter,
    Cashier,
    Receptionist,
}

impl StaffRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            StaffRole::Admin => "admin",
            StaffRole::Manager => "manager",
            StaffRole::Therapist => "therapist",
            StaffRole::Chef => "chef",
            StaffRole::Waiter => "waiter",
            StaffRole::Cashier => "cashier",
            StaffRole::Receptionist => "receptionist",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Some(StaffRole::Admin),
            "manager" => Some(StaffRole::Manager),
            "therapist" => Some(StaffRole::Therapist),
            "chef" => Some(StaffRole::Chef),
            "waiter" => Some(StaffRole::Waiter),
            "cashier" => Some(StaffRole::Cashier),
            "receptionist" => Some(StaffRole::Receptionist),
            _ => None,
        }
    }
}

impl fmt::Display for StaffRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StaffMember {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "deserialize_lenient_string")]
    pub phone: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    /// Free text, comma separated.
    #[serde(default)]
    pub specialties: Option<String>,
    /// Percent of service revenue.
    #[serde(default, deserialize_with = "deserialize_lenient_f64")]
    pub commission_rate: Option<f64>,
    #[serde(default)]
    pub hire_date: Option<String>,
    #[serde(default, deserialize_with = "deserialize_lenient_bool")]
    pub is_active: Option<bool>,
    #[serde(default, skip_serializing)]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing)]
    pub updated_at: Option<String>,
    #[serde(default, deserialize_with = "deserialize_lenient_bool", skip_serializing)]
    pub is_synced: Option<bool>,
}

impl StaffMember {
    pub fn staff_role(&self) -> Option<StaffRole> {
        self.role.as_deref().and_then(StaffRole::from_str)
    }
}

impl TableEntity for StaffMember {
    const TABLE: TableName = TableName::Staff;
}
