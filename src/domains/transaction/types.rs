use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domains::core::repository::TableEntity;
use crate::types::{deserialize_lenient_bool, deserialize_lenient_f64, TableName};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    Ecocash,
    BankTransfer,
    Other,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::Ecocash => "ecocash",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::Other => "other",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "cash" => Some(PaymentMethod::Cash),
            "card" => Some(PaymentMethod::Card),
            "ecocash" => Some(PaymentMethod::Ecocash),
            "bank_transfer" => Some(PaymentMethod::BankTransfer),
            "other" => Some(PaymentMethod::Other),
            _ => None,
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A completed sale at the POS.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub booking_id: Option<String>,
    #[serde(default)]
    pub staff_id: Option<String>,
    #[serde(default)]
    pub transaction_date: Option<String>,
    #[serde(default, deserialize_with = "deserialize_lenient_f64")]
    pub subtotal: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_lenient_f64")]
    pub tax_amount: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_lenient_f64")]
    pub tip_amount: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_lenient_f64")]
    pub discount_amount: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_lenient_f64")]
    pub total_amount: Option<f64>,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub payment_status: Option<String>,
    #[serde(default)]
    pub receipt_number: Option<String>,
    #[serde(default)]
    pub fiscal_status: Option<String>,
    #[serde(default)]
    pub fiscal_receipt_id: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default, skip_serializing)]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing)]
    pub updated_at: Option<String>,
    #[serde(default, deserialize_with = "deserialize_lenient_bool", skip_serializing)]
    pub is_synced: Option<bool>,
}

impl Transaction {
    pub fn method(&self) -> Option<PaymentMethod> {
        self.payment_method.as_deref().and_then(PaymentMethod::from_str)
    }
}

impl TableEntity for Transaction {
    const TABLE: TableName = TableName::Transactions;
}

/// One line of a transaction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub item_type: Option<String>,
    #[serde(default)]
    pub item_id: Option<String>,
    #[serde(default)]
    pub item_name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_lenient_f64")]
    pub quantity: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_lenient_f64")]
    pub price: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_lenient_f64")]
    pub total_price: Option<f64>,
    #[serde(default)]
    pub staff_id: Option<String>,
    #[serde(default, skip_serializing)]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing)]
    pub updated_at: Option<String>,
    #[serde(default, deserialize_with = "deserialize_lenient_bool", skip_serializing)]
    pub is_synced: Option<bool>,
}

impl TableEntity for TransactionItem {
    const TABLE: TableName = TableName::TransactionItems;
}
