use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domains::core::repository::TableEntity;
use crate::types::{deserialize_lenient_bool, deserialize_lenient_f64, deserialize_lenient_string, TableName};

/// Booking type enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingType {
    Spa,
    Restaurant,
}

impl BookingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingType::Spa => "spa",
            BookingType::Restaurant => "restaurant",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "spa" => Some(BookingType::Spa),
            "restaurant" => Some(BookingType::Restaurant),
            _ => None,
        }
    }
}

impl fmt::Display for BookingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
    NoShow,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::NoShow => "no_show",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Some(BookingStatus::Pending),
            "confirmed" => Some(BookingStatus::Confirmed),
            "completed" => Some(BookingStatus::Completed),
            "cancelled" => Some(BookingStatus::Cancelled),
            "no_show" => Some(BookingStatus::NoShow),
            _ => None,
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A spa appointment or restaurant reservation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default, deserialize_with = "deserialize_lenient_string")]
    pub customer_phone: Option<String>,
    #[serde(default)]
    pub booking_date: Option<String>,
    #[serde(default)]
    pub booking_time: Option<String>,
    /// Raw stored value; see [`Booking::kind`].
    #[serde(default)]
    pub booking_type: Option<String>,
    #[serde(default)]
    pub service_id: Option<String>,
    #[serde(default)]
    pub service_name: Option<String>,
    #[serde(default)]
    pub staff_id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_lenient_f64")]
    pub party_size: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_lenient_f64")]
    pub duration: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_lenient_f64")]
    pub price: Option<f64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default, skip_serializing)]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing)]
    pub updated_at: Option<String>,
    #[serde(default, deserialize_with = "deserialize_lenient_bool", skip_serializing)]
    pub is_synced: Option<bool>,
}

impl Booking {
    pub fn kind(&self) -> Option<BookingType> {
        self.booking_type.as_deref().and_then(BookingType::from_str)
    }

    pub fn booking_status(&self) -> Option<BookingStatus> {
        self.status.as_deref().and_then(BookingStatus::from_str)
    }
}

impl TableEntity for Booking {
    const TABLE: TableName = TableName::Bookings;
}
