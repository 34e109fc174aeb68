pub mod types;

pub use types::{Booking, BookingStatus, BookingType};

use crate::domains::core::repository::{filter_by, EntityRepository};
use crate::errors::DomainResult;

pub type BookingRepository = EntityRepository<Booking>;

impl EntityRepository<Booking> {
    pub async fn find_by_date(&self, booking_date: &str) -> DomainResult<Vec<Booking>> {
        self.find_where(&filter_by("booking_date", booking_date)).await
    }

    pub async fn find_by_status(&self, status: BookingStatus) -> DomainResult<Vec<Booking>> {
        self.find_where(&filter_by("status", status.as_str())).await
    }

    pub async fn set_status(&self, id: &str, status: BookingStatus) -> DomainResult<Booking> {
        let patch = Booking {
            status: Some(status.as_str().to_string()),
            ..Booking::default()
        };
        self.update(id, &patch).await
    }
}
