pub mod types;

pub use types::Feedback;

use crate::domains::core::repository::{filter_by, EntityRepository};
use crate::errors::DomainResult;

pub type FeedbackRepository = EntityRepository<Feedback>;

impl EntityRepository<Feedback> {
    pub async fn find_new(&self) -> DomainResult<Vec<Feedback>> {
        self.find_where(&filter_by("status", "new")).await
    }

    /// Mean rating over all feedback that has one.
    pub async fn average_rating(&self) -> DomainResult<Option<f64>> {
        let ratings: Vec<f64> = self.find_all().await?.iter().filter_map(|f| f.rating).collect();
        if ratings.is_empty() {
            return Ok(None);
        }
        Ok(Some(ratings.iter().sum::<f64>() / ratings.len() as f64))
    }
}
