pub mod types;

pub use types::Customer;

use crate::domains::core::repository::{filter_by, EntityRepository};
use crate::errors::DomainResult;

pub type CustomerRepository = EntityRepository<Customer>;

impl EntityRepository<Customer> {
    /// Lookup by email, ignoring case and surrounding whitespace.
    pub async fn find_by_email(&self, email: &str) -> DomainResult<Option<Customer>> {
        let wanted = email.trim().to_lowercase();
        if wanted.is_empty() {
            return Ok(None);
        }
        let exact = self.find_where(&filter_by("email", wanted.as_str())).await?;
        if let Some(found) = exact.into_iter().next() {
            return Ok(Some(found));
        }
        Ok(self.find_all().await?.into_iter().find(|c| {
            c.email
                .as_deref()
                .map(|e| e.trim().to_lowercase() == wanted)
                .unwrap_or(false)
        }))
    }

    pub async fn find_by_phone(&self, phone: &str) -> DomainResult<Vec<Customer>> {
        self.find_where(&filter_by("phone", phone.trim())).await
    }

    /// Add a completed visit to the customer's running totals.
    pub async fn record_visit(&self, id: &str, amount_spent: f64, points_earned: f64) -> DomainResult<Customer> {
        let current = self.find_by_id(id).await?;
        let patch = Customer {
            total_visits: Some(current.total_visits.unwrap_or(0.0) + 1.0),
            total_spent: Some(current.total_spent.unwrap_or(0.0) + amount_spent),
            loyalty_points: Some(current.loyalty_points.unwrap_or(0.0) + points_earned),
            ..Customer::default()
        };
        self.update(id, &patch).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::domains::core::persistence::MemoryPersistence;
    use crate::domains::core::record_store::LocalStore;
    use std::sync::Arc;

    async fn repository() -> CustomerRepository {
        let store = LocalStore::open(Arc::new(MemoryPersistence::new()), None, StoreConfig::default())
            .await
            .unwrap();
        CustomerRepository::new(Arc::new(store))
    }

    #[tokio::test]
    async fn test_find_by_email_ignores_case() {
        let repo = repository().await;
        repo.create(&Customer {
            name: Some("Chipo".into()),
            email: Some("Chipo@Example.com".into()),
            ..Customer::default()
        })
        .await
        .unwrap();

        let found = repo.find_by_email(" chipo@example.com ").await.unwrap();
        assert_eq!(found.and_then(|c| c.name), Some("Chipo".to_string()));
        assert!(repo.find_by_email("").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_record_visit_accumulates_totals() {
        let repo = repository().await;
        let created = repo
            .create(&Customer {
                name: Some("Farai".into()),
                phone: Some("0772000000".into()),
                ..Customer::default()
            })
            .await
            .unwrap();
        let id = created.id.unwrap();

        repo.record_visit(&id, 40.0, 4.0).await.unwrap();
        let after = repo.record_visit(&id, 10.5, 1.0).await.unwrap();
        assert_eq!(after.total_visits, Some(2.0));
        assert_eq!(after.total_spent, Some(50.5));
        assert_eq!(after.loyalty_points, Some(5.0));
        assert_eq!(repo.find_by_phone("0772000000").await.unwrap().len(), 1);
    }
}
