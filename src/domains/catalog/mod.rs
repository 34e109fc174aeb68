pub mod types;

pub use types::{InventoryItem, MenuItem, SpaService};

use crate::domains::core::repository::{filter_by, EntityRepository};
use crate::errors::DomainResult;

pub type SpaServiceRepository = EntityRepository<SpaService>;
pub type MenuItemRepository = EntityRepository<MenuItem>;
pub type InventoryRepository = EntityRepository<InventoryItem>;

impl EntityRepository<SpaService> {
    pub async fn find_active(&self) -> DomainResult<Vec<SpaService>> {
        Ok(self
            .find_all()
            .await?
            .into_iter()
            .filter(|s| s.is_active.unwrap_or(true))
            .collect())
    }
}

impl EntityRepository<MenuItem> {
    /// Available items of one category, in menu order.
    pub async fn find_available(&self, category: &str) -> DomainResult<Vec<MenuItem>> {
        Ok(self
            .find_where(&filter_by("category", category))
            .await?
            .into_iter()
            .filter(|m| m.is_available.unwrap_or(true))
            .collect())
    }
}

impl EntityRepository<InventoryItem> {
    pub async fn find_low_stock(&self) -> DomainResult<Vec<InventoryItem>> {
        Ok(self
            .find_all()
            .await?
            .into_iter()
            .filter(InventoryItem::needs_reorder)
            .collect())
    }

    /// Add stock and stamp the restock date.
    pub async fn restock(&self, id: &str, amount: f64, date: &str) -> DomainResult<InventoryItem> {
        let current = self.find_by_id(id).await?;
        let patch = InventoryItem {
            quantity: Some(current.quantity.unwrap_or(0.0) + amount),
            last_restocked: Some(date.to_string()),
            ..InventoryItem::default()
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

    async fn store() -> Arc<LocalStore> {
        Arc::new(
            LocalStore::open(Arc::new(MemoryPersistence::new()), None, StoreConfig::default())
                .await
                .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_menu_filters_unavailable_items() {
        let menu = MenuItemRepository::new(store().await);
        for (name, available) in [("Tea", true), ("Coffee", false)] {
            menu.create(&MenuItem {
                name: Some(name.into()),
                category: Some("drinks".into()),
                price: Some(3.0),
                is_available: Some(available),
                ..MenuItem::default()
            })
            .await
            .unwrap();
        }

        let drinks = menu.find_available("drinks").await.unwrap();
        assert_eq!(drinks.len(), 1);
        assert_eq!(drinks[0].name.as_deref(), Some("Tea"));
    }

    #[tokio::test]
    async fn test_restock_clears_low_stock() {
        let inventory = InventoryRepository::new(store().await);
        let oil = inventory
            .create(&InventoryItem {
                name: Some("Massage oil".into()),
                quantity: Some(2.0),
                reorder_level: Some(5.0),
                ..InventoryItem::default()
            })
            .await
            .unwrap();
        assert_eq!(inventory.find_low_stock().await.unwrap().len(), 1);

        let restocked = inventory
            .restock(oil.id.as_deref().unwrap(), 10.0, "2024-06-01")
            .await
            .unwrap();
        assert_eq!(restocked.quantity, Some(12.0));
        assert!(inventory.find_low_stock().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_inactive_services_are_hidden() {
        let services = SpaServiceRepository::new(store().await);
        services
            .create(&SpaService {
                name: Some("Retired Wrap".into()),
                is_active: Some(false),
                ..SpaService::default()
            })
            .await
            .unwrap();
        services
            .create(&SpaService {
                name: Some("Facial".into()),
                ..SpaService::default()
            })
            .await
            .unwrap();
        assert_eq!(services.find_active().await.unwrap().len(), 1);
    }
}
