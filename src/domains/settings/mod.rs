pub mod types;

pub use types::{BusinessSettings, GeneralSettings};

use crate::domains::core::repository::{EntityRepository, TableEntity};
use crate::errors::DomainResult;

pub type BusinessSettingsRepository = EntityRepository<BusinessSettings>;
pub type GeneralSettingsRepository = EntityRepository<GeneralSettings>;

/// Settings tables hold a single row. Reads take the first row and writes
/// update it, creating it when the table is empty.
async fn current_row<T: TableEntity>(repo: &EntityRepository<T>) -> DomainResult<Option<T>> {
    Ok(repo.find_all().await?.into_iter().next())
}

impl EntityRepository<BusinessSettings> {
    pub async fn current(&self) -> DomainResult<Option<BusinessSettings>> {
        current_row(self).await
    }

    pub async fn save(&self, settings: &BusinessSettings) -> DomainResult<BusinessSettings> {
        match self.current().await?.and_then(|s| s.id) {
            Some(id) => self.update(&id, settings).await,
            None => self.create(settings).await,
        }
    }
}

impl EntityRepository<GeneralSettings> {
    pub async fn current(&self) -> DomainResult<Option<GeneralSettings>> {
        current_row(self).await
    }

    pub async fn save(&self, settings: &GeneralSettings) -> DomainResult<GeneralSettings> {
        match self.current().await?.and_then(|s| s.id) {
            Some(id) => self.update(&id, settings).await,
            None => self.create(settings).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::domains::core::persistence::MemoryPersistence;
    use crate::domains::core::record_store::LocalStore;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_save_keeps_a_single_row() {
        let store = LocalStore::open(Arc::new(MemoryPersistence::new()), None, StoreConfig::default())
            .await
            .unwrap();
        let settings = GeneralSettingsRepository::new(Arc::new(store));
        assert!(settings.current().await.unwrap().is_none());

        settings
            .save(&GeneralSettings {
                theme: Some("dark".into()),
                language: Some("en".into()),
                ..GeneralSettings::default()
            })
            .await
            .unwrap();
        let saved = settings
            .save(&GeneralSettings {
                theme: Some("light".into()),
                ..GeneralSettings::default()
            })
            .await
            .unwrap();

        assert_eq!(saved.theme.as_deref(), Some("light"));
        assert_eq!(saved.language.as_deref(), Some("en"));
        assert_eq!(settings.find_all().await.unwrap().len(), 1);
    }
}
