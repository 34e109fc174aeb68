pub mod types;

pub use types::{StaffMember, StaffRole};

use crate::domains::core::repository::{filter_by, EntityRepository};
use crate::errors::DomainResult;

pub type StaffRepository = EntityRepository<StaffMember>;

impl EntityRepository<StaffMember> {
    pub async fn find_active_by_role(&self, role: StaffRole) -> DomainResult<Vec<StaffMember>> {
        Ok(self
            .find_where(&filter_by("role", role.as_str()))
            .await?
            .into_iter()
            .filter(|s| s.is_active.unwrap_or(true))
            .collect())
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
    async fn test_find_active_therapists() {
        let store = LocalStore::open(Arc::new(MemoryPersistence::new()), None, StoreConfig::default())
            .await
            .unwrap();
        let staff = StaffRepository::new(Arc::new(store));
        for (name, role, active) in [("Rudo", "therapist", true), ("Nyasha", "therapist", false), ("Tendai", "chef", true)] {
            staff
                .create(&StaffMember {
                    name: Some(name.into()),
                    role: Some(role.into()),
                    is_active: Some(active),
                    ..StaffMember::default()
                })
                .await
                .unwrap();
        }

        let therapists = staff.find_active_by_role(StaffRole::Therapist).await.unwrap();
        assert_eq!(therapists.len(), 1);
        assert_eq!(therapists[0].staff_role(), Some(StaffRole::Therapist));
    }
}
