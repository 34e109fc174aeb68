pub mod types;

pub use types::{PaymentMethod, Transaction, TransactionItem};

use crate::domains::core::repository::{filter_by, EntityRepository};
use crate::errors::DomainResult;

pub type TransactionRepository = EntityRepository<Transaction>;
pub type TransactionItemRepository = EntityRepository<TransactionItem>;

impl EntityRepository<Transaction> {
    pub async fn find_by_date(&self, transaction_date: &str) -> DomainResult<Vec<Transaction>> {
        self.find_where(&filter_by("transaction_date", transaction_date)).await
    }

    /// Sum of `total_amount` over one day's transactions.
    pub async fn daily_total(&self, transaction_date: &str) -> DomainResult<f64> {
        let transactions = self.find_by_date(transaction_date).await?;
        Ok(transactions.iter().filter_map(|t| t.total_amount).sum())
    }
}

impl EntityRepository<TransactionItem> {
    pub async fn find_for_transaction(&self, transaction_id: &str) -> DomainResult<Vec<TransactionItem>> {
        self.find_where(&filter_by("transaction_id", transaction_id)).await
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
    async fn test_items_and_daily_totals() {
        let store = Arc::new(
            LocalStore::open(Arc::new(MemoryPersistence::new()), None, StoreConfig::default())
                .await
                .unwrap(),
        );
        let transactions = TransactionRepository::new(store.clone());
        let items = TransactionItemRepository::new(store);

        let sale = transactions
            .create(&Transaction {
                customer_name: Some("Jane".into()),
                transaction_date: Some("2024-06-01".into()),
                total_amount: Some(52.5),
                payment_method: Some("ecocash".into()),
                ..Transaction::default()
            })
            .await
            .unwrap();
        transactions
            .create(&Transaction {
                transaction_date: Some("2024-06-01".into()),
                total_amount: Some(7.5),
                ..Transaction::default()
            })
            .await
            .unwrap();
        let sale_id = sale.id.clone().unwrap();
        assert_eq!(sale.method(), Some(PaymentMethod::Ecocash));

        for (name, price) in [("Swedish Massage", 45.0), ("Rooibos Tea", 7.5)] {
            items
                .create(&TransactionItem {
                    transaction_id: Some(sale_id.clone()),
                    item_name: Some(name.into()),
                    quantity: Some(1.0),
                    price: Some(price),
                    ..TransactionItem::default()
                })
                .await
                .unwrap();
        }

        assert_eq!(items.find_for_transaction(&sale_id).await.unwrap().len(), 2);
        assert_eq!(transactions.daily_total("2024-06-01").await.unwrap(), 60.0);
        assert_eq!(transactions.daily_total("2024-06-02").await.unwrap(), 0.0);
    }
}
