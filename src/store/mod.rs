// ============================================================================
// Record Stores
// ============================================================================
//
// Persistence behind traits, so the aggregate never sees the engine:
// - OrderStore: orders with their embedded items, atomic inserts
// - SeedStore: the bulk writes and emptiness checks seeding needs
// - CustomerDirectory / ProductCatalog (declared in the domain) for lookups
//
// Two implementations: InMemoryStore (default, tests) and PostgresStore.
//
// ============================================================================

mod memory;
mod postgres;

use async_trait::async_trait;

use crate::domain::customer::Customer;
use crate::domain::order::{Order, OrderId, OrderQuery, OrderStatus};
use crate::domain::product::Product;
use crate::utils::IsTransient;

pub use memory::InMemoryStore;
pub use postgres::PostgresStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

impl IsTransient for StoreError {
    fn is_transient(&self) -> bool {
        match self {
            StoreError::Unavailable(_) => true,
            StoreError::Database(e) => matches!(
                e,
                sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed
            ),
            StoreError::Conflict(_) | StoreError::Corrupt(_) => false,
        }
    }
}

/// Key-indexed storage of orders. An order and its items are one record:
/// they become visible together and are deleted together.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Insert one order. Fails with `Conflict` if the id is taken.
    async fn insert(&self, order: &Order) -> Result<(), StoreError>;

    /// Insert every order or none of them.
    async fn insert_batch(&self, orders: &[Order]) -> Result<(), StoreError>;

    async fn get(&self, id: OrderId) -> Result<Option<Order>, StoreError>;

    /// Set the status if it is still `expected`. Returns `false` when the
    /// order does not exist or its status has moved on.
    async fn update_status(&self, id: OrderId, expected: OrderStatus, status: OrderStatus) -> Result<bool, StoreError>;

    /// Matching orders for the requested page (newest first) and the total match count.
    async fn list(&self, query: &OrderQuery) -> Result<(Vec<Order>, u64), StoreError>;

    /// Administrative removal; the order's items go with it.
    async fn delete(&self, id: OrderId) -> Result<bool, StoreError>;

    async fn count(&self) -> Result<u64, StoreError>;
}

/// Writes used only by start-up seeding
#[async_trait]
pub trait SeedStore: Send + Sync {
    async fn product_count(&self) -> Result<u64, StoreError>;

    async fn customer_count(&self) -> Result<u64, StoreError>;

    async fn insert_products(&self, products: &[Product]) -> Result<(), StoreError>;

    async fn insert_customers(&self, customers: &[Customer]) -> Result<(), StoreError>;

    /// Product with the lowest id
    async fn first_product(&self) -> Result<Option<Product>, StoreError>;

    /// Customer with the lowest id
    async fn first_customer(&self) -> Result<Option<Customer>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(StoreError::Unavailable("connection reset".into()).is_transient());
        assert!(StoreError::Database(sqlx::Error::PoolTimedOut).is_transient());
        assert!(!StoreError::Conflict("duplicate order id".into()).is_transient());
        assert!(!StoreError::Corrupt("bad status".into()).is_transient());
        assert!(!StoreError::Database(sqlx::Error::RowNotFound).is_transient());
    }
}
