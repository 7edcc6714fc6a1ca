use async_trait::async_trait;

use crate::store::StoreError;
use super::entity::Customer;
use super::value_objects::CustomerId;

/// Lookup of customers by id
#[async_trait]
pub trait CustomerDirectory: Send + Sync {
    async fn find(&self, id: CustomerId) -> Result<Option<Customer>, StoreError>;
}
