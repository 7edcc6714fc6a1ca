use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;

use crate::store::StoreError;
use super::entity::Product;
use super::value_objects::ProductId;

/// Read-only view of the product catalog used at order creation time
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Batch lookup. Ids with no matching product are simply absent from the map.
    async fn find_many(&self, ids: &BTreeSet<ProductId>) -> Result<HashMap<ProductId, Product>, StoreError>;
}
