use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use crate::domain::customer::{Customer, CustomerDirectory, CustomerId};
use crate::domain::order::{Order, OrderId, OrderQuery, OrderStatus};
use crate::domain::product::{Product, ProductCatalog, ProductId};
use super::{OrderStore, SeedStore, StoreError};

// ============================================================================
// In-Memory Store
// ============================================================================
//
// One lock guards all three collections, so a batch insert is checked and
// applied under a single write guard and readers never see half of it.
//
// ============================================================================

#[derive(Default)]
struct State {
    orders: HashMap<OrderId, Order>,
    customers: BTreeMap<CustomerId, Customer>,
    products: BTreeMap<ProductId, Product>,
}

#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store preloaded with catalog and directory records
    pub fn with_records(products: Vec<Product>, customers: Vec<Customer>) -> Self {
        let state = State {
            orders: HashMap::new(),
            customers: customers.into_iter().map(|c| (c.id, c)).collect(),
            products: products.into_iter().map(|p| (p.id, p)).collect(),
        };
        Self {
            state: RwLock::new(state),
        }
    }

    /// Change a product's current list price. Returns `false` for an unknown product.
    pub async fn set_product_price(&self, id: ProductId, price: Decimal) -> bool {
        match self.state.write().await.products.get_mut(&id) {
            Some(product) => {
                product.price = price;
                true
            }
            None => false,
        }
    }

    /// Orders referencing the customer keep their reference.
    pub async fn remove_customer(&self, id: CustomerId) -> bool {
        self.state.write().await.customers.remove(&id).is_some()
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn insert(&self, order: &Order) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if state.orders.contains_key(&order.id()) {
            return Err(StoreError::Conflict(format!("order {} already exists", order.id())));
        }
        state.orders.insert(order.id(), order.clone());
        Ok(())
    }

    async fn insert_batch(&self, orders: &[Order]) -> Result<(), StoreError> {
        let mut state = self.state.write().await;

        let mut seen = HashSet::with_capacity(orders.len());
        for order in orders {
            if state.orders.contains_key(&order.id()) || !seen.insert(order.id()) {
                return Err(StoreError::Conflict(format!("order {} already exists", order.id())));
            }
        }

        for order in orders {
            state.orders.insert(order.id(), order.clone());
        }
        Ok(())
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        Ok(self.state.read().await.orders.get(&id).cloned())
    }

    async fn update_status(&self, id: OrderId, expected: OrderStatus, status: OrderStatus) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        let Some(stored) = state.orders.get(&id) else {
            return Ok(false);
        };
        if stored.status() != expected {
            return Ok(false);
        }

        let updated = Order::restore(
            stored.id(),
            stored.customer_id(),
            stored.currency().clone(),
            stored.order_date_utc(),
            status,
            stored.items().to_vec(),
        );
        state.orders.insert(id, updated);
        Ok(true)
    }

    async fn list(&self, query: &OrderQuery) -> Result<(Vec<Order>, u64), StoreError> {
        let state = self.state.read().await;

        let mut matching: Vec<&Order> = state
            .orders
            .values()
            .filter(|order| query.matches(order.order_date_utc()))
            .collect();
        matching.sort_by(|a, b| {
            b.order_date_utc()
                .cmp(&a.order_date_utc())
                .then_with(|| a.id().cmp(&b.id()))
        });

        let total = matching.len() as u64;
        let page = matching
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.limit() as usize)
            .cloned()
            .collect();

        Ok((page, total))
    }

    async fn delete(&self, id: OrderId) -> Result<bool, StoreError> {
        Ok(self.state.write().await.orders.remove(&id).is_some())
    }

    async fn count(&self) -> Result<u64, StoreError> {
        Ok(self.state.read().await.orders.len() as u64)
    }
}

#[async_trait]
impl CustomerDirectory for InMemoryStore {
    async fn find(&self, id: CustomerId) -> Result<Option<Customer>, StoreError> {
        Ok(self.state.read().await.customers.get(&id).cloned())
    }
}

#[async_trait]
impl ProductCatalog for InMemoryStore {
    async fn find_many(&self, ids: &BTreeSet<ProductId>) -> Result<HashMap<ProductId, Product>, StoreError> {
        let state = self.state.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.products.get(id).map(|p| (*id, p.clone())))
            .collect())
    }
}

#[async_trait]
impl SeedStore for InMemoryStore {
    async fn product_count(&self) -> Result<u64, StoreError> {
        Ok(self.state.read().await.products.len() as u64)
    }

    async fn customer_count(&self) -> Result<u64, StoreError> {
        Ok(self.state.read().await.customers.len() as u64)
    }

    async fn insert_products(&self, products: &[Product]) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        for product in products {
            state.products.insert(product.id, product.clone());
        }
        Ok(())
    }

    async fn insert_customers(&self, customers: &[Customer]) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        for customer in customers {
            state.customers.insert(customer.id, customer.clone());
        }
        Ok(())
    }

    async fn first_product(&self) -> Result<Option<Product>, StoreError> {
        Ok(self.state.read().await.products.values().next().cloned())
    }

    async fn first_customer(&self) -> Result<Option<Customer>, StoreError> {
        Ok(self.state.read().await.customers.values().next().cloned())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
