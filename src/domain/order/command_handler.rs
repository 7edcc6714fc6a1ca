use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;

use crate::domain::customer::CustomerDirectory;
use crate::domain::product::{ProductCatalog, ProductId};
use crate::domain::validation::{Validatable, ValidationErrors};
use crate::metrics::Metrics;
use crate::store::{OrderStore, StoreError};

use super::aggregate::{NewOrderItem, Order, StatusPolicy};
use super::commands::{CreateOrderRequest, OrderFilter, OrderPage};
use super::errors::{Entity, OrderError};
use super::value_objects::{Currency, OrderId, OrderStatus};

// ============================================================================
// Order Service
// ============================================================================
//
// Orchestrates: Request → Validation → Lookups → Aggregate → Store
//
// ============================================================================

const STATUS_UPDATE_ATTEMPTS: u32 = 3;

/// Tunables the service needs from configuration
#[derive(Debug, Clone)]
pub struct OrderSettings {
    pub default_currency: Currency,
    pub status_policy: StatusPolicy,
    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl Default for OrderSettings {
    fn default() -> Self {
        Self {
            default_currency: Currency::default(),
            status_policy: StatusPolicy::Strict,
            default_page_size: 20,
            max_page_size: 100,
        }
    }
}

pub struct OrderService {
    orders: Arc<dyn OrderStore>,
    customers: Arc<dyn CustomerDirectory>,
    catalog: Arc<dyn ProductCatalog>,
    settings: OrderSettings,
    metrics: Arc<Metrics>,
}

impl OrderService {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        customers: Arc<dyn CustomerDirectory>,
        catalog: Arc<dyn ProductCatalog>,
        settings: OrderSettings,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            orders,
            customers,
            catalog,
            settings,
            metrics,
        }
    }

    /// Service over a single store that plays all three collaborator roles
    pub fn from_store<S>(store: Arc<S>, settings: OrderSettings, metrics: Arc<Metrics>) -> Self
    where
        S: OrderStore + CustomerDirectory + ProductCatalog + 'static,
    {
        Self::new(store.clone(), store.clone(), store, settings, metrics)
    }

    /// Validate, resolve the customer and products, freeze prices and persist.
    pub async fn create_order(&self, request: CreateOrderRequest) -> Result<Order, OrderError> {
        let timer = self.metrics.order_create_duration.start_timer();
        let result = self.try_create_order(&request).await;
        timer.observe_duration();

        match &result {
            Ok(order) => {
                self.metrics.orders_created.inc();
                tracing::info!(
                    order_id = %order.id(),
                    customer_id = %request.customer_id,
                    item_count = order.items().len(),
                    total = %order.total_amount(),
                    currency = %order.currency(),
                    "✅ Order created"
                );
            }
            Err(e) => {
                self.metrics
                    .order_create_rejected
                    .with_label_values(&[e.reason()])
                    .inc();
                tracing::warn!(
                    customer_id = %request.customer_id,
                    reason = e.reason(),
                    error = %e,
                    "Order creation rejected"
                );
            }
        }

        result
    }

    async fn try_create_order(&self, request: &CreateOrderRequest) -> Result<Order, OrderError> {
        // Quantities and currency are checked before any lookup
        request.validate().map_err(OrderError::Validation)?;

        let currency = match &request.currency {
            Some(code) => Currency::parse(code)
                .map_err(|message| OrderError::Validation(ValidationErrors::single("currency", message)))?,
            None => self.settings.default_currency.clone(),
        };

        let customer = self
            .customers
            .find(request.customer_id)
            .await?
            .ok_or_else(|| OrderError::not_found(Entity::Customer, request.customer_id))?;

        let product_ids: BTreeSet<ProductId> = request.items.iter().map(|line| line.product_id).collect();
        let products = self.catalog.find_many(&product_ids).await?;

        let mut missing = BTreeSet::new();
        let mut lines = Vec::with_capacity(request.items.len());
        for line in &request.items {
            match products.get(&line.product_id) {
                // Quantities were validated above; a zero here is rejected by the aggregate
                Some(product) => lines.push(NewOrderItem {
                    product_id: product.id,
                    quantity: line.checked_quantity().unwrap_or(0),
                    price: product.price,
                }),
                None => {
                    missing.insert(line.product_id);
                }
            }
        }
        if !missing.is_empty() {
            return Err(OrderError::UnknownProducts(missing.into_iter().collect()));
        }

        let order = Order::place(Some(customer.id), currency, Utc::now(), lines)?;
        self.orders.insert(&order).await?;

        Ok(order)
    }

    /// Apply a status change under the configured policy. Only the status is written.
    ///
    /// The store write is conditional on the status the policy was checked
    /// against. When another writer got there first the order is re-read and
    /// the policy checked again against the new status.
    pub async fn update_status(&self, order_id: OrderId, status: OrderStatus) -> Result<Order, OrderError> {
        for attempt in 1..=STATUS_UPDATE_ATTEMPTS {
            let mut order = self
                .orders
                .get(order_id)
                .await?
                .ok_or_else(|| OrderError::not_found(Entity::Order, order_id))?;

            let from = order.status();
            let changed = match order.transition_to(status, self.settings.status_policy) {
                Ok(changed) => changed,
                Err(e) => {
                    self.metrics.status_transitions_rejected.inc();
                    tracing::warn!(
                        order_id = %order_id,
                        from = %from,
                        to = %status,
                        policy = ?self.settings.status_policy,
                        "Status transition rejected"
                    );
                    return Err(e);
                }
            };

            if !changed {
                tracing::debug!(order_id = %order_id, status = %status, "Status unchanged");
                return Ok(order);
            }

            if self.orders.update_status(order_id, from, status).await? {
                self.metrics
                    .status_transitions
                    .with_label_values(&[from.as_str(), status.as_str()])
                    .inc();
                tracing::info!(order_id = %order_id, from = %from, to = %status, "Order status updated");
                return Ok(order);
            }

            tracing::debug!(
                order_id = %order_id,
                expected = %from,
                attempt = attempt,
                "Status changed concurrently, re-checking"
            );
        }

        Err(OrderError::Store(StoreError::Conflict(format!(
            "status of order {} kept changing during update",
            order_id
        ))))
    }

    pub async fn get(&self, order_id: OrderId) -> Result<Order, OrderError> {
        self.orders
            .get(order_id)
            .await?
            .ok_or_else(|| OrderError::not_found(Entity::Order, order_id))
    }

    pub async fn list(&self, filter: &OrderFilter) -> Result<OrderPage, OrderError> {
        let query = filter
            .resolve(self.settings.default_page_size, self.settings.max_page_size)
            .map_err(OrderError::Validation)?;

        let (orders, total_count) = self.orders.list(&query).await?;
        tracing::debug!(
            page = query.page,
            page_size = query.page_size,
            returned = orders.len(),
            total_count = total_count,
            "Listed orders"
        );

        Ok(OrderPage {
            orders,
            total_count,
            page: query.page,
            page_size: query.page_size,
        })
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
