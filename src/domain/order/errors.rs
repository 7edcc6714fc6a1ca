use std::fmt;

use crate::domain::product::ProductId;
use crate::domain::validation::ValidationErrors;
use crate::store::StoreError;
use super::value_objects::OrderStatus;

// ============================================================================
// Order Errors
// ============================================================================

/// Kind of record a lookup failed to find
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Order,
    Customer,
    Product,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Entity::Order => "Order",
            Entity::Customer => "Customer",
            Entity::Product => "Product",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: Entity, id: String },

    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("Unknown product id(s): {}", join_ids(.0))]
    UnknownProducts(Vec<ProductId>),

    #[error("Cannot change order status from {from} to {to}")]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl OrderError {
    pub fn not_found(entity: Entity, id: impl fmt::Display) -> Self {
        OrderError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Field-keyed view of the error, for errors that describe bad input
    pub fn field_errors(&self) -> Option<ValidationErrors> {
        match self {
            OrderError::Validation(errors) => Some(errors.clone()),
            OrderError::UnknownProducts(_) => Some(ValidationErrors::single("items", self.to_string())),
            OrderError::InvalidStatusTransition { .. } => {
                Some(ValidationErrors::single("status", self.to_string()))
            }
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, OrderError::NotFound { .. })
    }

    /// Short label used for metrics and logs
    pub fn reason(&self) -> &'static str {
        match self {
            OrderError::NotFound { entity: Entity::Order, .. } => "order_not_found",
            OrderError::NotFound { entity: Entity::Customer, .. } => "customer_not_found",
            OrderError::NotFound { entity: Entity::Product, .. } => "product_not_found",
            OrderError::Validation(_) => "validation",
            OrderError::UnknownProducts(_) => "unknown_products",
            OrderError::InvalidStatusTransition { .. } => "invalid_transition",
            OrderError::Store(_) => "store",
        }
    }
}

fn join_ids(ids: &[ProductId]) -> String {
    ids.iter().map(ToString::to_string).collect::<Vec<_>>().join(",")
}
