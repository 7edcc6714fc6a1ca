use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::ser::{Serialize, SerializeStruct, Serializer};

use crate::domain::customer::CustomerId;
use crate::domain::product::ProductId;
use crate::domain::validation::ValidationErrors;
use super::errors::OrderError;
use super::value_objects::{Currency, OrderId, OrderItem, OrderStatus};

// ============================================================================
// Order Aggregate - Domain Logic
// ============================================================================
//
// An order owns its items outright. Items, prices, the customer reference and
// the order date are fixed when the order is placed; afterwards only the
// status moves, and only as the configured StatusPolicy allows.
//
// The total is never stored. It is folded from the items on every read.
//
// ============================================================================

/// Which status changes `Order::transition_to` accepts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum StatusPolicy {
    /// Forward along Pending -> Processing -> Shipped -> Delivered, or to
    /// Cancelled from any non-terminal status. Delivered and Cancelled are final.
    #[default]
    Strict,
    /// Any status may overwrite any other.
    Permissive,
}

impl StatusPolicy {
    pub fn allows(&self, from: OrderStatus, to: OrderStatus) -> bool {
        if from == to {
            return true;
        }
        match self {
            StatusPolicy::Permissive => true,
            StatusPolicy::Strict => {
                if from.is_terminal() {
                    return false;
                }
                match (from.forward_rank(), to.forward_rank()) {
                    (_, None) => true,
                    (Some(current), Some(next)) => next > current,
                    (None, Some(_)) => false,
                }
            }
        }
    }
}

/// A line to place, with its price already taken from the catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub quantity: u32,
    pub price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    id: OrderId,
    customer_id: Option<CustomerId>,
    currency: Currency,
    order_date_utc: DateTime<Utc>,
    status: OrderStatus,
    items: Vec<OrderItem>,
}

impl Order {
    /// Place a new order in `Pending`. Line ids are assigned in input order.
    pub fn place(
        customer_id: Option<CustomerId>,
        currency: Currency,
        order_date_utc: DateTime<Utc>,
        lines: Vec<NewOrderItem>,
    ) -> Result<Self, OrderError> {
        Self::place_with_status(customer_id, currency, order_date_utc, OrderStatus::Pending, lines)
    }

    /// Place an order whose status is already known (imported history).
    pub(crate) fn place_with_status(
        customer_id: Option<CustomerId>,
        currency: Currency,
        order_date_utc: DateTime<Utc>,
        status: OrderStatus,
        lines: Vec<NewOrderItem>,
    ) -> Result<Self, OrderError> {
        let mut errors = ValidationErrors::new();
        if lines.is_empty() {
            errors.add("items", "must contain at least one item");
        }
        for (index, line) in lines.iter().enumerate() {
            if line.quantity == 0 {
                errors.add(format!("items[{}].quantity", index), "must be at least 1");
            }
            if line.price.is_sign_negative() {
                errors.add(format!("items[{}].price", index), "must not be negative");
            }
        }
        errors.into_result().map_err(OrderError::Validation)?;

        let items: Vec<OrderItem> = lines
            .into_iter()
            .zip(1u32..)
            .map(|(line, id)| OrderItem {
                id,
                product_id: line.product_id,
                quantity: line.quantity,
                price: line.price,
            })
            .collect();

        if fold_total(&items).is_none() {
            return Err(OrderError::Validation(ValidationErrors::single(
                "items",
                "order total exceeds the representable amount",
            )));
        }

        Ok(Self {
            id: OrderId::new(),
            customer_id,
            currency,
            order_date_utc,
            status,
            items,
        })
    }

    /// Rebuild an order read back from a store.
    pub(crate) fn restore(
        id: OrderId,
        customer_id: Option<CustomerId>,
        currency: Currency,
        order_date_utc: DateTime<Utc>,
        status: OrderStatus,
        items: Vec<OrderItem>,
    ) -> Self {
        Self {
            id,
            customer_id,
            currency,
            order_date_utc,
            status,
            items,
        }
    }

    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn customer_id(&self) -> Option<CustomerId> {
        self.customer_id
    }

    pub fn currency(&self) -> &Currency {
        &self.currency
    }

    pub fn order_date_utc(&self) -> DateTime<Utc> {
        self.order_date_utc
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    /// Σ price × quantity over the items. Orders are only placed when this
    /// sum is representable, so the fallback is never taken for them.
    pub fn total_amount(&self) -> Decimal {
        self.checked_total().unwrap_or(Decimal::MAX)
    }

    /// Σ price × quantity, or `None` on overflow
    pub fn checked_total(&self) -> Option<Decimal> {
        fold_total(&self.items)
    }

    pub fn is_anonymous(&self) -> bool {
        self.customer_id.is_none()
    }

    /// Move to `to` if the policy allows it. Returns whether the status changed.
    pub fn transition_to(&mut self, to: OrderStatus, policy: StatusPolicy) -> Result<bool, OrderError> {
        let from = self.status;
        if !policy.allows(from, to) {
            return Err(OrderError::InvalidStatusTransition { from, to });
        }
        self.status = to;
        Ok(from != to)
    }
}

fn fold_total(items: &[OrderItem]) -> Option<Decimal> {
    items
        .iter()
        .try_fold(Decimal::ZERO, |total, item| total.checked_add(item.line_total()?))
}

impl Serialize for Order {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Order", 7)?;
        state.serialize_field("id", &self.id)?;
        state.serialize_field("customerId", &self.customer_id)?;
        state.serialize_field("currency", &self.currency)?;
        state.serialize_field("orderDateUtc", &self.order_date_utc)?;
        state.serialize_field("status", &self.status)?;
        state.serialize_field("items", &self.items)?;
        state.serialize_field("totalAmount", &self.total_amount())?;
        state.end()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn line(product: i64, quantity: u32, price: Decimal) -> NewOrderItem {
        NewOrderItem {
            product_id: ProductId(product),
            quantity,
            price,
        }
    }

    fn sek() -> Currency {
        Currency::parse("SEK").unwrap()
    }

    fn pending_order() -> Order {
        Order::place(
            Some(CustomerId(1)),
            sek(),
            Utc::now(),
            vec![line(1, 2, Decimal::new(1999, 2))],
        )
        .unwrap()
    }

    #[test]
    fn test_place_starts_pending_with_numbered_lines() {
        let order = Order::place(
            Some(CustomerId(1)),
            sek(),
            Utc::now(),
            vec![line(5, 1, Decimal::ONE), line(6, 2, Decimal::from(2))],
        )
        .unwrap();

        assert_eq!(order.status(), OrderStatus::Pending);
        let ids: Vec<u32> = order.items().iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(order.items()[1].product_id, ProductId(6));
    }

    #[test]
    fn test_place_without_items_fails() {
        let result = Order::place(Some(CustomerId(1)), sek(), Utc::now(), vec![]);
        match result {
            Err(OrderError::Validation(errors)) => assert!(errors.field("items").is_some()),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_place_rejects_zero_quantity_and_negative_price() {
        let result = Order::place(
            None,
            sek(),
            Utc::now(),
            vec![line(1, 0, Decimal::ONE), line(2, 1, Decimal::NEGATIVE_ONE)],
        );
        match result {
            Err(OrderError::Validation(errors)) => {
                assert!(errors.field("items[0].quantity").is_some());
                assert!(errors.field("items[1].price").is_some());
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_total_is_sum_of_price_times_quantity() {
        let order = Order::place(
            None,
            sek(),
            Utc::now(),
            vec![
                line(1, 3, Decimal::new(1999, 2)),
                line(2, 1, Decimal::new(2999, 2)),
                line(3, 10, Decimal::new(5, 2)),
            ],
        )
        .unwrap();

        // 59.97 + 29.99 + 0.50
        assert_eq!(order.total_amount(), Decimal::new(9046, 2));
        let folded: Decimal = order.items().iter().map(|i| i.price * Decimal::from(i.quantity)).sum();
        assert_eq!(order.total_amount(), folded);
    }

    #[test]
    fn test_total_is_exact_for_many_small_prices() {
        let lines: Vec<NewOrderItem> = (1..=100)
            .map(|n| line(n, (n % 7 + 1) as u32, Decimal::new(n * 3 + 1, 2)))
            .collect();
        let expected: Decimal = lines
            .iter()
            .map(|l| l.price * Decimal::from(l.quantity))
            .sum();

        let order = Order::place(None, sek(), Utc::now(), lines).unwrap();
        assert_eq!(order.total_amount(), expected);
    }

    #[test]
    fn test_place_rejects_total_beyond_decimal_range() {
        let huge = Decimal::from_i128_with_scale(10_i128.pow(20), 0);

        let result = Order::place(None, sek(), Utc::now(), vec![line(1, 2_000_000_000, huge)]);
        match result {
            Err(OrderError::Validation(errors)) => assert!(errors.field("items").is_some()),
            other => panic!("expected validation error, got {:?}", other),
        }

        // Each line fits, the sum does not
        let result = Order::place(
            None,
            sek(),
            Utc::now(),
            vec![line(1, 1, Decimal::MAX), line(2, 1, Decimal::MAX)],
        );
        assert!(matches!(result, Err(OrderError::Validation(_))));
    }

    #[test]
    fn test_checked_total_matches_total_amount() {
        let order = pending_order();
        assert_eq!(order.checked_total(), Some(order.total_amount()));
    }

    #[test]
    fn test_strict_policy_forward_path() {
        let mut order = pending_order();
        assert!(order.transition_to(OrderStatus::Processing, StatusPolicy::Strict).unwrap());
        assert!(order.transition_to(OrderStatus::Shipped, StatusPolicy::Strict).unwrap());
        assert!(order.transition_to(OrderStatus::Delivered, StatusPolicy::Strict).unwrap());
        assert_eq!(order.status(), OrderStatus::Delivered);
    }

    #[test]
    fn test_strict_policy_allows_skipping_forward() {
        let mut order = pending_order();
        assert!(order.transition_to(OrderStatus::Shipped, StatusPolicy::Strict).is_ok());
    }

    #[test]
    fn test_strict_policy_rejects_backwards() {
        let mut order = pending_order();
        order.transition_to(OrderStatus::Shipped, StatusPolicy::Strict).unwrap();

        let result = order.transition_to(OrderStatus::Processing, StatusPolicy::Strict);
        assert!(matches!(
            result,
            Err(OrderError::InvalidStatusTransition {
                from: OrderStatus::Shipped,
                to: OrderStatus::Processing
            })
        ));
        assert_eq!(order.status(), OrderStatus::Shipped);
    }

    #[test]
    fn test_strict_policy_shipped_then_cancelled() {
        let mut order = pending_order();
        order.transition_to(OrderStatus::Shipped, StatusPolicy::Strict).unwrap();
        assert!(order.transition_to(OrderStatus::Cancelled, StatusPolicy::Strict).unwrap());
        assert_eq!(order.status(), OrderStatus::Cancelled);
    }

    #[test]
    fn test_strict_policy_terminal_statuses_are_final() {
        let mut delivered = pending_order();
        delivered.transition_to(OrderStatus::Delivered, StatusPolicy::Strict).unwrap();
        assert!(delivered.transition_to(OrderStatus::Cancelled, StatusPolicy::Strict).is_err());
        assert!(delivered.transition_to(OrderStatus::Pending, StatusPolicy::Strict).is_err());

        let mut cancelled = pending_order();
        cancelled.transition_to(OrderStatus::Cancelled, StatusPolicy::Strict).unwrap();
        for to in [OrderStatus::Pending, OrderStatus::Processing, OrderStatus::Shipped, OrderStatus::Delivered] {
            assert!(cancelled.transition_to(to, StatusPolicy::Strict).is_err());
        }
    }

    #[test]
    fn test_same_status_is_accepted_noop() {
        let mut order = pending_order();
        order.transition_to(OrderStatus::Delivered, StatusPolicy::Strict).unwrap();
        assert!(!order.transition_to(OrderStatus::Delivered, StatusPolicy::Strict).unwrap());
        assert!(!order.transition_to(OrderStatus::Delivered, StatusPolicy::Permissive).unwrap());
    }

    #[test]
    fn test_permissive_policy_allows_any_overwrite() {
        let mut order = pending_order();
        for to in [
            OrderStatus::Delivered,
            OrderStatus::Pending,
            OrderStatus::Cancelled,
            OrderStatus::Shipped,
        ] {
            order.transition_to(to, StatusPolicy::Permissive).unwrap();
            assert_eq!(order.status(), to);
        }
    }

    #[test]
    fn test_transition_leaves_items_and_total_untouched() {
        let mut order = pending_order();
        let items = order.items().to_vec();
        let total = order.total_amount();
        let customer = order.customer_id();

        order.transition_to(OrderStatus::Cancelled, StatusPolicy::Strict).unwrap();

        assert_eq!(order.items(), items.as_slice());
        assert_eq!(order.total_amount(), total);
        assert_eq!(order.customer_id(), customer);
    }

    #[test]
    fn test_serialized_order_carries_derived_total() {
        let order = pending_order();
        let json = serde_json::to_value(&order).unwrap();

        assert_eq!(json["status"], "Pending");
        assert_eq!(json["currency"], "SEK");
        assert_eq!(json["customerId"], 1);
        assert_eq!(json["items"].as_array().unwrap().len(), 1);
        assert_eq!(json["totalAmount"], "39.98");
    }
}
