use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::customer::CustomerId;
use crate::domain::product::ProductId;
use crate::domain::validation::{Validatable, ValidationErrors};
use super::aggregate::Order;
use super::value_objects::Currency;

// ============================================================================
// Order Requests - Represent caller intent before validation
// ============================================================================

/// One requested line: which product and how many
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineRequest {
    pub product_id: ProductId,
    pub quantity: i32,
}

impl OrderLineRequest {
    pub fn new(product_id: impl Into<ProductId>, quantity: i32) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
        }
    }

    /// The quantity when it is at least one
    pub fn checked_quantity(&self) -> Option<u32> {
        u32::try_from(self.quantity).ok().filter(|q| *q >= 1)
    }
}

impl Validatable for OrderLineRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.checked_quantity().is_none() {
            errors.add("quantity", format!("must be at least 1, got {}", self.quantity));
        }
        errors.into_result()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub customer_id: CustomerId,
    pub items: Vec<OrderLineRequest>,
    #[serde(default)]
    pub currency: Option<String>,
}

impl CreateOrderRequest {
    pub fn new(customer_id: impl Into<CustomerId>, items: Vec<OrderLineRequest>) -> Self {
        Self {
            customer_id: customer_id.into(),
            items,
            currency: None,
        }
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = Some(currency.into());
        self
    }
}

impl Validatable for CreateOrderRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.items.is_empty() {
            errors.add("items", "must contain at least one item");
        }
        for (index, line) in self.items.iter().enumerate() {
            if let Err(line_errors) = line.validate() {
                errors.merge_prefixed(&format!("items[{}]", index), line_errors);
            }
        }
        if let Some(code) = &self.currency {
            if let Err(message) = Currency::parse(code) {
                errors.add("currency", message);
            }
        }

        errors.into_result()
    }
}

/// Optional date window and paging for listing orders
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderFilter {
    #[serde(default)]
    pub date_from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub date_to: Option<DateTime<Utc>>,
    /// 1-based
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub page_size: Option<u32>,
}

impl OrderFilter {
    pub fn page(mut self, page: u32, page_size: u32) -> Self {
        self.page = Some(page);
        self.page_size = Some(page_size);
        self
    }

    pub fn between(mut self, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Self {
        self.date_from = from;
        self.date_to = to;
        self
    }

    /// Apply paging defaults and limits, producing the query a store runs.
    pub fn resolve(&self, default_page_size: u32, max_page_size: u32) -> Result<OrderQuery, ValidationErrors> {
        let mut errors = match self.validate() {
            Ok(()) => ValidationErrors::new(),
            Err(errors) => errors,
        };

        let page = self.page.unwrap_or(1);
        let page_size = self.page_size.unwrap_or(default_page_size);
        if page_size > max_page_size {
            errors.add("pageSize", format!("must be at most {}", max_page_size));
        }
        errors.into_result()?;

        Ok(OrderQuery {
            date_from: self.date_from,
            date_to: self.date_to,
            page,
            page_size,
        })
    }
}

impl Validatable for OrderFilter {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.page == Some(0) {
            errors.add("page", "must be at least 1");
        }
        if self.page_size == Some(0) {
            errors.add("pageSize", "must be at least 1");
        }
        if let (Some(from), Some(to)) = (self.date_from, self.date_to) {
            if from > to {
                errors.add("dateFrom", "must not be after dateTo");
            }
        }

        errors.into_result()
    }
}

/// A validated listing query. Date bounds are inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderQuery {
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub page: u32,
    pub page_size: u32,
}

impl OrderQuery {
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.page_size)
    }

    pub fn limit(&self) -> u64 {
        u64::from(self.page_size)
    }

    pub fn matches(&self, order_date: DateTime<Utc>) -> bool {
        self.date_from.map_or(true, |from| order_date >= from)
            && self.date_to.map_or(true, |to| order_date <= to)
    }
}

/// One page of orders plus the number of orders matching the filter
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPage {
    pub orders: Vec<Order>,
    pub total_count: u64,
    pub page: u32,
    pub page_size: u32,
}
