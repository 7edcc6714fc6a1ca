use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::validation::{Validatable, ValidationErrors};
use super::value_objects::ProductId;

/// A sellable product and its current list price
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Decimal,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

impl Product {
    pub fn new(id: impl Into<ProductId>, name: impl Into<String>, price: Decimal) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            price,
            brand: None,
            category: None,
        }
    }
}

impl Validatable for Product {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.name.trim().is_empty() {
            errors.add("name", "must not be empty");
        }
        if self.price.is_sign_negative() {
            errors.add("price", "must not be negative");
        }

        errors.into_result()
    }
}
