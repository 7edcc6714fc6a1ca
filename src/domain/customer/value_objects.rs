use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::validation::ValidationErrors;

// ============================================================================
// Customer Value Objects
// ============================================================================

/// Directory identifier of a customer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomerId(pub i64);

impl CustomerId {
    pub fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for CustomerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for CustomerId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Customer email address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Email(pub String);

impl Email {
    pub fn new(email: impl Into<String>) -> Self {
        Self(email.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Basic shape check: a non-empty local part and domain around a single '@'
    pub fn is_well_formed(&self) -> bool {
        match self.0.split_once('@') {
            Some((local, domain)) => {
                !local.is_empty() && !domain.is_empty() && !domain.contains('@')
            }
            None => false,
        }
    }
}

/// Customer phone number
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhoneNumber(pub String);

impl PhoneNumber {
    pub fn new(phone: impl Into<String>) -> Self {
        Self(phone.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Digits plus the usual separators, with at least one digit
    pub fn is_well_formed(&self) -> bool {
        let allowed = |c: char| c.is_ascii_digit() || matches!(c, '+' | '-' | ' ' | '(' | ')');
        self.0.chars().all(allowed) && self.0.chars().any(|c| c.is_ascii_digit())
    }
}

/// Postal address
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub street: String,
    pub postal_number: String,
    pub city: String,
    pub country: String,
}

impl Address {
    pub(crate) fn collect_errors(&self, errors: &mut ValidationErrors) {
        if self.street.trim().is_empty() {
            errors.add("address.street", "must not be empty");
        }
        if self.postal_number.trim().is_empty() {
            errors.add("address.postalNumber", "must not be empty");
        }
        if self.city.trim().is_empty() {
            errors.add("address.city", "must not be empty");
        }
        if self.country.trim().is_empty() {
            errors.add("address.country", "must not be empty");
        }
    }
}
