use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::validation::{Validatable, ValidationErrors};
use super::value_objects::{Address, CustomerId, Email, PhoneNumber};

/// A registered customer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    pub email: Email,
    #[serde(default)]
    pub phone: Option<PhoneNumber>,
    #[serde(default)]
    pub address: Address,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
}

impl Customer {
    pub fn new(id: impl Into<CustomerId>, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email: Email::new(email),
            phone: None,
            address: Address::default(),
            created_at: Utc::now(),
            birth_date: None,
        }
    }

    pub fn with_address(mut self, address: Address) -> Self {
        self.address = address;
        self
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(PhoneNumber::new(phone));
        self
    }
}

impl Validatable for Customer {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.name.trim().is_empty() {
            errors.add("name", "must not be empty");
        }
        if self.email.as_str().is_empty() {
            errors.add("email", "must not be empty");
        } else if !self.email.is_well_formed() {
            errors.add("email", format!("invalid email address: {}", self.email.as_str()));
        }
        if let Some(phone) = &self.phone {
            if !phone.is_well_formed() {
                errors.add("phone", format!("invalid phone number: {}", phone.as_str()));
            }
        }
        self.address.collect_errors(&mut errors);

        errors.into_result()
    }
}
