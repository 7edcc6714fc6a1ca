use std::path::Path;

use anyhow::Context;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::customer::{Address, Customer};
use crate::domain::order::{Currency, NewOrderItem, Order, OrderId};
use crate::domain::product::Product;
use crate::domain::validation::Validatable;
use crate::store::{OrderStore, SeedStore};

// ============================================================================
// Seeding - Explicit, idempotent start-up initialization
// ============================================================================
//
// Each collection is filled only while it is empty, so running the seeder
// against an already seeded store changes nothing.
//
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeedData {
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub customers: Vec<Customer>,
}

impl SeedData {
    /// Built-in demo catalog and customers
    pub fn demo() -> Self {
        let mut first = Product::new(1, "Sample Product 1", Decimal::new(1999, 2));
        first.description = Some("This is a sample product.".to_string());
        first.brand = Some("Brand A".to_string());
        first.category = Some("Category X".to_string());

        let mut second = Product::new(2, "Sample Product 2", Decimal::new(2999, 2));
        second.description = Some("This is another sample product.".to_string());
        second.brand = Some("Brand B".to_string());
        second.category = Some("Category Y".to_string());

        let john = Customer::new(1, "John Doe", "john@doe.com")
            .with_phone("123-456-7890")
            .with_address(address("123 Main St", "12345", "Anytown", "USA"));
        let jane = Customer::new(2, "Jane Smith", "jane@smith.com")
            .with_phone("987-654-3210")
            .with_address(address("456 Elm St", "67890", "Othertown", "USA"));

        Self {
            products: vec![first, second],
            customers: vec![john, jane],
        }
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read seed file {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("Failed to parse seed file {}", path.display()))
    }
}

fn address(street: &str, postal_number: &str, city: &str, country: &str) -> Address {
    Address {
        street: street.to_string(),
        postal_number: postal_number.to_string(),
        city: city.to_string(),
        country: country.to_string(),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedReport {
    pub products_inserted: usize,
    pub customers_inserted: usize,
    pub demo_order: Option<OrderId>,
}

/// Fill empty collections from `data`, then place one demo order if there are none.
pub async fn seed<S>(store: &S, data: &SeedData, currency: &Currency) -> anyhow::Result<SeedReport>
where
    S: SeedStore + OrderStore + ?Sized,
{
    let mut report = SeedReport::default();

    if store.product_count().await? == 0 {
        let products = valid_records(&data.products, "product");
        store.insert_products(&products).await.context("Failed to seed products")?;
        report.products_inserted = products.len();
    }

    if store.customer_count().await? == 0 {
        let customers = valid_records(&data.customers, "customer");
        store.insert_customers(&customers).await.context("Failed to seed customers")?;
        report.customers_inserted = customers.len();
    }

    if store.count().await? == 0 {
        if let (Some(customer), Some(product)) = (store.first_customer().await?, store.first_product().await?) {
            let order = Order::place(
                Some(customer.id),
                currency.clone(),
                Utc::now(),
                vec![NewOrderItem {
                    product_id: product.id,
                    quantity: 2,
                    price: product.price,
                }],
            )?;
            store.insert(&order).await.context("Failed to seed demo order")?;
            report.demo_order = Some(order.id());
        }
    }

    tracing::info!(
        products = report.products_inserted,
        customers = report.customers_inserted,
        demo_order = ?report.demo_order,
        "🌱 Seeding complete"
    );

    Ok(report)
}

/// Records that pass validation; the rest are logged and skipped
fn valid_records<T>(records: &[T], kind: &str) -> Vec<T>
where
    T: Validatable + Clone,
{
    records
        .iter()
        .enumerate()
        .filter_map(|(index, record)| match record.validate() {
            Ok(()) => Some(record.clone()),
            Err(errors) => {
                tracing::warn!(kind = kind, index = index, errors = %errors, "Skipping invalid seed record");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::customer::CustomerDirectory;
    use crate::domain::customer::CustomerId;
    use crate::store::InMemoryStore;
    use std::io::Write;

    #[test]
    fn test_demo_data_is_valid() {
        let data = SeedData::demo();
        assert!(data.products.iter().all(|p| p.validate().is_ok()));
        assert!(data.customers.iter().all(|c| c.validate().is_ok()));
    }

    #[tokio::test]
    async fn test_seed_populates_empty_store() {
        let store = InMemoryStore::new();

        let report = seed(&store, &SeedData::demo(), &Currency::default()).await.unwrap();

        assert_eq!(report.products_inserted, 2);
        assert_eq!(report.customers_inserted, 2);

        let order = store.get(report.demo_order.unwrap()).await.unwrap().unwrap();
        assert_eq!(order.customer_id(), Some(CustomerId(1)));
        assert_eq!(order.items()[0].quantity, 2);
        assert_eq!(order.total_amount(), Decimal::new(3998, 2));
    }

    #[tokio::test]
    async fn test_seeding_twice_inserts_nothing_the_second_time() {
        let store = InMemoryStore::new();
        seed(&store, &SeedData::demo(), &Currency::default()).await.unwrap();

        let second = seed(&store, &SeedData::demo(), &Currency::default()).await.unwrap();

        assert_eq!(second, SeedReport::default());
        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(store.product_count().await.unwrap(), 2);
        assert_eq!(store.customer_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_invalid_records_are_skipped() {
        let store = InMemoryStore::new();
        let mut data = SeedData::demo();
        data.customers.push(Customer::new(3, "", "not-an-email"));
        data.products.push(Product::new(3, "Broken", Decimal::new(-1, 0)));

        let report = seed(&store, &data, &Currency::default()).await.unwrap();

        assert_eq!(report.products_inserted, 2);
        assert_eq!(report.customers_inserted, 2);
        assert!(store.find(CustomerId(3)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_no_demo_order_without_customers() {
        let store = InMemoryStore::new();
        let data = SeedData {
            customers: vec![],
            ..SeedData::demo()
        };

        let report = seed(&store, &data, &Currency::default()).await.unwrap();

        assert_eq!(report.products_inserted, 2);
        assert!(report.demo_order.is_none());
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[test]
    fn test_seed_file_round_trip() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"products": [{{"id": 5, "name": "Lamp", "price": 49.5}}],
                "customers": [{{"id": 9, "name": "Ada", "email": "ada@example.com",
                  "address": {{"street": "1 Loop", "postalNumber": "111 22", "city": "Lund", "country": "SE"}}}}]}}"#
        )
        .unwrap();

        let data = SeedData::from_json_file(file.path()).unwrap();

        assert_eq!(data.products[0].price, Decimal::new(495, 1));
        assert_eq!(data.customers[0].address.city, "Lund");
        assert!(data.customers[0].validate().is_ok());
    }
}
