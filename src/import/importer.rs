use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use crate::domain::customer::{CustomerDirectory, CustomerId};
use crate::domain::order::{Currency, NewOrderItem, Order, OrderError, OrderId, OrderStatus};
use crate::domain::product::{Product, ProductCatalog, ProductId};
use crate::metrics::Metrics;
use crate::store::OrderStore;
use crate::utils::{retry_on_transient, RetryConfig, RetryResult};

use super::records::{ImportEntry, ImportRecord};

// ============================================================================
// Order Importer
// ============================================================================
//
// Flow: Records → Lookups (one catalog batch, cached customers)
//       → Reconcile each record → Chunk → insert_batch (retried)
//
// Each chunk is its own transaction. There is no transaction across chunks.
//
// ============================================================================

/// A record that did not make it into the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedRecord {
    /// Position of the record in the input
    pub index: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub received: usize,
    pub imported: usize,
    /// Imported orders whose customer could not be resolved
    pub anonymized: usize,
    /// Records that were malformed or had no surviving items
    pub orders_dropped: usize,
    /// Reconciled orders lost with a failed batch
    pub orders_failed: usize,
    pub items_dropped: usize,
    pub batches_committed: usize,
    pub batches_failed: usize,
    pub imported_ids: Vec<OrderId>,
    pub rejected: Vec<RejectedRecord>,
}

/// An order ready to commit, remembering where it came from
struct Reconciled {
    index: usize,
    anonymized: bool,
    order: Order,
}

pub struct OrderImporter {
    orders: Arc<dyn OrderStore>,
    customers: Arc<dyn CustomerDirectory>,
    catalog: Arc<dyn ProductCatalog>,
    default_currency: Currency,
    batch_size: usize,
    retry: RetryConfig,
    metrics: Arc<Metrics>,
}

impl OrderImporter {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        customers: Arc<dyn CustomerDirectory>,
        catalog: Arc<dyn ProductCatalog>,
        default_currency: Currency,
        batch_size: usize,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            orders,
            customers,
            catalog,
            default_currency,
            batch_size: batch_size.max(1),
            retry: RetryConfig::default(),
            metrics,
        }
    }

    pub fn from_store<S>(store: Arc<S>, default_currency: Currency, batch_size: usize, metrics: Arc<Metrics>) -> Self
    where
        S: OrderStore + CustomerDirectory + ProductCatalog + 'static,
    {
        Self::new(store.clone(), store.clone(), store, default_currency, batch_size, metrics)
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub async fn import(&self, records: Vec<ImportRecord>) -> Result<ImportReport, OrderError> {
        self.import_entries(records.into_iter().map(Ok).collect()).await
    }

    /// Import a feed whose entries may already have failed to parse. Failed
    /// entries are reported as rejected at their position.
    pub async fn import_entries(&self, entries: Vec<ImportEntry>) -> Result<ImportReport, OrderError> {
        let mut report = ImportReport {
            received: entries.len(),
            ..ImportReport::default()
        };

        let mut records = Vec::with_capacity(entries.len());
        for (index, entry) in entries.into_iter().enumerate() {
            match entry {
                Ok(record) => records.push((index, record)),
                Err(reason) => {
                    report.orders_dropped += 1;
                    report.rejected.push(RejectedRecord { index, reason });
                }
            }
        }

        let product_ids: BTreeSet<ProductId> = records
            .iter()
            .flat_map(|(_, record)| record.items.iter().filter_map(|item| item.product_id))
            .collect();
        let products = self.catalog.find_many(&product_ids).await?;
        let known_customers = self.resolve_customers(&records).await?;

        let mut reconciled = Vec::with_capacity(records.len());
        for (index, record) in records {
            match self.reconcile(record, &products, &known_customers, &mut report) {
                Ok(Some(order)) => reconciled.push(Reconciled {
                    index,
                    anonymized: order.is_anonymous(),
                    order,
                }),
                Ok(None) => {
                    report.orders_dropped += 1;
                    report.rejected.push(RejectedRecord {
                        index,
                        reason: "no valid items".to_string(),
                    });
                }
                Err(e) => {
                    report.orders_dropped += 1;
                    report.rejected.push(RejectedRecord {
                        index,
                        reason: e.to_string(),
                    });
                }
            }
        }
        report.rejected.sort_by_key(|rejected| rejected.index);

        for (batch_number, batch) in reconciled.chunks(self.batch_size).enumerate() {
            self.commit_batch(batch_number + 1, batch, &mut report).await;
        }

        self.metrics.import_orders.with_label_values(&["imported"]).inc_by(report.imported as u64);
        self.metrics.import_orders.with_label_values(&["dropped"]).inc_by(report.orders_dropped as u64);
        self.metrics.import_orders.with_label_values(&["failed"]).inc_by(report.orders_failed as u64);
        self.metrics.import_items_dropped.inc_by(report.items_dropped as u64);

        tracing::info!(
            received = report.received,
            imported = report.imported,
            anonymized = report.anonymized,
            orders_dropped = report.orders_dropped,
            orders_failed = report.orders_failed,
            items_dropped = report.items_dropped,
            batches_committed = report.batches_committed,
            batches_failed = report.batches_failed,
            "📦 Import finished"
        );

        Ok(report)
    }

    /// Which of the referenced customers exist, each looked up once
    async fn resolve_customers(
        &self,
        records: &[(usize, ImportRecord)],
    ) -> Result<HashMap<CustomerId, bool>, OrderError> {
        let mut known = HashMap::new();
        for id in records.iter().filter_map(|(_, record)| record.customer_id) {
            if known.contains_key(&id) {
                continue;
            }
            let exists = self.customers.find(id).await?.is_some();
            known.insert(id, exists);
        }
        Ok(known)
    }

    /// Build the order a record describes, or `None` when no item survives.
    fn reconcile(
        &self,
        record: ImportRecord,
        products: &HashMap<ProductId, Product>,
        known_customers: &HashMap<CustomerId, bool>,
        report: &mut ImportReport,
    ) -> Result<Option<Order>, OrderError> {
        let customer_id = record
            .customer_id
            .filter(|id| known_customers.get(id).copied().unwrap_or(false));

        let mut lines = Vec::with_capacity(record.items.len());
        for item in &record.items {
            let Some(product) = item.product_id.and_then(|id| products.get(&id)) else {
                tracing::debug!(product_id = ?item.product_id, "Dropping item with unknown product");
                report.items_dropped += 1;
                continue;
            };
            // Quantities are stored as 32-bit signed integers
            let Some(quantity) = i32::try_from(item.quantity)
                .ok()
                .filter(|q| *q >= 1)
                .and_then(|q| u32::try_from(q).ok())
            else {
                tracing::debug!(product_id = %product.id, quantity = item.quantity, "Dropping item with invalid quantity");
                report.items_dropped += 1;
                continue;
            };
            let price = item
                .price
                .filter(|price| !price.is_sign_negative())
                .unwrap_or(product.price);

            lines.push(NewOrderItem {
                product_id: product.id,
                quantity,
                price,
            });
        }

        if lines.is_empty() {
            return Ok(None);
        }

        let currency = record
            .currency
            .as_deref()
            .and_then(|code| Currency::parse(code).ok())
            .unwrap_or_else(|| self.default_currency.clone());
        let order_date_utc = record.order_date_utc.unwrap_or_else(Utc::now);
        let status = record
            .status
            .as_ref()
            .map(|raw| raw.resolve())
            .unwrap_or(OrderStatus::Pending);

        Order::place_with_status(customer_id, currency, order_date_utc, status, lines).map(Some)
    }

    async fn commit_batch(&self, batch_number: usize, batch: &[Reconciled], report: &mut ImportReport) {
        let orders: Vec<Order> = batch.iter().map(|entry| entry.order.clone()).collect();

        let result = retry_on_transient(&self.retry, "import_batch", |_attempt| {
            self.orders.insert_batch(&orders)
        })
        .await;

        match result {
            RetryResult::Success(()) => {
                report.batches_committed += 1;
                report.imported += batch.len();
                report.anonymized += batch.iter().filter(|entry| entry.anonymized).count();
                report.imported_ids.extend(batch.iter().map(|entry| entry.order.id()));
                self.metrics.import_batches.with_label_values(&["committed"]).inc();
                tracing::debug!(batch = batch_number, orders = batch.len(), "Import batch committed");
            }
            RetryResult::Failed(e) | RetryResult::PermanentFailure(e) => {
                report.batches_failed += 1;
                report.orders_failed += batch.len();
                report.rejected.extend(batch.iter().map(|entry| RejectedRecord {
                    index: entry.index,
                    reason: format!("batch {} failed: {}", batch_number, e),
                }));
                self.metrics.import_batches.with_label_values(&["failed"]).inc();
                tracing::error!(
                    batch = batch_number,
                    orders = batch.len(),
                    error = %e,
                    "❌ Import batch failed, skipping"
                );
            }
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::customer::Customer;
    use crate::domain::order::OrderQuery;
    use crate::import::{ImportItem, RawStatus};
    use crate::store::{InMemoryStore, StoreError};
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn store() -> Arc<InMemoryStore> {
        Arc::new(InMemoryStore::with_records(
            vec![
                Product::new(1, "Sample Product 1", Decimal::new(1999, 2)),
                Product::new(2, "Sample Product 2", Decimal::new(2999, 2)),
            ],
            vec![Customer::new(1, "John Doe", "john@doe.com")],
        ))
    }

    fn importer(store: Arc<InMemoryStore>, batch_size: usize) -> OrderImporter {
        OrderImporter::from_store(store, Currency::default(), batch_size, Arc::new(Metrics::new().unwrap()))
    }

    fn item(product_id: i64, quantity: i64) -> ImportItem {
        ImportItem {
            product_id: Some(ProductId(product_id)),
            quantity,
            price: None,
        }
    }

    fn record(customer_id: Option<i64>, items: Vec<ImportItem>) -> ImportRecord {
        ImportRecord {
            customer_id: customer_id.map(CustomerId),
            status: None,
            order_date_utc: None,
            currency: None,
            items,
        }
    }

    fn fast_retry() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            multiplier: 2.0,
        }
    }

    #[tokio::test]
    async fn test_missing_customer_anonymized_and_unknown_item_dropped() {
        let store = store();
        let importer = importer(store.clone(), 10);

        let report = importer
            .import(vec![
                // A: customer 404 does not exist
                record(Some(404), vec![item(1, 1)]),
                // B: product 99 does not exist
                record(Some(1), vec![item(2, 3), item(99, 1)]),
            ])
            .await
            .unwrap();

        assert_eq!(report.received, 2);
        assert_eq!(report.imported, 2);
        assert_eq!(report.anonymized, 1);
        assert_eq!(report.items_dropped, 1);
        assert!(report.rejected.is_empty());

        let a = store.get(report.imported_ids[0]).await.unwrap().unwrap();
        assert!(a.is_anonymous());

        let b = store.get(report.imported_ids[1]).await.unwrap().unwrap();
        assert_eq!(b.customer_id(), Some(CustomerId(1)));
        assert_eq!(b.items().len(), 1);
        assert_eq!(b.items()[0].product_id, ProductId(2));
        assert_eq!(b.items()[0].id, 1);
        assert_eq!(b.total_amount(), Decimal::new(8997, 2));
    }

    #[tokio::test]
    async fn test_record_without_surviving_items_is_dropped() {
        let store = store();
        let importer = importer(store.clone(), 10);

        let report = importer
            .import(vec![
                record(Some(1), vec![item(98, 1), item(1, 0)]),
                record(None, vec![]),
                record(None, vec![item(1, 1)]),
            ])
            .await
            .unwrap();

        assert_eq!(report.imported, 1);
        assert_eq!(report.orders_dropped, 2);
        assert_eq!(report.items_dropped, 2);
        assert_eq!(
            report.rejected.iter().map(|r| r.index).collect::<Vec<_>>(),
            vec![0, 1]
        );
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_status_currency_date_and_price_taken_from_record() {
        let store = store();
        let importer = importer(store.clone(), 10);
        let placed_at = Utc::now() - chrono::Duration::days(30);

        let mut historical = record(Some(1), vec![ImportItem {
            product_id: Some(ProductId(1)),
            quantity: 2,
            price: Some(Decimal::new(1500, 2)),
        }]);
        historical.status = Some(RawStatus::Code(3));
        historical.currency = Some("eur".to_string());
        historical.order_date_utc = Some(placed_at);

        let mut unknown_status = record(Some(1), vec![item(2, 1)]);
        unknown_status.status = Some(RawStatus::Name("teleported".to_string()));
        unknown_status.currency = Some("euros".to_string());

        let report = importer.import(vec![historical, unknown_status]).await.unwrap();

        let first = store.get(report.imported_ids[0]).await.unwrap().unwrap();
        assert_eq!(first.status(), OrderStatus::Delivered);
        assert_eq!(first.currency().as_str(), "EUR");
        assert_eq!(first.order_date_utc(), placed_at);
        assert_eq!(first.items()[0].price, Decimal::new(1500, 2));

        let second = store.get(report.imported_ids[1]).await.unwrap().unwrap();
        assert_eq!(second.status(), OrderStatus::Pending);
        assert_eq!(second.currency().as_str(), "SEK");
        assert_eq!(second.items()[0].price, Decimal::new(2999, 2));
    }

    #[tokio::test]
    async fn test_quantity_beyond_i32_drops_item_not_batch() {
        let store = store();
        let importer = importer(store.clone(), 10);

        let report = importer
            .import(vec![
                record(Some(1), vec![item(1, 1)]),
                record(Some(1), vec![item(1, 3_000_000_000), item(2, 2)]),
                record(Some(1), vec![item(2, 3_000_000_000)]),
                record(None, vec![item(2, 1)]),
            ])
            .await
            .unwrap();

        assert_eq!(report.batches_committed, 1);
        assert_eq!(report.batches_failed, 0);
        assert_eq!(report.imported, 3);
        assert_eq!(report.items_dropped, 2);
        assert_eq!(report.orders_dropped, 1);
        assert_eq!(report.rejected.iter().map(|r| r.index).collect::<Vec<_>>(), vec![2]);

        let second = store.get(report.imported_ids[1]).await.unwrap().unwrap();
        assert_eq!(second.items().len(), 1);
        assert_eq!(second.items()[0].product_id, ProductId(2));
        assert_eq!(second.items()[0].quantity, 2);
        assert_eq!(store.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_malformed_entries_rejected_others_imported() {
        let store = store();
        let importer = importer(store.clone(), 10);

        let entries = crate::import::parse_records(vec![
            serde_json::json!({ "customerId": 1, "items": [{ "productId": 1, "quantity": 2 }] }),
            serde_json::json!({ "customerId": "abc", "items": [{ "productId": 1 }] }),
            serde_json::json!({ "customerId": 1, "items": [{ "quantity": 4 }, { "productId": 2 }] }),
        ]);

        let report = importer.import_entries(entries).await.unwrap();

        assert_eq!(report.received, 3);
        assert_eq!(report.imported, 2);
        assert_eq!(report.orders_dropped, 1);
        assert_eq!(report.items_dropped, 1);
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].index, 1);
        assert!(report.rejected[0].reason.starts_with("malformed record"));

        let third = store.get(report.imported_ids[1]).await.unwrap().unwrap();
        assert_eq!(third.items().len(), 1);
        assert_eq!(third.items()[0].product_id, ProductId(2));
    }

    #[tokio::test]
    async fn test_unrepresentable_total_rejects_only_that_record() {
        let store = store();
        let importer = importer(store.clone(), 10);

        let mut huge = item(1, 2_000_000_000);
        huge.price = Some(Decimal::from_i128_with_scale(10_i128.pow(20), 0));

        let report = importer
            .import(vec![record(Some(1), vec![huge]), record(Some(1), vec![item(1, 1)])])
            .await
            .unwrap();

        assert_eq!(report.imported, 1);
        assert_eq!(report.orders_dropped, 1);
        assert_eq!(report.rejected.iter().map(|r| r.index).collect::<Vec<_>>(), vec![0]);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    /// Delegates to an in-memory store, failing chosen `insert_batch` calls
    struct FlakyStore {
        inner: InMemoryStore,
        calls: AtomicU32,
        fail_on: Vec<u32>,
        transient: bool,
    }

    #[async_trait]
    impl OrderStore for FlakyStore {
        async fn insert(&self, order: &Order) -> Result<(), StoreError> {
            self.inner.insert(order).await
        }

        async fn insert_batch(&self, orders: &[Order]) -> Result<(), StoreError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_on.contains(&call) {
                return Err(if self.transient {
                    StoreError::Unavailable("connection reset".to_string())
                } else {
                    StoreError::Corrupt("rejected by storage".to_string())
                });
            }
            self.inner.insert_batch(orders).await
        }

        async fn get(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
            self.inner.get(id).await
        }

        async fn update_status(
            &self,
            id: OrderId,
            expected: OrderStatus,
            status: OrderStatus,
        ) -> Result<bool, StoreError> {
            self.inner.update_status(id, expected, status).await
        }

        async fn list(&self, query: &OrderQuery) -> Result<(Vec<Order>, u64), StoreError> {
            self.inner.list(query).await
        }

        async fn delete(&self, id: OrderId) -> Result<bool, StoreError> {
            self.inner.delete(id).await
        }

        async fn count(&self) -> Result<u64, StoreError> {
            self.inner.count().await
        }
    }

    fn flaky_importer(flaky: Arc<FlakyStore>, lookups: Arc<InMemoryStore>) -> OrderImporter {
        OrderImporter::new(
            flaky,
            lookups.clone(),
            lookups,
            Currency::default(),
            2,
            Arc::new(Metrics::new().unwrap()),
        )
        .with_retry(fast_retry())
    }

    #[tokio::test]
    async fn test_failed_batch_keeps_earlier_batches() {
        let lookups = store();
        let flaky = Arc::new(FlakyStore {
            inner: InMemoryStore::new(),
            calls: AtomicU32::new(0),
            fail_on: vec![2],
            transient: false,
        });
        let importer = flaky_importer(flaky.clone(), lookups);

        let records = (0..5).map(|_| record(Some(1), vec![item(1, 1)])).collect();
        let report = importer.import(records).await.unwrap();

        // Batches: [0,1] committed, [2,3] failed, [4] committed
        assert_eq!(report.batches_committed, 2);
        assert_eq!(report.batches_failed, 1);
        assert_eq!(report.imported, 3);
        assert_eq!(report.orders_failed, 2);
        assert_eq!(
            report.rejected.iter().map(|r| r.index).collect::<Vec<_>>(),
            vec![2, 3]
        );
        assert_eq!(flaky.count().await.unwrap(), 3);
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_transient_batch_failure_is_retried() {
        let lookups = store();
        let flaky = Arc::new(FlakyStore {
            inner: InMemoryStore::new(),
            calls: AtomicU32::new(0),
            fail_on: vec![1],
            transient: true,
        });
        let importer = flaky_importer(flaky.clone(), lookups);

        let report = importer
            .import(vec![record(Some(1), vec![item(1, 1)]), record(Some(1), vec![item(2, 1)])])
            .await
            .unwrap();

        assert_eq!(report.batches_committed, 1);
        assert_eq!(report.batches_failed, 0);
        assert_eq!(report.imported, 2);
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 2);
    }
}
