use actix::prelude::*;
use std::sync::Arc;

use crate::domain::order::{
    CreateOrderRequest, Order, OrderError, OrderFilter, OrderId, OrderPage, OrderService, OrderStatus,
};
use crate::import::{ImportEntry, ImportReport, OrderImporter};

// ============================================================================
// Actor Messages
// ============================================================================

#[derive(Message)]
#[rtype(result = "Result<Order, OrderError>")]
pub struct CreateOrder(pub CreateOrderRequest);

#[derive(Message)]
#[rtype(result = "Result<Order, OrderError>")]
pub struct UpdateOrderStatus {
    pub order_id: OrderId,
    pub status: OrderStatus,
}

#[derive(Message)]
#[rtype(result = "Result<Order, OrderError>")]
pub struct GetOrder(pub OrderId);

#[derive(Message)]
#[rtype(result = "Result<OrderPage, OrderError>")]
pub struct ListOrders(pub OrderFilter);

#[derive(Message)]
#[rtype(result = "Result<ImportReport, OrderError>")]
pub struct ImportOrders(pub Vec<ImportEntry>);

// ============================================================================
// Order Actor - Serializes writes against the order service
// ============================================================================

pub struct OrderActor {
    service: Arc<OrderService>,
    importer: Arc<OrderImporter>,
}

impl OrderActor {
    pub fn new(service: Arc<OrderService>, importer: Arc<OrderImporter>) -> Self {
        Self { service, importer }
    }
}

impl Actor for OrderActor {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        tracing::info!("OrderActor started");
    }
}

// ============================================================================
// Message Handlers
// ============================================================================
//
// Writes use AtomicResponse: the actor handles no other message until the
// future completes. Reads use ResponseFuture and may interleave.
//
// ============================================================================

impl Handler<CreateOrder> for OrderActor {
    type Result = AtomicResponse<Self, Result<Order, OrderError>>;

    fn handle(&mut self, msg: CreateOrder, _: &mut Self::Context) -> Self::Result {
        let service = self.service.clone();
        let request = msg.0;

        tracing::debug!(
            customer_id = %request.customer_id,
            item_count = request.items.len(),
            "Creating new order"
        );

        AtomicResponse::new(Box::pin(
            async move { service.create_order(request).await }.into_actor(self),
        ))
    }
}

impl Handler<UpdateOrderStatus> for OrderActor {
    type Result = AtomicResponse<Self, Result<Order, OrderError>>;

    fn handle(&mut self, msg: UpdateOrderStatus, _: &mut Self::Context) -> Self::Result {
        let service = self.service.clone();

        tracing::debug!(order_id = %msg.order_id, status = %msg.status, "Updating order status");

        AtomicResponse::new(Box::pin(
            async move { service.update_status(msg.order_id, msg.status).await }.into_actor(self),
        ))
    }
}

impl Handler<ImportOrders> for OrderActor {
    type Result = AtomicResponse<Self, Result<ImportReport, OrderError>>;

    fn handle(&mut self, msg: ImportOrders, _: &mut Self::Context) -> Self::Result {
        let importer = self.importer.clone();

        tracing::debug!(records = msg.0.len(), "Importing orders");

        AtomicResponse::new(Box::pin(
            async move { importer.import_entries(msg.0).await }.into_actor(self),
        ))
    }
}

impl Handler<GetOrder> for OrderActor {
    type Result = ResponseFuture<Result<Order, OrderError>>;

    fn handle(&mut self, msg: GetOrder, _: &mut Self::Context) -> Self::Result {
        let service = self.service.clone();
        Box::pin(async move { service.get(msg.0).await })
    }
}

impl Handler<ListOrders> for OrderActor {
    type Result = ResponseFuture<Result<OrderPage, OrderError>>;

    fn handle(&mut self, msg: ListOrders, _: &mut Self::Context) -> Self::Result {
        let service = self.service.clone();
        Box::pin(async move { service.list(&msg.0).await })
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::customer::Customer;
    use crate::domain::order::{Currency, OrderLineRequest, OrderSettings};
    use crate::domain::product::{Product, ProductId};
    use crate::import::{ImportItem, ImportRecord};
    use crate::metrics::Metrics;
    use crate::store::InMemoryStore;
    use rust_decimal::Decimal;

    fn start_actor() -> Addr<OrderActor> {
        let store = Arc::new(InMemoryStore::with_records(
            vec![Product::new(1, "Sample Product 1", Decimal::new(1999, 2))],
            vec![Customer::new(1, "John Doe", "john@doe.com")],
        ));
        let metrics = Arc::new(Metrics::new().unwrap());
        let service = OrderService::from_store(store.clone(), OrderSettings::default(), metrics.clone());
        let importer = OrderImporter::from_store(store, Currency::default(), 10, metrics);

        OrderActor::new(Arc::new(service), Arc::new(importer)).start()
    }

    #[actix::test]
    async fn test_order_lifecycle_through_actor() {
        let addr = start_actor();

        let order = addr
            .send(CreateOrder(CreateOrderRequest::new(1, vec![OrderLineRequest::new(1, 3)])))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(order.total_amount(), Decimal::new(5997, 2));

        let shipped = addr
            .send(UpdateOrderStatus {
                order_id: order.id(),
                status: OrderStatus::Shipped,
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(shipped.status(), OrderStatus::Shipped);

        let fetched = addr.send(GetOrder(order.id())).await.unwrap().unwrap();
        assert_eq!(fetched.status(), OrderStatus::Shipped);

        let backwards = addr
            .send(UpdateOrderStatus {
                order_id: order.id(),
                status: OrderStatus::Pending,
            })
            .await
            .unwrap();
        assert!(matches!(backwards, Err(OrderError::InvalidStatusTransition { .. })));
    }

    #[actix::test]
    async fn test_concurrent_creates_all_land() {
        let addr = start_actor();

        let sends: Vec<_> = (0..10)
            .map(|_| addr.send(CreateOrder(CreateOrderRequest::new(1, vec![OrderLineRequest::new(1, 1)]))))
            .collect();
        for send in sends {
            send.await.unwrap().unwrap();
        }

        let page = addr.send(ListOrders(OrderFilter::default())).await.unwrap().unwrap();
        assert_eq!(page.total_count, 10);
    }

    #[actix::test]
    async fn test_import_through_actor() {
        let addr = start_actor();

        let report = addr
            .send(ImportOrders(vec![
                Ok(ImportRecord {
                    customer_id: None,
                    status: None,
                    order_date_utc: None,
                    currency: None,
                    items: vec![ImportItem {
                        product_id: Some(ProductId(1)),
                        quantity: 1,
                        price: None,
                    }],
                }),
                Err("malformed record: expected a map".to_string()),
            ]))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(report.imported, 1);
        assert_eq!(report.anonymized, 1);
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].index, 1);
    }

    #[actix::test]
    async fn test_get_missing_order() {
        let addr = start_actor();

        let result = addr.send(GetOrder(OrderId::new())).await.unwrap();

        assert!(matches!(result, Err(ref e) if e.is_not_found()));
    }
}
