use actix::prelude::*;
use clap::Parser;
use dotenv::dotenv;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use storefront_orders::actors::{CreateOrder, ImportOrders, ListOrders, OrderActor, UpdateOrderStatus};
use storefront_orders::config::AppConfig;
use storefront_orders::domain::customer::CustomerDirectory;
use storefront_orders::domain::order::{
    CreateOrderRequest, OrderFilter, OrderLineRequest, OrderService, OrderStatus,
};
use storefront_orders::domain::product::ProductCatalog;
use storefront_orders::import::{load_records, OrderImporter};
use storefront_orders::metrics::{self, Metrics};
use storefront_orders::seed::{seed, SeedData};
use storefront_orders::store::{InMemoryStore, OrderStore, PostgresStore, SeedStore};
use storefront_orders::utils::RetryConfig;

#[actix::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let config = AppConfig::parse();

    // Default to INFO level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,storefront_orders=debug"))
        )
        .init();

    tracing::info!("🚀 Starting storefront order service");

    // === 1. Initialize Prometheus metrics ===
    let metrics = Arc::new(Metrics::new()?);
    tracing::info!("📊 Metrics registry created with {} metrics", metrics.registry().gather().len());

    if let Some(port) = config.metrics_port {
        let registry = metrics.registry().clone();
        actix::spawn(async move {
            if let Err(e) = metrics::start_metrics_server(registry, port).await {
                tracing::error!("Metrics server error: {}", e);
            }
        });
    }

    // === 2. Open the store ===
    match &config.database_url {
        Some(url) => {
            tracing::info!("Connecting to Postgres...");
            let store = PostgresStore::connect(url).await?;
            store.ensure_schema().await?;
            run(Arc::new(store), &config, metrics).await
        }
        None => {
            tracing::info!("No DATABASE_URL set, using the in-memory store");
            run(Arc::new(InMemoryStore::new()), &config, metrics).await
        }
    }
}

async fn run<S>(store: Arc<S>, config: &AppConfig, metrics: Arc<Metrics>) -> anyhow::Result<()>
where
    S: OrderStore + CustomerDirectory + ProductCatalog + SeedStore + 'static,
{
    let settings = config.order_settings()?;

    // === 3. Seed ===
    let seed_data = match &config.seed_file {
        Some(path) => SeedData::from_json_file(path)?,
        None => SeedData::demo(),
    };
    seed(store.as_ref(), &seed_data, &settings.default_currency).await?;

    // === 4. Start the order actor ===
    let importer = OrderImporter::from_store(
        store.clone(),
        settings.default_currency.clone(),
        config.import_batch_size,
        metrics.clone(),
    )
    .with_retry(RetryConfig::default().with_attempts(config.import_retry_attempts));
    let service = OrderService::from_store(store, settings, metrics);
    let order_actor = OrderActor::new(Arc::new(service), Arc::new(importer)).start();

    // === 5. Demonstrate the order lifecycle ===
    tracing::info!("📝 Demonstrating order lifecycle");

    let order = order_actor
        .send(CreateOrder(CreateOrderRequest::new(
            1,
            vec![OrderLineRequest::new(1, 2), OrderLineRequest::new(2, 1)],
        )))
        .await??;
    tracing::info!(order_id = %order.id(), total = %order.total_amount(), "✅ Order created");

    for status in [OrderStatus::Processing, OrderStatus::Shipped, OrderStatus::Delivered] {
        let updated = order_actor
            .send(UpdateOrderStatus {
                order_id: order.id(),
                status,
            })
            .await??;
        tracing::info!(order_id = %updated.id(), status = %updated.status(), "✅ Order status updated");
    }

    match order_actor
        .send(UpdateOrderStatus {
            order_id: order.id(),
            status: OrderStatus::Cancelled,
        })
        .await?
    {
        Ok(_) => tracing::info!(order_id = %order.id(), "Delivered order cancelled"),
        Err(e) => tracing::info!(order_id = %order.id(), error = %e, "Cancellation after delivery refused"),
    }

    // === 6. Import an order feed ===
    if let Some(path) = &config.import_file {
        let entries = load_records(path)?;
        let report = order_actor.send(ImportOrders(entries)).await??;
        for rejected in &report.rejected {
            tracing::warn!(index = rejected.index, reason = %rejected.reason, "Import record rejected");
        }
    }

    let page = order_actor.send(ListOrders(OrderFilter::default())).await??;
    tracing::info!(total_count = page.total_count, page_size = page.page_size, "📋 Orders in store");
    for order in &page.orders {
        tracing::info!(
            order_id = %order.id(),
            status = %order.status(),
            total = %order.total_amount(),
            currency = %order.currency(),
            "  order"
        );
    }

    // Keep serving metrics until interrupted
    if config.metrics_port.is_some() {
        tracing::info!("⏳ Serving metrics, press Ctrl-C to exit");
        tokio::signal::ctrl_c().await?;
    }

    tracing::info!("🎉 Done");

    Ok(())
}
