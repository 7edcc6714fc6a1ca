// Private module declaration
mod server;

use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry};

// Re-export for public API
pub use server::start_metrics_server;

// ============================================================================
// Metrics Module - Prometheus metrics for the order aggregate
// ============================================================================
//
// - Order creation (accepted, rejected by reason, latency)
// - Status transitions (applied by from/to, rejected)
// - Bulk import outcomes (orders, dropped items, batches)
//
// Each Metrics owns its own Registry, scraped via /metrics.
// ============================================================================

pub struct Metrics {
    registry: Registry,

    // Creation
    pub orders_created: IntCounter,
    pub order_create_rejected: IntCounterVec,
    pub order_create_duration: Histogram,

    // Status lifecycle
    pub status_transitions: IntCounterVec,
    pub status_transitions_rejected: IntCounter,

    // Import
    pub import_orders: IntCounterVec,
    pub import_items_dropped: IntCounter,
    pub import_batches: IntCounterVec,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let orders_created = IntCounter::new("orders_created_total", "Total orders created")?;
        registry.register(Box::new(orders_created.clone()))?;

        let order_create_rejected = IntCounterVec::new(
            Opts::new("order_create_rejected_total", "Order creations rejected"),
            &["reason"],
        )?;
        registry.register(Box::new(order_create_rejected.clone()))?;

        let order_create_duration = Histogram::with_opts(
            HistogramOpts::new("order_create_duration_seconds", "Order creation duration")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
        )?;
        registry.register(Box::new(order_create_duration.clone()))?;

        let status_transitions = IntCounterVec::new(
            Opts::new("order_status_transitions_total", "Applied order status transitions"),
            &["from", "to"],
        )?;
        registry.register(Box::new(status_transitions.clone()))?;

        let status_transitions_rejected = IntCounter::new(
            "order_status_transitions_rejected_total",
            "Status transitions refused by the status policy",
        )?;
        registry.register(Box::new(status_transitions_rejected.clone()))?;

        let import_orders = IntCounterVec::new(
            Opts::new("import_orders_total", "Imported order records by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(import_orders.clone()))?;

        let import_items_dropped = IntCounter::new(
            "import_items_dropped_total",
            "Imported order items dropped during reconciliation",
        )?;
        registry.register(Box::new(import_items_dropped.clone()))?;

        let import_batches = IntCounterVec::new(
            Opts::new("import_batches_total", "Import batches by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(import_batches.clone()))?;

        Ok(Self {
            registry,
            orders_created,
            order_create_rejected,
            order_create_duration,
            status_transitions,
            status_transitions_rejected,
            import_orders,
            import_items_dropped,
            import_batches,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
