// ============================================================================
// storefront_orders - Order aggregate and status lifecycle for a storefront
// ============================================================================
//
// - domain/   Orders, customers, products and their validation rules
// - store/    OrderStore and lookup implementations (in-memory, Postgres)
// - import/   Bulk import reconciliation
// - seed      Idempotent start-up data
// - actors/   Single-writer actor in front of the order service
// - metrics/  Prometheus registry and /metrics endpoint
// - utils/    Retry with exponential backoff
//
// ============================================================================

pub mod actors;
pub mod config;
pub mod domain;
pub mod import;
pub mod metrics;
pub mod seed;
pub mod store;
pub mod utils;
