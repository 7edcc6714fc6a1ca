// ============================================================================
// Order Domain - Business Logic for the Order Aggregate
// ============================================================================
//
// - Value objects (OrderId, Currency, OrderItem, OrderStatus)
// - Requests and list filters (CreateOrderRequest, OrderFilter)
// - Errors (OrderError enum)
// - Aggregate (Order with status lifecycle rules)
// - Service (OrderService orchestrating lookups and persistence)
//
// ============================================================================

pub mod value_objects;
pub mod commands;
pub mod errors;
pub mod aggregate;
pub mod command_handler;

// Re-export for convenience
pub use value_objects::*;
pub use commands::*;
pub use errors::*;
pub use aggregate::*;
pub use command_handler::*;
