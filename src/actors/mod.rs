// ============================================================================
// Actors Module
// ============================================================================
//
// The OrderActor is the single writer in front of the order service: every
// create, status change and import goes through its mailbox one at a time.
// Reads are answered concurrently.
//
// ============================================================================

mod order_actor;

pub use order_actor::{CreateOrder, GetOrder, ImportOrders, ListOrders, OrderActor, UpdateOrderStatus};
