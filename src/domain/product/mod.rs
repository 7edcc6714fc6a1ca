// ============================================================================
// Product Domain - Catalog records consumed by the order aggregate
// ============================================================================
//
// Products are owned by the catalog, not by orders. The order aggregate only
// reads them (batch lookup by id) and copies their current price.
//
// ============================================================================

pub mod value_objects;
pub mod entity;
pub mod catalog;

pub use value_objects::*;
pub use entity::*;
pub use catalog::*;
