// ============================================================================
// Customer Domain - Customer records referenced by orders
// ============================================================================
//
// - Value objects (CustomerId, Email, PhoneNumber, Address)
// - Customer record with its validation rules
// - CustomerDirectory lookup trait
//
// Orders hold only a nullable reference to a customer; they never own one.
//
// ============================================================================

pub mod value_objects;
pub mod entity;
pub mod directory;

pub use value_objects::*;
pub use entity::*;
pub use directory::*;
