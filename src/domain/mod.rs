// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// Each area has its own subdirectory with value objects, records and the
// lookup traits the order aggregate depends on. Persistence lives in
// `crate::store`.
//
// ============================================================================

pub mod validation;
pub mod order;
pub mod customer;
pub mod product;
