// ============================================================================
// Bulk Import - Reconcile externally supplied orders against the catalog
// ============================================================================
//
// Records are loaded from JSON, reconciled one by one (anonymize unknown
// customers, drop unknown products, default unknown statuses) and committed
// in atomic batches. A failed batch is skipped; earlier batches stay.
//
// ============================================================================

mod importer;
mod records;

pub use importer::{ImportReport, OrderImporter, RejectedRecord};
pub use records::{load_records, parse_records, ImportEntry, ImportItem, ImportRecord, RawStatus};
