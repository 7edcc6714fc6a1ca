use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::domain::customer::CustomerId;
use crate::domain::order::OrderStatus;
use crate::domain::product::ProductId;

/// An order as it arrives from an external feed. Nothing here is trusted.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRecord {
    #[serde(default)]
    pub customer_id: Option<CustomerId>,
    #[serde(default)]
    pub status: Option<RawStatus>,
    #[serde(default, alias = "orderDate")]
    pub order_date_utc: Option<DateTime<Utc>>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub items: Vec<ImportItem>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportItem {
    #[serde(default)]
    pub product_id: Option<ProductId>,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
    /// Historical price, used instead of the catalog price when present
    #[serde(default)]
    pub price: Option<Decimal>,
}

fn default_quantity() -> i64 {
    1
}

/// Status as written by the feed: a numeric code, a name, or anything else
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawStatus {
    Code(i64),
    Name(String),
    Other(serde_json::Value),
}

impl RawStatus {
    /// The recognized status, or `Pending` for anything unrecognized
    pub fn resolve(&self) -> OrderStatus {
        let resolved = match self {
            RawStatus::Code(code) => OrderStatus::from_code(*code),
            RawStatus::Name(name) => name.parse().ok(),
            RawStatus::Other(_) => None,
        };
        resolved.unwrap_or(OrderStatus::Pending)
    }
}

/// One record of a feed, or the reason it could not be read
pub type ImportEntry = Result<ImportRecord, String>;

/// Parse each element on its own, so one malformed record does not sink the feed
pub fn parse_records(values: Vec<serde_json::Value>) -> Vec<ImportEntry> {
    values
        .into_iter()
        .map(|value| serde_json::from_value(value).map_err(|e| format!("malformed record: {}", e)))
        .collect()
}

/// Read a JSON array of import records
pub fn load_records(path: impl AsRef<Path>) -> anyhow::Result<Vec<ImportEntry>> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read import file {}", path.display()))?;
    let values: Vec<serde_json::Value> = serde_json::from_str(&raw)
        .with_context(|| format!("Import file {} is not a JSON array", path.display()))?;

    let entries = parse_records(values);
    tracing::info!(
        path = %path.display(),
        records = entries.len(),
        malformed = entries.iter().filter(|entry| entry.is_err()).count(),
        "Loaded import records"
    );
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_status_codes_and_names() {
        assert_eq!(RawStatus::Code(2).resolve(), OrderStatus::Shipped);
        assert_eq!(RawStatus::Name("delivered".into()).resolve(), OrderStatus::Delivered);
        assert_eq!(RawStatus::Code(17).resolve(), OrderStatus::Pending);
        assert_eq!(RawStatus::Name("lost in transit".into()).resolve(), OrderStatus::Pending);
        assert_eq!(RawStatus::Other(serde_json::json!(true)).resolve(), OrderStatus::Pending);
    }

    #[test]
    fn test_record_defaults() {
        let record: ImportRecord = serde_json::from_value(serde_json::json!({
            "items": [{ "productId": 3 }]
        }))
        .unwrap();

        assert!(record.customer_id.is_none());
        assert!(record.status.is_none());
        assert!(record.order_date_utc.is_none());
        assert_eq!(record.items[0].product_id, Some(ProductId(3)));
        assert_eq!(record.items[0].quantity, 1);
        assert!(record.items[0].price.is_none());
    }

    #[test]
    fn test_mixed_status_shapes_deserialize() {
        let records: Vec<ImportRecord> = serde_json::from_value(serde_json::json!([
            { "status": 1, "items": [] },
            { "status": "Cancelled", "items": [] },
            { "status": null, "items": [] },
            { "status": { "code": 9 }, "items": [] }
        ]))
        .unwrap();

        assert_eq!(records[0].status.as_ref().map(RawStatus::resolve), Some(OrderStatus::Processing));
        assert_eq!(records[1].status.as_ref().map(RawStatus::resolve), Some(OrderStatus::Cancelled));
        assert!(records[2].status.is_none());
        assert_eq!(records[3].status.as_ref().map(RawStatus::resolve), Some(OrderStatus::Pending));
    }

    #[test]
    fn test_load_records_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"customerId": 1, "orderDate": "2024-03-01T10:00:00Z", "items": [{{"productId": 1, "quantity": 2, "price": "12.50"}}]}}]"#
        )
        .unwrap();

        let entries = load_records(file.path()).unwrap();

        assert_eq!(entries.len(), 1);
        let record = entries[0].as_ref().unwrap();
        assert_eq!(record.customer_id, Some(CustomerId(1)));
        assert!(record.order_date_utc.is_some());
        assert_eq!(record.items[0].price, Some(Decimal::new(1250, 2)));
    }

    #[test]
    fn test_malformed_record_does_not_sink_the_feed() {
        let entries = parse_records(vec![
            serde_json::json!({ "customerId": "abc", "items": [{ "productId": 1 }] }),
            serde_json::json!({ "customerId": 1, "items": [{ "quantity": 2 }, { "productId": 1 }] }),
            serde_json::json!({ "orderDate": "yesterday", "items": [] }),
        ]);

        assert_eq!(entries.len(), 3);
        assert!(entries[0].is_err());
        assert!(entries[2].is_err());

        let record = entries[1].as_ref().unwrap();
        assert_eq!(record.items.len(), 2);
        assert_eq!(record.items[0].product_id, None);
        assert_eq!(record.items[1].product_id, Some(ProductId(1)));
    }

    #[test]
    fn test_load_records_reports_bad_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        assert!(load_records(file.path()).is_err());
    }
}
