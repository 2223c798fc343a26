//! Line item extraction from expense analysis results
//!
//! Two tiers: an itemized pass over typed line item fields, then, only when
//! that yields nothing, a single synthesized item per document built from the
//! TOTAL and VENDOR_NAME summary fields.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::models::{LineItem, ReceiptRecord, ReceiptStatus, ANONYMOUS_USER};
use crate::normalize::{parse_price, parse_quantity, try_parse_decimal};
use crate::ocr::{
    ExpenseAnalysis, OcrLineItem, FIELD_ITEM, FIELD_PRICE, FIELD_QUANTITY, FIELD_TOTAL,
    FIELD_VENDOR_NAME,
};

/// Vendor name used when a receipt does not carry one
pub const UNKNOWN_STORE: &str = "Unknown Store";

/// Identity derived from a receipt image storage key (`receipts/{user}/{file}`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptKey {
    pub key: String,
    pub user_id: String,
    pub receipt_id: String,
}

impl ReceiptKey {
    pub fn parse(key: &str) -> Self {
        let segments: Vec<&str> = key.split('/').collect();
        let user_id = segments
            .get(1)
            .filter(|s| !s.is_empty())
            .copied()
            .unwrap_or(ANONYMOUS_USER);
        let receipt_id = segments.last().copied().unwrap_or(key);

        Self {
            key: key.to_string(),
            user_id: user_id.to_string(),
            receipt_id: receipt_id.to_string(),
        }
    }
}

fn itemized(line_item: &OcrLineItem) -> Option<LineItem> {
    let mut name = None;
    let mut price = Decimal::ZERO;
    let mut quantity = 1;

    for field in &line_item.fields {
        match field.field_type.as_str() {
            FIELD_ITEM => name = Some(field.value.trim()),
            FIELD_PRICE => price = parse_price(&field.value),
            FIELD_QUANTITY => quantity = parse_quantity(&field.value),
            _ => {}
        }
    }

    name.filter(|n| !n.is_empty())
        .map(|n| LineItem::new(n, price, quantity))
}

/// Convert an expense analysis into ordered line items; never fails
pub fn extract_line_items(analysis: &ExpenseAnalysis) -> Vec<LineItem> {
    let items: Vec<LineItem> = analysis
        .documents
        .iter()
        .flat_map(|doc| &doc.line_item_groups)
        .flat_map(|group| &group.line_items)
        .filter_map(itemized)
        .collect();

    if !items.is_empty() {
        return items;
    }

    analysis
        .documents
        .iter()
        .filter_map(|doc| {
            // Later summary fields win; garbled ones are skipped
            let total = doc
                .summary_values(FIELD_TOTAL)
                .filter_map(try_parse_decimal)
                .last()?;
            if total <= Decimal::ZERO {
                return None;
            }
            let vendor = doc
                .summary_values(FIELD_VENDOR_NAME)
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .last()
                .unwrap_or(UNKNOWN_STORE);
            Some(LineItem::new(format!("Purchase from {}", vendor), total, 1))
        })
        .collect()
}

/// Record for a successful extraction
pub fn build_receipt_record(
    key: &ReceiptKey,
    items: Vec<LineItem>,
    processed_at: DateTime<Utc>,
) -> ReceiptRecord {
    ReceiptRecord {
        user_id: key.user_id.clone(),
        receipt_id: key.receipt_id.clone(),
        items,
        source_key: key.key.clone(),
        processed_at,
        status: ReceiptStatus::Processed,
        error: None,
        insights: None,
        analyzed_at: None,
    }
}

/// Record for a failed extraction, under its own `error-YYYYMMDD-HHMMSS` identity
pub fn error_record(key: &ReceiptKey, error: &str, processed_at: DateTime<Utc>) -> ReceiptRecord {
    ReceiptRecord {
        user_id: key.user_id.clone(),
        receipt_id: format!("error-{}", processed_at.format("%Y%m%d-%H%M%S")),
        items: Vec::new(),
        source_key: key.key.clone(),
        processed_at,
        status: ReceiptStatus::Error,
        error: Some(error.to_string()),
        insights: None,
        analyzed_at: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn analysis(value: serde_json::Value) -> ExpenseAnalysis {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_receipt_key_parse() {
        let key = ReceiptKey::parse("receipts/u42/1700000000-milk.jpg");
        assert_eq!(key.user_id, "u42");
        assert_eq!(key.receipt_id, "1700000000-milk.jpg");

        let key = ReceiptKey::parse("loose.jpg");
        assert_eq!(key.user_id, ANONYMOUS_USER);
        assert_eq!(key.receipt_id, "loose.jpg");

        assert_eq!(ReceiptKey::parse("receipts//x.jpg").user_id, ANONYMOUS_USER);
    }

    #[test]
    fn test_itemized_pass() {
        let items = extract_line_items(&analysis(json!({
            "documents": [{"lineItemGroups": [{"lineItems": [
                {"fields": [
                    {"type": "ITEM", "value": "Milk"},
                    {"type": "PRICE", "value": "$3.50"},
                    {"type": "QUANTITY", "value": "2"}
                ]},
                {"fields": [{"type": "ITEM", "value": "Bread"}, {"type": "PRICE", "value": "N/A"}]},
                {"fields": [{"type": "PRICE", "value": "9.99"}]},
                {"fields": [{"type": "ITEM", "value": "  "}]}
            ]}]}]
        })));

        assert_eq!(items.len(), 2);
        assert_eq!(items[0], LineItem::new("Milk", Decimal::new(350, 2), 2));
        assert_eq!(items[1], LineItem::new("Bread", Decimal::ZERO, 1));
    }

    #[test]
    fn test_summary_fallback() {
        let items = extract_line_items(&analysis(json!({
            "documents": [{"summaryFields": [
                {"type": "TOTAL", "value": "$42.10"},
                {"type": "VENDOR_NAME", "value": "Green Grocer"}
            ]}]
        })));
        assert_eq!(
            items,
            vec![LineItem::new("Purchase from Green Grocer", Decimal::new(4210, 2), 1)]
        );

        let items = extract_line_items(&analysis(json!({
            "documents": [{"summaryFields": [{"type": "TOTAL", "value": "5"}]}]
        })));
        assert_eq!(items[0].name, "Purchase from Unknown Store");
    }

    #[test]
    fn test_summary_fallback_repeated_fields() {
        let items = extract_line_items(&analysis(json!({
            "documents": [{"summaryFields": [
                {"type": "VENDOR_NAME", "value": "Green Grocer"},
                {"type": "TOTAL", "value": "$8.00"},
                {"type": "TOTAL", "value": "N/A"},
                {"type": "VENDOR_NAME", "value": ""},
                {"type": "TOTAL", "value": "$12.00"},
                {"type": "TOTAL", "value": "total:"},
                {"type": "VENDOR_NAME", "value": "Green Grocer #12"}
            ]}]
        })));
        assert_eq!(
            items,
            vec![LineItem::new(
                "Purchase from Green Grocer #12",
                Decimal::new(1200, 2),
                1
            )]
        );

        let items = extract_line_items(&analysis(json!({
            "documents": [{"summaryFields": [
                {"type": "TOTAL", "value": "N/A"},
                {"type": "TOTAL", "value": "$12.00"}
            ]}]
        })));
        assert_eq!(items[0].price, Decimal::new(1200, 2));
    }

    #[test]
    fn test_nothing_usable() {
        let items = extract_line_items(&analysis(json!({
            "documents": [{"summaryFields": [{"type": "TOTAL", "value": "0.00"}]}]
        })));
        assert!(items.is_empty());
        assert!(extract_line_items(&ExpenseAnalysis::default()).is_empty());
    }

    #[test]
    fn test_records() {
        let key = ReceiptKey::parse("receipts/u1/r.jpg");
        let at = Utc.with_ymd_and_hms(2025, 3, 4, 5, 6, 7).unwrap();

        let record = build_receipt_record(&key, Vec::new(), at);
        assert_eq!(record.status, ReceiptStatus::Processed);
        assert_eq!(record.receipt_id, "r.jpg");

        let record = error_record(&key, "engine down", at);
        assert_eq!(record.receipt_id, "error-20250304-050607");
        assert_eq!(record.status, ReceiptStatus::Error);
        assert_eq!(record.error.as_deref(), Some("engine down"));
        assert!(record.items.is_empty());
    }
}
