//! Expense-analysis result shape
//!
//! Accepts both the compact form (`documents[].lineItemGroups[].lineItems[].fields[{type, value}]`)
//! and the AnalyzeExpense wire form (`ExpenseDocuments[].LineItemGroups[].LineItems[].LineItemExpenseFields[{Type: {Text}, ValueDetection: {Text}}]`).

use serde::{Deserialize, Serialize};

/// Field type tag for a product name
pub const FIELD_ITEM: &str = "ITEM";
/// Field type tag for a unit price
pub const FIELD_PRICE: &str = "PRICE";
/// Field type tag for a quantity
pub const FIELD_QUANTITY: &str = "QUANTITY";
/// Summary field type tag for the receipt total
pub const FIELD_TOTAL: &str = "TOTAL";
/// Summary field type tag for the store name
pub const FIELD_VENDOR_NAME: &str = "VENDOR_NAME";

/// Result of running expense analysis over one receipt image
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseAnalysis {
    #[serde(default, alias = "ExpenseDocuments")]
    pub documents: Vec<ExpenseDocument>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseDocument {
    #[serde(default, alias = "LineItemGroups")]
    pub line_item_groups: Vec<LineItemGroup>,
    #[serde(default, alias = "SummaryFields")]
    pub summary_fields: Vec<ExpenseField>,
}

impl ExpenseDocument {
    /// Values of every summary field with the given type tag, in document order
    pub fn summary_values<'a>(&'a self, field_type: &'a str) -> impl Iterator<Item = &'a str> {
        self.summary_fields
            .iter()
            .filter(move |f| f.field_type == field_type)
            .map(|f| f.value.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItemGroup {
    #[serde(default, alias = "LineItems")]
    pub line_items: Vec<OcrLineItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrLineItem {
    #[serde(default, alias = "LineItemExpenseFields")]
    pub fields: Vec<ExpenseField>,
}

/// One typed OCR field; both tag and value are raw text
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawField")]
pub struct ExpenseField {
    #[serde(rename = "type")]
    pub field_type: String,
    pub value: String,
}

impl ExpenseField {
    pub fn new(field_type: &str, value: &str) -> Self {
        Self {
            field_type: field_type.to_string(),
            value: value.to_string(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FieldText {
    Plain(String),
    Detected {
        #[serde(rename = "Text", alias = "text", default)]
        text: Option<String>,
    },
}

impl FieldText {
    fn into_text(self) -> String {
        match self {
            Self::Plain(s) => s,
            Self::Detected { text } => text.unwrap_or_default(),
        }
    }
}

#[derive(Deserialize)]
struct RawField {
    #[serde(rename = "type", alias = "Type", default)]
    field_type: Option<FieldText>,
    #[serde(rename = "value", alias = "ValueDetection", default)]
    value: Option<FieldText>,
}

impl From<RawField> for ExpenseField {
    fn from(raw: RawField) -> Self {
        Self {
            field_type: raw
                .field_type
                .map(FieldText::into_text)
                .unwrap_or_default()
                .trim()
                .to_uppercase(),
            value: raw.value.map(FieldText::into_text).unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_compact_form() {
        let analysis: ExpenseAnalysis = serde_json::from_value(json!({
            "documents": [{
                "lineItemGroups": [{"lineItems": [{"fields": [
                    {"type": "ITEM", "value": "Milk"},
                    {"type": "price", "value": "$3.50"}
                ]}]}],
                "summaryFields": [{"type": "TOTAL", "value": "3.50"}]
            }]
        }))
        .unwrap();

        let doc = &analysis.documents[0];
        let fields = &doc.line_item_groups[0].line_items[0].fields;
        assert_eq!(fields[0], ExpenseField::new(FIELD_ITEM, "Milk"));
        assert_eq!(fields[1].field_type, FIELD_PRICE);
        assert_eq!(doc.summary_values(FIELD_TOTAL).collect::<Vec<_>>(), vec!["3.50"]);
    }

    #[test]
    fn test_wire_form() {
        let analysis: ExpenseAnalysis = serde_json::from_value(json!({
            "ExpenseDocuments": [{
                "LineItemGroups": [{"LineItems": [{"LineItemExpenseFields": [
                    {"Type": {"Text": "ITEM", "Confidence": 99.1}, "ValueDetection": {"Text": "Eggs"}},
                    {"Type": {"Text": "QUANTITY"}, "ValueDetection": {}}
                ]}]}],
                "SummaryFields": [{"Type": {"Text": "VENDOR_NAME"}, "ValueDetection": {"Text": "Corner Shop"}}]
            }]
        }))
        .unwrap();

        let doc = &analysis.documents[0];
        let fields = &doc.line_item_groups[0].line_items[0].fields;
        assert_eq!(fields[0], ExpenseField::new(FIELD_ITEM, "Eggs"));
        assert_eq!(fields[1], ExpenseField::new(FIELD_QUANTITY, ""));
        assert_eq!(
            doc.summary_values(FIELD_VENDOR_NAME).last(),
            Some("Corner Shop")
        );
    }

    #[test]
    fn test_empty_analysis() {
        let analysis: ExpenseAnalysis = serde_json::from_value(json!({})).unwrap();
        assert!(analysis.documents.is_empty());
    }
}
