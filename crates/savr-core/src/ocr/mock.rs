//! Fixed-result OCR engine for tests and offline runs

use std::sync::Mutex;

use async_trait::async_trait;

use super::{ExpenseAnalysis, ExpenseDocument, ExpenseField, LineItemGroup, OcrEngine, OcrLineItem};
use super::{FIELD_ITEM, FIELD_PRICE, FIELD_QUANTITY};
use crate::error::{Error, Result};

/// OCR engine returning a canned analysis or a canned failure
pub struct MockOcrEngine {
    outcome: std::result::Result<ExpenseAnalysis, String>,
    calls: Mutex<Vec<String>>,
}

impl MockOcrEngine {
    pub fn new(analysis: ExpenseAnalysis) -> Self {
        Self {
            outcome: Ok(analysis),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// One document with one line item per `(name, price, quantity)`
    pub fn with_items(items: &[(&str, &str, &str)]) -> Self {
        let line_items = items
            .iter()
            .map(|(name, price, quantity)| OcrLineItem {
                fields: vec![
                    ExpenseField::new(FIELD_ITEM, name),
                    ExpenseField::new(FIELD_PRICE, price),
                    ExpenseField::new(FIELD_QUANTITY, quantity),
                ],
            })
            .collect();
        Self::new(ExpenseAnalysis {
            documents: vec![ExpenseDocument {
                line_item_groups: vec![LineItemGroup { line_items }],
                summary_fields: Vec::new(),
            }],
        })
    }

    /// Engine whose every call fails with `message`
    pub fn failing(message: &str) -> Self {
        Self {
            outcome: Err(message.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Document keys analyzed so far
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl OcrEngine for MockOcrEngine {
    fn name(&self) -> &str {
        "mock"
    }

    async fn analyze_expense(&self, document_key: &str) -> Result<ExpenseAnalysis> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(document_key.to_string());
        }
        self.outcome.clone().map_err(Error::Ocr)
    }
}
