//! Receipt OCR with pluggable engines
//!
//! # Architecture
//!
//! - `OcrEngine` runs expense analysis for a stored receipt image
//! - `HttpOcrEngine` calls a remote analysis service (`SAVR_OCR_URL`)
//! - `DirectoryOcrEngine` reads pre-computed results from disk (`SAVR_OCR_DIR`)
//! - `MockOcrEngine` returns a fixed result for tests
//!
//! Engines only fetch; turning fields into line items is `crate::extract`'s job.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;

mod http;
mod local;
mod mock;
mod types;

pub use http::HttpOcrEngine;
pub use local::DirectoryOcrEngine;
pub use mock::MockOcrEngine;
pub use types::{
    ExpenseAnalysis, ExpenseDocument, ExpenseField, LineItemGroup, OcrLineItem, FIELD_ITEM,
    FIELD_PRICE, FIELD_QUANTITY, FIELD_TOTAL, FIELD_VENDOR_NAME,
};

/// Expense analysis over a receipt image referenced by storage key
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Human-readable engine name for logs and health output
    fn name(&self) -> &str;

    /// Analyze the receipt stored under `document_key`
    async fn analyze_expense(&self, document_key: &str) -> Result<ExpenseAnalysis>;
}

/// Pick an engine from the environment
///
/// `SAVR_OCR_URL` wins over `SAVR_OCR_DIR`; `None` when neither is set.
pub fn from_env() -> Option<Arc<dyn OcrEngine>> {
    if let Some(engine) = HttpOcrEngine::from_env() {
        return Some(Arc::new(engine));
    }
    DirectoryOcrEngine::from_env().map(|engine| Arc::new(engine) as Arc<dyn OcrEngine>)
}
