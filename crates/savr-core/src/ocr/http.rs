//! Remote OCR service client
//!
//! # Configuration
//!
//! Environment variables:
//! - `SAVR_OCR_URL`: Base URL of the analysis service (required)

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use super::{ExpenseAnalysis, OcrEngine};
use crate::error::{Error, Result};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeExpenseRequest<'a> {
    document_key: &'a str,
}

/// OCR engine backed by an HTTP service exposing `POST /analyze-expense`
#[derive(Clone)]
pub struct HttpOcrEngine {
    http_client: Client,
    base_url: String,
}

impl HttpOcrEngine {
    pub fn new(base_url: &str) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Create from `SAVR_OCR_URL`
    pub fn from_env() -> Option<Self> {
        let url = std::env::var("SAVR_OCR_URL").ok()?;
        if url.trim().is_empty() {
            return None;
        }
        Some(Self::new(&url))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl OcrEngine for HttpOcrEngine {
    fn name(&self) -> &str {
        "http"
    }

    async fn analyze_expense(&self, document_key: &str) -> Result<ExpenseAnalysis> {
        debug!(key = %document_key, url = %self.base_url, "Requesting expense analysis");

        let response = self
            .http_client
            .post(format!("{}/analyze-expense", self.base_url))
            .json(&AnalyzeExpenseRequest { document_key })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Ocr(format!("OCR service error {}: {}", status, body)));
        }

        Ok(response.json().await?)
    }
}
