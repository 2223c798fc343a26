//! Receipt handlers

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};

use super::{parse_object, UserQuery};
use crate::{AppError, AppState};
use savr_core::pipeline::AnalyzeRequest;
use savr_core::{LineItem, ReceiptRecord, ReceiptStatus, Store};

/// Summary of one processed receipt
#[derive(Debug, Serialize)]
pub struct ProcessResult {
    pub receipt_id: String,
    pub items_found: usize,
    pub items: Vec<LineItem>,
    pub status: ReceiptStatus,
}

/// POST /api/receipts/process - OCR a stored receipt image and persist its items
pub async fn process_receipt(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let body = parse_object(&body)?;
    let key = body
        .get("s3Key")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .ok_or_else(|| AppError::bad_request("s3Key is required"))?;

    let outcome = state
        .pipeline
        .process_receipt(key)
        .await
        .map_err(AppError::from_core)?;

    let record = outcome.record;
    let message = match record.status {
        ReceiptStatus::Processed => "Receipt processed successfully",
        ReceiptStatus::Error => "Receipt could not be read; an error record was saved",
    };

    Ok(Json(json!({
        "success": true,
        "message": message,
        "result": ProcessResult {
            receipt_id: record.receipt_id,
            items_found: record.items.len(),
            items: record.items,
            status: record.status,
        },
    })))
}

/// POST /api/receipts/analyze - Generate insights for a receipt or item list
pub async fn analyze_receipt(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let body = parse_object(&body)?;
    let request: AnalyzeRequest = serde_json::from_value(body).map_err(|e| {
        AppError::bad_request("Invalid analysis request").with_details(e.to_string())
    })?;

    let outcome = state
        .pipeline
        .analyze(request)
        .await
        .map_err(AppError::from_core)?;

    let message = match outcome.fallback {
        None => "Receipt analyzed successfully",
        Some(_) => "Receipt analyzed with basic insights (AI analysis unavailable)",
    };

    Ok(Json(json!({
        "success": true,
        "s3Key": outcome.s3_key,
        "userId": outcome.user_id,
        "insights": outcome.insights,
        "message": message,
    })))
}

/// GET /api/receipts - Recent receipt records for a user
pub async fn list_receipts(
    State(state): State<Arc<AppState>>,
    Query(params): Query<UserQuery>,
) -> Result<Json<Value>, AppError> {
    let user_id = params.user_or_anonymous();
    let limit = params.limit();

    let receipts: Vec<ReceiptRecord> = state
        .pipeline
        .store()
        .recent_receipts(&user_id, limit)
        .map_err(AppError::from_core)?;

    state.pipeline.audit(
        &user_id,
        "list",
        Some("receipts"),
        None,
        Some(&format!("count={}", receipts.len())),
    );

    Ok(Json(json!({
        "success": true,
        "receipts": receipts,
        "count": receipts.len(),
    })))
}
