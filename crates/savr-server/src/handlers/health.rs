//! Health check handler

use std::sync::Arc;

use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::AppState;

/// GET /api/health - Collaborator configuration and AI reachability
pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let report = state.pipeline.health().await;
    Json(json!({
        "success": true,
        "version": env!("CARGO_PKG_VERSION"),
        "ai": report.ai,
        "aiHealthy": report.ai_healthy,
        "ocr": report.ocr,
        "imageSearch": report.image_search,
    }))
}
