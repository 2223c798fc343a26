//! Preference and profile handlers

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    Json,
};
use serde_json::{json, Value};

use super::{parse_object, UserQuery};
use crate::{AppError, AppState};
use savr_core::{PreferenceOverrides, UserProfile};

/// GET /api/preferences - Resolved preferences (defaults when none are stored)
pub async fn get_preferences(
    State(state): State<Arc<AppState>>,
    Query(params): Query<UserQuery>,
) -> Json<Value> {
    let user_id = params.user_or_anonymous();
    let preferences = state.pipeline.preferences(&user_id);

    state
        .pipeline
        .audit(&user_id, "view", Some("preferences"), None, None);

    Json(json!({"success": true, "preferences": preferences}))
}

/// POST /api/preferences - Merge request values into stored preferences and save
pub async fn save_preferences(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let body = parse_object(&body)?;
    let user_id = UserQuery {
        user_id: body.get("userId").and_then(Value::as_str).map(str::to_string),
        limit: None,
    }
    .user_or_anonymous();

    // Accept both {preferences: {...}} and a flat body
    let fields = body.get("preferences").unwrap_or(&body);
    let overrides = PreferenceOverrides::from_json(fields).map_err(AppError::from_core)?;

    let preferences = state
        .pipeline
        .save_preferences(&user_id, &overrides)
        .map_err(|e| AppError::internal("Error saving preferences").with_details(e.to_string()))?;

    state
        .pipeline
        .audit(&user_id, "update", Some("preferences"), None, None);

    Ok(Json(json!({
        "success": true,
        "preferences": preferences,
        "message": "Preferences saved successfully",
    })))
}

/// GET /api/profile - Allergies, custom preferences and budget tracking
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    Query(params): Query<UserQuery>,
) -> Result<Json<UserProfile>, AppError> {
    let user_id = params.required_user()?;
    let profile = state
        .pipeline
        .profile(&user_id)
        .map_err(AppError::from_core)?;

    state
        .pipeline
        .audit(&user_id, "view", Some("profile"), None, None);

    Ok(Json(profile))
}

/// POST /api/profile - Replace a user's profile
pub async fn save_profile(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let body = parse_object(&body)?;
    let profile = UserProfile::from_json(&body).map_err(AppError::from_core)?;
    let user_id = profile.user_id.clone();

    state
        .pipeline
        .save_profile(profile)
        .map_err(|e| AppError::internal("Error saving profile").with_details(e.to_string()))?;

    state
        .pipeline
        .audit(&user_id, "update", Some("profile"), None, None);

    Ok(Json(json!({
        "success": true,
        "message": "Profile saved successfully",
        "userId": user_id,
    })))
}
