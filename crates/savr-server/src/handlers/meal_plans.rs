//! Meal plan handlers

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{parse_body, UserQuery};
use crate::{AppError, AppState};
use savr_core::pipeline::PlanRequest;
use savr_core::Store;

/// POST /api/meal-plans/generate - Generate and persist a weekly plan
pub async fn generate_meal_plan(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let body = parse_body(&body)?;
    let request = PlanRequest::from_json(&body).map_err(AppError::from_core)?;

    let outcome = state
        .pipeline
        .generate_plan(request)
        .await
        .map_err(AppError::from_core)?;

    let message = match outcome.fallback {
        None => "Meal plan generated successfully",
        Some(_) => "Basic meal plan generated (AI planning unavailable)",
    };

    Ok(Json(json!({
        "success": true,
        "planId": outcome.plan_id,
        "meals": outcome.meal_plan.meals,
        "mealPlan": outcome.meal_plan,
        "message": message,
    })))
}

/// Query parameters for meal plan retrieval
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealPlanQuery {
    pub user_id: Option<String>,
    pub plan_date: Option<String>,
    pub limit: Option<usize>,
}

/// GET /api/meal-plans - One plan by date, or the most recent plans
pub async fn get_meal_plans(
    State(state): State<Arc<AppState>>,
    Query(params): Query<MealPlanQuery>,
) -> Result<Json<Value>, AppError> {
    let user = UserQuery {
        user_id: params.user_id,
        limit: params.limit,
    };
    let user_id = user.user_or_anonymous();
    let store = state.pipeline.store();

    if let Some(date) = params.plan_date.as_deref().filter(|d| !d.is_empty()) {
        let plan_date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .map_err(|_| AppError::bad_request("planDate must be YYYY-MM-DD"))?;

        let plan = store
            .get_meal_plan(&user_id, plan_date)
            .map_err(AppError::from_core)?;
        state
            .pipeline
            .audit(&user_id, "view", Some("meal_plan"), Some(date), None);

        return Ok(Json(json!({"success": true, "mealPlan": plan})));
    }

    let plans = store
        .recent_meal_plans(&user_id, user.limit())
        .map_err(AppError::from_core)?;
    state.pipeline.audit(
        &user_id,
        "list",
        Some("meal_plans"),
        None,
        Some(&format!("count={}", plans.len())),
    );

    Ok(Json(json!({
        "success": true,
        "mealPlans": plans,
        "count": plans.len(),
    })))
}
