//! HTTP request handlers organized by domain
//!
//! Each submodule contains handlers for a specific API area.

pub mod health;
pub mod meal_plans;
pub mod preferences;
pub mod receipts;

// Re-export all handlers for use in router
pub use health::*;
pub use meal_plans::*;
pub use preferences::*;
pub use receipts::*;

use axum::body::Bytes;
use serde::Deserialize;
use serde_json::Value;

use crate::{AppError, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};
use savr_core::ANONYMOUS_USER;

/// Common query parameters
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserQuery {
    pub user_id: Option<String>,
    pub limit: Option<usize>,
}

impl UserQuery {
    /// Requested user, or the anonymous user
    pub fn user_or_anonymous(&self) -> String {
        self.user_id
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .unwrap_or(ANONYMOUS_USER)
            .to_string()
    }

    pub fn required_user(&self) -> Result<String, AppError> {
        self.user_id
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(str::to_string)
            .ok_or_else(|| AppError::bad_request("userId is required"))
    }

    /// Clamp the requested page size
    pub fn limit(&self) -> usize {
        self.limit
            .unwrap_or(DEFAULT_PAGE_LIMIT)
            .clamp(1, MAX_PAGE_LIMIT)
    }
}

/// Parse a JSON request body; an empty body is `null`
pub(crate) fn parse_body(body: &Bytes) -> Result<Value, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(body).map_err(|e| {
        AppError::bad_request("Invalid JSON in request body").with_details(e.to_string())
    })
}

/// Parse a JSON body that must be an object
pub(crate) fn parse_object(body: &Bytes) -> Result<Value, AppError> {
    match parse_body(body)? {
        Value::Null => Ok(Value::Object(Default::default())),
        value @ Value::Object(_) => Ok(value),
        _ => Err(AppError::bad_request("Request body must be a JSON object")),
    }
}
