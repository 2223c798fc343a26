//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Init and shared utilities (open_db, open_pipeline)
//! - `receipts` - Extraction, OCR processing, analysis and receipt listing
//! - `meal_plans` - Meal plan generation and listing
//! - `preferences` - Preference show/set
//! - `audit` - Audit log
//! - `prompts` - Prompt library management commands
//! - `serve` - Web server command

pub mod audit;
pub mod core;
pub mod meal_plans;
pub mod preferences;
pub mod prompts;
pub mod receipts;
pub mod serve;

// Re-export command functions for main.rs
pub use audit::*;
pub use core::*;
pub use meal_plans::*;
pub use preferences::*;
pub use prompts::*;
pub use receipts::*;
pub use serve::*;

use savr_core::ANONYMOUS_USER;

/// Truncate a string to a maximum length, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// The given user, or the anonymous user
pub fn user_or_anonymous(user: Option<&str>) -> &str {
    user.map(str::trim)
        .filter(|u| !u.is_empty())
        .unwrap_or(ANONYMOUS_USER)
}
