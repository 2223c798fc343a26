//! Durable storage interface
//!
//! Records are keyed by user plus an optional secondary key (receipt id or
//! plan date). The only ordering relied on is "most recent N" by that
//! secondary key. Writes are single-record and last-write-wins.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;

use crate::error::Result;
use crate::insights::Insights;
use crate::models::{Preferences, ReceiptRecord, StoredMealPlan, UserProfile};

pub trait Store: Send + Sync {
    /// Insert or replace a receipt record
    fn put_receipt(&self, record: &ReceiptRecord) -> Result<()>;

    fn get_receipt(&self, user_id: &str, receipt_id: &str) -> Result<Option<ReceiptRecord>>;

    /// Most recently processed receipts first
    fn recent_receipts(&self, user_id: &str, limit: usize) -> Result<Vec<ReceiptRecord>>;

    /// Attach analysis results to an existing receipt; `NotFound` if absent
    fn attach_insights(
        &self,
        user_id: &str,
        receipt_id: &str,
        insights: &Insights,
        analyzed_at: DateTime<Utc>,
    ) -> Result<()>;

    fn get_preferences(&self, user_id: &str) -> Result<Option<Preferences>>;

    fn put_preferences(&self, preferences: &Preferences) -> Result<()>;

    fn get_profile(&self, user_id: &str) -> Result<Option<UserProfile>>;

    fn put_profile(&self, profile: &UserProfile) -> Result<()>;

    /// Add to the profile's running spend, creating the profile if needed.
    /// Returns the new total.
    fn add_spent(&self, user_id: &str, amount: Decimal) -> Result<Decimal>;

    /// Insert or replace the plan for `(user_id, plan_date)`
    fn put_meal_plan(&self, plan: &StoredMealPlan) -> Result<()>;

    fn get_meal_plan(&self, user_id: &str, plan_date: NaiveDate) -> Result<Option<StoredMealPlan>>;

    /// Most recent plan dates first
    fn recent_meal_plans(&self, user_id: &str, limit: usize) -> Result<Vec<StoredMealPlan>>;

    /// Append an audit entry, returning its id
    fn log_audit(
        &self,
        user_id: &str,
        action: &str,
        entity_type: Option<&str>,
        entity_id: Option<&str>,
        details: Option<&str>,
    ) -> Result<i64>;
}
