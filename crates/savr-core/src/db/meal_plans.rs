//! Meal plan persistence

use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension};

use super::{format_datetime, json_column, parse_datetime, Database};
use crate::error::Result;
use crate::models::StoredMealPlan;

const PLAN_COLUMNS: &str =
    "user_id, plan_date, plan_id, meal_plan, preferences_used, created_at, status";

impl Database {
    /// Insert or replace the plan for `(user_id, plan_date)`
    pub fn upsert_meal_plan(&self, plan: &StoredMealPlan) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO meal_plans (user_id, plan_date, plan_id, meal_plan,
             preferences_used, created_at, status)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                plan.user_id,
                plan.plan_date.to_string(),
                plan.plan_id,
                serde_json::to_string(&plan.meal_plan)?,
                serde_json::to_string(&plan.preferences_used)?,
                format_datetime(&plan.created_at),
                plan.status.as_str(),
            ],
        )?;
        Ok(())
    }

    pub fn find_meal_plan(
        &self,
        user_id: &str,
        plan_date: NaiveDate,
    ) -> Result<Option<StoredMealPlan>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM meal_plans WHERE user_id = ? AND plan_date = ?",
            PLAN_COLUMNS
        ))?;

        let plan = stmt
            .query_row(params![user_id, plan_date.to_string()], Self::row_to_plan)
            .optional()?;

        Ok(plan)
    }

    /// Most recent plan dates first
    pub fn list_meal_plans(&self, user_id: &str, limit: usize) -> Result<Vec<StoredMealPlan>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM meal_plans WHERE user_id = ? ORDER BY plan_date DESC LIMIT ?",
            PLAN_COLUMNS
        ))?;

        let plans = stmt
            .query_map(params![user_id, limit as i64], Self::row_to_plan)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(plans)
    }

    fn row_to_plan(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredMealPlan> {
        let plan_date: String = row.get(1)?;
        let created_at: String = row.get(5)?;
        let status: String = row.get(6)?;

        Ok(StoredMealPlan {
            user_id: row.get(0)?,
            plan_date: NaiveDate::parse_from_str(&plan_date, "%Y-%m-%d").map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    1,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })?,
            plan_id: row.get(2)?,
            meal_plan: json_column(row, 3)?,
            preferences_used: json_column(row, 4)?,
            created_at: parse_datetime(&created_at),
            status: status.parse().unwrap_or_default(),
        })
    }
}
