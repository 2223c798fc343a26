//! Preference persistence

use rusqlite::{params, OptionalExtension};

use super::{decimal_column, format_datetime, parse_datetime, Database};
use crate::error::Result;
use crate::models::Preferences;

impl Database {
    /// Insert or replace a user's preferences (last write wins)
    pub fn upsert_preferences(&self, prefs: &Preferences) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO user_preferences (user_id, budget, dietary_restrictions,
             nutrition_goal, caloric_target, protein_target, carb_target, fat_target, last_updated)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                prefs.user_id,
                prefs.budget.to_string(),
                prefs.dietary_restrictions,
                prefs.nutrition_goal,
                prefs.caloric_target,
                prefs.protein_target,
                prefs.carb_target,
                prefs.fat_target,
                prefs.last_updated.as_ref().map(format_datetime),
            ],
        )?;
        Ok(())
    }

    pub fn find_preferences(&self, user_id: &str) -> Result<Option<Preferences>> {
        let conn = self.conn()?;
        let prefs = conn
            .query_row(
                "SELECT user_id, budget, dietary_restrictions, nutrition_goal, caloric_target,
                        protein_target, carb_target, fat_target, last_updated
                 FROM user_preferences WHERE user_id = ?",
                params![user_id],
                |row| {
                    let last_updated: Option<String> = row.get(8)?;
                    Ok(Preferences {
                        user_id: row.get(0)?,
                        budget: decimal_column(row, 1)?,
                        dietary_restrictions: row.get(2)?,
                        nutrition_goal: row.get(3)?,
                        caloric_target: row.get(4)?,
                        protein_target: row.get(5)?,
                        carb_target: row.get(6)?,
                        fat_target: row.get(7)?,
                        last_updated: last_updated.as_deref().map(parse_datetime),
                    })
                },
            )
            .optional()?;

        Ok(prefs)
    }
}
