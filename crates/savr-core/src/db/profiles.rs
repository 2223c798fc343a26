//! User profile and budget tracking

use chrono::Utc;
use rust_decimal::Decimal;
use rusqlite::{params, OptionalExtension};

use super::{decimal_column, format_datetime, json_column, parse_datetime, Database};
use crate::error::Result;
use crate::models::UserProfile;

impl Database {
    pub fn upsert_profile(&self, profile: &UserProfile) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO user_profiles (user_id, allergies, budget, spent,
             custom_preferences, last_updated)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                profile.user_id,
                serde_json::to_string(&profile.allergies)?,
                profile.budget.to_string(),
                profile.spent.to_string(),
                profile.custom_preferences,
                profile.last_updated.as_ref().map(format_datetime),
            ],
        )?;
        Ok(())
    }

    pub fn find_profile(&self, user_id: &str) -> Result<Option<UserProfile>> {
        let conn = self.conn()?;
        let profile = conn
            .query_row(
                "SELECT user_id, allergies, budget, spent, custom_preferences, last_updated
                 FROM user_profiles WHERE user_id = ?",
                params![user_id],
                |row| {
                    let last_updated: Option<String> = row.get(5)?;
                    Ok(UserProfile {
                        user_id: row.get(0)?,
                        allergies: json_column(row, 1)?,
                        budget: decimal_column(row, 2)?,
                        spent: decimal_column(row, 3)?,
                        custom_preferences: row.get(4)?,
                        last_updated: last_updated.as_deref().map(parse_datetime),
                    })
                },
            )
            .optional()?;

        Ok(profile)
    }

    /// Add `amount` to a user's running spend, creating the profile if needed
    ///
    /// Read and write happen in one transaction so concurrent analyses of the
    /// same user do not lose updates.
    pub fn increment_spent(&self, user_id: &str, amount: Decimal) -> Result<Decimal> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let current: Option<Decimal> = tx
            .query_row(
                "SELECT spent FROM user_profiles WHERE user_id = ?",
                params![user_id],
                |row| decimal_column(row, 0),
            )
            .optional()?;

        let total = current.unwrap_or(Decimal::ZERO).saturating_add(amount);
        let now = format_datetime(&Utc::now());

        match current {
            Some(_) => {
                tx.execute(
                    "UPDATE user_profiles SET spent = ?, last_updated = ? WHERE user_id = ?",
                    params![total.to_string(), now, user_id],
                )?;
            }
            None => {
                tx.execute(
                    "INSERT INTO user_profiles (user_id, spent, last_updated) VALUES (?, ?, ?)",
                    params![user_id, total.to_string(), now],
                )?;
            }
        }

        tx.commit()?;
        Ok(total)
    }
}
