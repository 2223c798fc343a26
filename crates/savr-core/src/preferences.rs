//! Preference resolution
//!
//! Each field takes the request value if supplied, else the stored value,
//! else the default. Zero numbers and blank strings count as "not supplied"
//! at every level. When the stored row cannot be read at all, a pipeline run
//! gets the plain defaults and nothing is written back.

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::error::Result;
use crate::models::{PreferenceOverrides, Preferences};
use crate::store::Store;

pub const DEFAULT_BUDGET: i64 = 100;
pub const DEFAULT_NUTRITION_GOAL: &str = "maintenance";
pub const DEFAULT_CALORIC_TARGET: u32 = 2000;
pub const DEFAULT_PROTEIN_TARGET: u32 = 150;
pub const DEFAULT_CARB_TARGET: u32 = 200;
pub const DEFAULT_FAT_TARGET: u32 = 65;

fn pick_amount(request: Option<Decimal>, stored: Option<Decimal>, default: Decimal) -> Decimal {
    request
        .filter(|d| !d.is_zero())
        .or(stored.filter(|d| !d.is_zero()))
        .unwrap_or(default)
}

fn pick_target(request: Option<u32>, stored: Option<u32>, default: u32) -> u32 {
    request
        .filter(|n| *n > 0)
        .or(stored.filter(|n| *n > 0))
        .unwrap_or(default)
}

fn pick_text(request: Option<&str>, stored: Option<&str>, default: &str) -> String {
    request
        .filter(|s| !s.trim().is_empty())
        .or(stored.filter(|s| !s.trim().is_empty()))
        .unwrap_or(default)
        .to_string()
}

/// Merges request preferences with stored ones and writes the result back
pub struct PreferenceResolver<'a> {
    store: &'a dyn Store,
}

impl<'a> PreferenceResolver<'a> {
    pub fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// Preferences for a user with nothing stored and nothing requested
    pub fn defaults(user_id: &str) -> Preferences {
        Self::merge(user_id, &PreferenceOverrides::default(), None)
    }

    /// Pure three-level merge: request > stored > defaults
    pub fn merge(
        user_id: &str,
        request: &PreferenceOverrides,
        stored: Option<&Preferences>,
    ) -> Preferences {
        Preferences {
            user_id: user_id.to_string(),
            budget: pick_amount(
                request.budget,
                stored.map(|p| p.budget),
                Decimal::from(DEFAULT_BUDGET),
            ),
            dietary_restrictions: pick_text(
                request.dietary_restrictions.as_deref(),
                stored.map(|p| p.dietary_restrictions.as_str()),
                "",
            ),
            nutrition_goal: pick_text(
                request.nutrition_goal.as_deref(),
                stored.map(|p| p.nutrition_goal.as_str()),
                DEFAULT_NUTRITION_GOAL,
            ),
            caloric_target: pick_target(
                request.caloric_target,
                stored.map(|p| p.caloric_target),
                DEFAULT_CALORIC_TARGET,
            ),
            protein_target: pick_target(
                request.protein_target,
                stored.map(|p| p.protein_target),
                DEFAULT_PROTEIN_TARGET,
            ),
            carb_target: pick_target(
                request.carb_target,
                stored.map(|p| p.carb_target),
                DEFAULT_CARB_TARGET,
            ),
            fat_target: pick_target(
                request.fat_target,
                stored.map(|p| p.fat_target),
                DEFAULT_FAT_TARGET,
            ),
            last_updated: stored.and_then(|p| p.last_updated),
        }
    }

    /// Resolve preferences for a pipeline run; never fails
    ///
    /// A non-empty request is written back. Write failures are logged and
    /// the merged result is still returned. A failed read yields the defaults
    /// untouched, so a transient error cannot overwrite the stored row.
    pub fn resolve(&self, user_id: &str, request: &PreferenceOverrides) -> Preferences {
        let stored = match self.store.get_preferences(user_id) {
            Ok(stored) => stored,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Preference read failed, using defaults");
                return Self::defaults(user_id);
            }
        };
        let mut merged = Self::merge(user_id, request, stored.as_ref());

        if !request.is_empty() {
            merged.last_updated = Some(Utc::now());
            match self.store.put_preferences(&merged) {
                Ok(()) => debug!(user_id = %user_id, "Saved merged preferences"),
                Err(e) => warn!(user_id = %user_id, error = %e, "Preference write-back failed"),
            }
        }
        merged
    }

    /// Explicit merge-and-save; read and write failures propagate
    pub fn save(&self, user_id: &str, request: &PreferenceOverrides) -> Result<Preferences> {
        let stored = self.store.get_preferences(user_id)?;
        let mut merged = Self::merge(user_id, request, stored.as_ref());
        merged.last_updated = Some(Utc::now());
        self.store.put_preferences(&merged)?;
        Ok(merged)
    }
}
