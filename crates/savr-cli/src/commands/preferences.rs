//! Preference commands

use anyhow::{Context, Result};
use savr_core::normalize::try_parse_decimal;
use savr_core::{Pipeline, PreferenceOverrides, Preferences};

use super::user_or_anonymous;

/// Build overrides from `prefs set` flags
///
/// `targets` is `[calories, protein, carbs, fat]`.
pub fn preference_overrides(
    budget: Option<&str>,
    restrictions: Option<String>,
    goal: Option<String>,
    targets: [Option<u32>; 4],
) -> Result<PreferenceOverrides> {
    let budget = budget
        .map(|b| {
            try_parse_decimal(b)
                .filter(|d| !d.is_sign_negative())
                .with_context(|| format!("Invalid budget '{}'", b))
        })
        .transpose()?;
    let [caloric_target, protein_target, carb_target, fat_target] = targets;

    Ok(PreferenceOverrides {
        budget,
        dietary_restrictions: restrictions,
        nutrition_goal: goal,
        caloric_target,
        protein_target,
        carb_target,
        fat_target,
    })
}

fn print_preferences(prefs: &Preferences) {
    println!("⚙️  Preferences for {}", prefs.user_id);
    println!("   Budget:        ${:.2}", prefs.budget);
    println!(
        "   Restrictions:  {}",
        if prefs.dietary_restrictions.is_empty() {
            "(none)"
        } else {
            prefs.dietary_restrictions.as_str()
        }
    );
    println!("   Goal:          {}", prefs.nutrition_goal);
    println!("   Calories:      {}", prefs.caloric_target);
    println!(
        "   Macros:        {}g protein / {}g carbs / {}g fat",
        prefs.protein_target, prefs.carb_target, prefs.fat_target
    );
    if let Some(updated) = prefs.last_updated {
        println!("   Updated:       {}", updated.format("%Y-%m-%d %H:%M"));
    }
}

pub fn cmd_prefs_show(pipeline: &Pipeline, user: Option<&str>) -> Result<()> {
    let prefs = pipeline.preferences(user_or_anonymous(user));
    print_preferences(&prefs);
    Ok(())
}

pub fn cmd_prefs_set(
    pipeline: &Pipeline,
    user: Option<&str>,
    overrides: &PreferenceOverrides,
) -> Result<()> {
    let prefs = pipeline
        .save_preferences(user_or_anonymous(user), overrides)
        .context("Failed to save preferences")?;
    println!("✅ Preferences saved");
    print_preferences(&prefs);
    Ok(())
}
