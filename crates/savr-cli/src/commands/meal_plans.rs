//! Meal plan commands

use anyhow::{Context, Result};
use chrono::NaiveDate;
use savr_core::{MealPlan, Pipeline, PlanRequest, StoredMealPlan, Store};

use super::{truncate, user_or_anonymous};

fn print_plan(plan: &MealPlan) {
    println!(
        "   {:<10} {:<10} {:<40} {:>6}",
        "DAY", "MEAL", "TITLE", "KCAL"
    );
    println!("   {}", "-".repeat(70));
    for card in &plan.meals {
        println!(
            "   {:<10} {:<10} {:<40} {:>6}",
            card.day.as_str(),
            card.meal_type.as_str(),
            truncate(&card.title, 40),
            card.calories
        );
    }

    let totals = &plan.weekly_totals;
    println!();
    println!(
        "   Weekly: {} kcal (avg {} / day), est. ${:.2}",
        totals.total_calories, totals.avg_daily_calories, totals.estimated_cost
    );

    if !plan.shopping_list.is_empty() {
        println!();
        println!("🛒 Shopping list: {}", plan.shopping_list.join(", "));
    }
    for tip in &plan.tips {
        println!("💡 {}", tip);
    }
}

pub async fn cmd_plan(
    pipeline: &Pipeline,
    user: Option<&str>,
    pantry: &[String],
    json: bool,
) -> Result<()> {
    let request = PlanRequest {
        user_id: user.map(str::to_string),
        pantry_items: pantry
            .iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect(),
        ..Default::default()
    };

    let outcome = pipeline.generate_plan(request).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome.meal_plan)?);
        return Ok(());
    }

    if outcome.fallback.is_some() {
        println!("💡 AI planning unavailable; showing a basic plan");
    }
    println!(
        "🍽️  Meal plan for {} ({})",
        outcome.user_id, outcome.plan_date
    );
    println!();
    print_plan(&outcome.meal_plan);

    match outcome.plan_id {
        Some(id) => println!("\n✅ Saved as {}", id),
        None => println!("\n⚠️  The plan could not be saved to the database"),
    }

    Ok(())
}

fn print_stored(plan: &StoredMealPlan) {
    println!(
        "{:<12} {:<38} {:<9} {:>6}",
        plan.plan_date.to_string(),
        plan.plan_id,
        plan.status.as_str(),
        plan.meal_plan.meals.len()
    );
}

pub fn cmd_plans(
    pipeline: &Pipeline,
    user: Option<&str>,
    date: Option<&str>,
    limit: usize,
) -> Result<()> {
    let user_id = user_or_anonymous(user);
    let store = pipeline.store();

    if let Some(date) = date {
        let plan_date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .with_context(|| format!("Invalid date '{}' (expected YYYY-MM-DD)", date))?;
        match store.get_meal_plan(user_id, plan_date)? {
            Some(stored) => {
                println!("🍽️  Meal plan for {} ({})", user_id, stored.plan_date);
                println!();
                print_plan(&stored.meal_plan);
            }
            None => println!("No meal plan for {} on {}.", user_id, plan_date),
        }
        return Ok(());
    }

    let plans = store.recent_meal_plans(user_id, limit)?;
    if plans.is_empty() {
        println!("No meal plans for {}.", user_id);
        return Ok(());
    }

    println!("{:<12} {:<38} {:<9} {:>6}", "DATE", "PLAN ID", "STATUS", "MEALS");
    println!("{}", "-".repeat(68));
    for plan in &plans {
        print_stored(plan);
    }

    Ok(())
}
