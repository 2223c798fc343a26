//! Receipt insights: schema, assembly from model output, and the local fallback
//!
//! `Insights` is always fully populated. Model output enters as an
//! `InsightsDraft` (every field optional and leniently typed) and is completed
//! from the caller's own items; when the model is unavailable or its answer is
//! unusable, `fallback_insights` computes the same shape locally.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{total_spent, LineItem};
use crate::normalize::{
    lenient_decimal, lenient_decimal_opt, lenient_string, lenient_strings, lenient_u32,
};

/// Category every item lands in when no categorization is available
pub const FALLBACK_CATEGORY: &str = "other";

/// Neutral score used when the model does not rate the basket
pub const NEUTRAL_HEALTH_SCORE: u8 = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NutritionalAssessment {
    /// 1 (poor) to 10 (excellent)
    pub health_score: u8,
    pub healthy_items_count: u32,
    pub unhealthy_items_count: u32,
    pub balance_description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetAnalysis {
    pub total_spent: Decimal,
    pub average_item_cost: Decimal,
    pub budget_status: String,
    pub savings_opportunities: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeSuggestion {
    #[serde(deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub ingredients: Vec<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub prep_time: String,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub servings: u32,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub estimated_cost: Decimal,
}

/// Nutritional and budget analysis of one receipt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Insights {
    pub categories: BTreeMap<String, Vec<LineItem>>,
    pub nutritional_assessment: NutritionalAssessment,
    pub budget_analysis: BudgetAnalysis,
    pub recipe_suggestions: Vec<RecipeSuggestion>,
    pub missing_essentials: Vec<String>,
    pub meal_plan_ideas: Vec<String>,
    pub health_tips: Vec<String>,
    pub original_items: Vec<LineItem>,
    pub analyzed_at: DateTime<Utc>,
    pub item_count: usize,
}

/// Model-produced nutritional assessment; any field may be missing
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AssessmentDraft {
    #[serde(deserialize_with = "lenient_u32")]
    pub health_score: u32,
    #[serde(deserialize_with = "lenient_u32")]
    pub healthy_items_count: u32,
    #[serde(deserialize_with = "lenient_u32")]
    pub unhealthy_items_count: u32,
    #[serde(deserialize_with = "lenient_string")]
    pub balance_description: String,
}

/// Model-produced budget analysis; any field may be missing
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BudgetDraft {
    #[serde(deserialize_with = "lenient_decimal_opt")]
    pub total_spent: Option<Decimal>,
    #[serde(deserialize_with = "lenient_decimal_opt")]
    pub average_item_cost: Option<Decimal>,
    #[serde(deserialize_with = "lenient_string")]
    pub budget_status: String,
    #[serde(deserialize_with = "lenient_strings")]
    pub savings_opportunities: Vec<String>,
}

/// Insights exactly as decoded from model text, before completion
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InsightsDraft {
    pub categories: BTreeMap<String, Vec<serde_json::Value>>,
    pub nutritional_assessment: AssessmentDraft,
    pub budget_analysis: BudgetDraft,
    pub recipe_suggestions: Vec<serde_json::Value>,
    #[serde(deserialize_with = "lenient_strings")]
    pub missing_essentials: Vec<String>,
    #[serde(deserialize_with = "lenient_strings")]
    pub meal_plan_ideas: Vec<String>,
    #[serde(deserialize_with = "lenient_strings")]
    pub health_tips: Vec<String>,
}

/// Average cost per line item, rounded to cents
fn average_item_cost(total: Decimal, items: &[LineItem]) -> Decimal {
    if items.is_empty() {
        Decimal::ZERO
    } else {
        (total / Decimal::from(items.len())).round_dp(2)
    }
}

/// Complete a decoded draft with the caller's own data
///
/// Original items, item count and the analysis timestamp always come from the
/// caller; the model is never trusted to echo inputs. Entries the model left
/// malformed are dropped, and sections it left out are filled locally.
pub fn assemble_insights(
    draft: InsightsDraft,
    items: &[LineItem],
    analyzed_at: DateTime<Utc>,
) -> Insights {
    // Names differing only in case share one group
    let mut categories: BTreeMap<String, Vec<LineItem>> = BTreeMap::new();
    for (name, entries) in draft.categories {
        let parsed = entries
            .into_iter()
            .filter_map(|v| serde_json::from_value::<LineItem>(v).ok())
            .filter(|item| !item.name.trim().is_empty());
        categories
            .entry(name.to_lowercase())
            .or_default()
            .extend(parsed);
    }
    categories.retain(|_, entries| !entries.is_empty());
    if categories.is_empty() {
        categories.insert(FALLBACK_CATEGORY.to_string(), items.to_vec());
    }

    let assessment = draft.nutritional_assessment;
    let health_score = match assessment.health_score {
        0 => NEUTRAL_HEALTH_SCORE,
        n => n.min(10) as u8,
    };

    let computed_total = total_spent(items);
    let budget = draft.budget_analysis;
    let total = budget.total_spent.unwrap_or(computed_total);
    let average = budget
        .average_item_cost
        .unwrap_or_else(|| average_item_cost(total, items));

    let recipe_suggestions = draft
        .recipe_suggestions
        .into_iter()
        .filter_map(|v| serde_json::from_value::<RecipeSuggestion>(v).ok())
        .filter(|r| !r.name.trim().is_empty())
        .collect();

    Insights {
        categories,
        nutritional_assessment: NutritionalAssessment {
            health_score,
            healthy_items_count: assessment.healthy_items_count,
            unhealthy_items_count: assessment.unhealthy_items_count,
            balance_description: if assessment.balance_description.trim().is_empty() {
                "No balance assessment provided".to_string()
            } else {
                assessment.balance_description
            },
        },
        budget_analysis: BudgetAnalysis {
            total_spent: total,
            average_item_cost: average,
            budget_status: if budget.budget_status.trim().is_empty() {
                "Not assessed".to_string()
            } else {
                budget.budget_status
            },
            savings_opportunities: budget.savings_opportunities,
        },
        recipe_suggestions,
        missing_essentials: draft.missing_essentials,
        meal_plan_ideas: draft.meal_plan_ideas,
        health_tips: draft.health_tips,
        original_items: items.to_vec(),
        analyzed_at,
        item_count: items.len(),
    }
}

/// Deterministic insights computed from the items alone
pub fn fallback_insights(items: &[LineItem], analyzed_at: DateTime<Utc>) -> Insights {
    let total = total_spent(items);
    let mut categories = BTreeMap::new();
    categories.insert(FALLBACK_CATEGORY.to_string(), items.to_vec());

    Insights {
        categories,
        nutritional_assessment: NutritionalAssessment {
            health_score: NEUTRAL_HEALTH_SCORE,
            healthy_items_count: 0,
            unhealthy_items_count: 0,
            balance_description: "Unable to analyze - basic processing only".to_string(),
        },
        budget_analysis: BudgetAnalysis {
            total_spent: total,
            average_item_cost: average_item_cost(total, items),
            budget_status: "Analysis unavailable".to_string(),
            savings_opportunities: Vec::new(),
        },
        recipe_suggestions: Vec::new(),
        missing_essentials: Vec::new(),
        meal_plan_ideas: vec!["Upload more receipts for personalized meal suggestions".to_string()],
        health_tips: vec!["Enable AI analysis for detailed nutritional insights".to_string()],
        original_items: items.to_vec(),
        analyzed_at,
        item_count: items.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn items() -> Vec<LineItem> {
        vec![
            LineItem::new("Bread", Decimal::new(250, 2), 2),
            LineItem::new("Apple", Decimal::new(100, 2), 1),
        ]
    }

    #[test]
    fn test_fallback_totals() {
        let insights = fallback_insights(&items(), Utc::now());
        assert_eq!(insights.budget_analysis.total_spent, Decimal::new(600, 2));
        assert_eq!(insights.budget_analysis.average_item_cost, Decimal::new(300, 2));
        assert_eq!(insights.nutritional_assessment.health_score, 5);
        assert_eq!(insights.categories[FALLBACK_CATEGORY].len(), 2);
        assert_eq!(insights.item_count, 2);
        assert_eq!(
            insights.meal_plan_ideas,
            vec!["Upload more receipts for personalized meal suggestions".to_string()]
        );
    }

    #[test]
    fn test_fallback_empty_items() {
        let insights = fallback_insights(&[], Utc::now());
        assert_eq!(insights.budget_analysis.total_spent, Decimal::ZERO);
        assert_eq!(insights.budget_analysis.average_item_cost, Decimal::ZERO);
        assert!(insights.categories[FALLBACK_CATEGORY].is_empty());
    }

    #[test]
    fn test_assemble_merges_categories_differing_in_case() {
        let draft: InsightsDraft = serde_json::from_value(json!({
            "categories": {
                "Produce": [{"name": "Apple", "price": 1.0}],
                "produce": [{"name": "Pear", "price": 1.5}, {"name": "Kale", "price": 3}],
                "DAIRY": [{"price": 2}]
            }
        }))
        .unwrap();

        let insights = assemble_insights(draft, &items(), Utc::now());
        let names: Vec<&str> = insights.categories["produce"]
            .iter()
            .map(|i| i.name.as_str())
            .collect();
        assert_eq!(names, vec!["Apple", "Pear", "Kale"]);
        assert_eq!(insights.categories.len(), 1);
    }

    #[test]
    fn test_assemble_overwrites_metadata() {
        let draft: InsightsDraft = serde_json::from_value(json!({
            "categories": {
                "Produce": [{"name": "Apple", "price": 1.0}],
                "grains": [{"name": "Bread", "price": "2.50", "quantity": 2}, {"price": 9}]
            },
            "nutritionalAssessment": {"healthScore": 14, "balanceDescription": "Fine"},
            "budgetAnalysis": {"budgetStatus": "Under budget"},
            "recipeSuggestions": [{"name": "Toast", "servings": "2"}, {"servings": 1}],
            "healthTips": ["Eat greens", 3],
            "originalItems": [],
            "itemCount": 99
        }))
        .unwrap();

        let now = Utc::now();
        let insights = assemble_insights(draft, &items(), now);

        assert_eq!(insights.item_count, 2);
        assert_eq!(insights.original_items, items());
        assert_eq!(insights.analyzed_at, now);
        assert_eq!(insights.nutritional_assessment.health_score, 10);
        assert_eq!(insights.categories["produce"].len(), 1);
        assert_eq!(insights.categories["grains"].len(), 1);
        assert_eq!(insights.budget_analysis.total_spent, Decimal::new(600, 2));
        assert_eq!(insights.recipe_suggestions.len(), 1);
        assert_eq!(insights.recipe_suggestions[0].servings, 2);
        assert_eq!(insights.health_tips, vec!["Eat greens".to_string(), "3".to_string()]);
    }

    #[test]
    fn test_assemble_empty_draft_is_fully_populated() {
        let insights = assemble_insights(InsightsDraft::default(), &items(), Utc::now());
        assert_eq!(insights.categories[FALLBACK_CATEGORY].len(), 2);
        assert_eq!(insights.nutritional_assessment.health_score, NEUTRAL_HEALTH_SCORE);
        assert_eq!(insights.budget_analysis.budget_status, "Not assessed");

        let value = serde_json::to_value(&insights).unwrap();
        for key in [
            "categories",
            "nutritionalAssessment",
            "budgetAnalysis",
            "recipeSuggestions",
            "missingEssentials",
            "mealPlanIdeas",
            "healthTips",
            "originalItems",
            "analyzedAt",
            "itemCount",
        ] {
            assert!(value.get(key).is_some(), "missing {}", key);
        }
    }
}
