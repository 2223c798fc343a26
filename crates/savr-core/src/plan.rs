//! Weekly meal plans: schema, assembly, flattening and image enrichment

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::images::{default_image_url, ImageSearch};
use crate::models::Preferences;
use crate::normalize::{lenient_decimal_opt, lenient_string, lenient_strings, lenient_u32};

/// Title used for a meal the model left unnamed
pub const UNTITLED_MEAL: &str = "Untitled Meal";

/// Prep time shown for a meal the model gave no estimate for
pub const UNKNOWN_PREP_TIME: &str = "N/A";

/// Day of the plan week, ordered Monday first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Weekday {
    pub const ALL: [Weekday; 7] = [
        Self::Monday,
        Self::Tuesday,
        Self::Wednesday,
        Self::Thursday,
        Self::Friday,
        Self::Saturday,
        Self::Sunday,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Monday => "monday",
            Self::Tuesday => "tuesday",
            Self::Wednesday => "wednesday",
            Self::Thursday => "thursday",
            Self::Friday => "friday",
            Self::Saturday => "saturday",
            Self::Sunday => "sunday",
        }
    }
}

impl std::str::FromStr for Weekday {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let key = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|day| day.as_str() == key)
            .ok_or_else(|| format!("Unknown weekday: {}", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

impl MealType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Breakfast => "breakfast",
            Self::Lunch => "lunch",
            Self::Dinner => "dinner",
            Self::Snack => "snack",
        }
    }
}

impl std::fmt::Display for MealType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single planned meal; nutrition values are whole grams / kcal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meal {
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub ingredients: Vec<String>,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub calories: u32,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub protein: u32,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub carbs: u32,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub fat: u32,
    #[serde(default, deserialize_with = "lenient_string")]
    pub prep_time: String,
}

impl Meal {
    pub fn named(name: &str, calories: u32, prep_time: &str) -> Self {
        Self {
            name: name.to_string(),
            ingredients: Vec::new(),
            calories,
            protein: 0,
            carbs: 0,
            fat: 0,
            prep_time: prep_time.to_string(),
        }
    }

    /// Coerce one model-produced meal entry
    ///
    /// Only null is absent. A bare string or scalar becomes a meal with that
    /// name; anything without a usable name is an untitled meal.
    fn from_value(value: &Value) -> Option<Self> {
        let mut meal = match value {
            Value::Null => return None,
            Value::String(s) => Self::named(s.trim(), 0, ""),
            Value::Number(n) => Self::named(&n.to_string(), 0, ""),
            Value::Bool(b) => Self::named(&b.to_string(), 0, ""),
            Value::Object(_) => serde_json::from_value(value.clone())
                .unwrap_or_else(|_| Self::named("", 0, "")),
            Value::Array(_) => Self::named("", 0, ""),
        };
        if meal.name.trim().is_empty() {
            meal.name = UNTITLED_MEAL.to_string();
        }
        Some(meal)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayPlan {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breakfast: Option<Meal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lunch: Option<Meal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dinner: Option<Meal>,
    #[serde(default)]
    pub snacks: Vec<Meal>,
}

impl DayPlan {
    /// Meals of the day in serving order, tagged with their type
    pub fn meals(&self) -> impl Iterator<Item = (MealType, &Meal)> {
        self.breakfast
            .iter()
            .map(|m| (MealType::Breakfast, m))
            .chain(self.lunch.iter().map(|m| (MealType::Lunch, m)))
            .chain(self.dinner.iter().map(|m| (MealType::Dinner, m)))
            .chain(self.snacks.iter().map(|m| (MealType::Snack, m)))
    }

    fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let slot = |key: &str| obj.get(key).and_then(Meal::from_value);
        let snacks = match obj.get("snacks").or_else(|| obj.get("snack")) {
            Some(Value::Array(entries)) => entries.iter().filter_map(Meal::from_value).collect(),
            Some(single) => Meal::from_value(single).into_iter().collect(),
            None => Vec::new(),
        };
        Some(Self {
            breakfast: slot("breakfast"),
            lunch: slot("lunch"),
            dinner: slot("dinner"),
            snacks,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyTotals {
    pub total_calories: u32,
    pub avg_daily_calories: u32,
    pub total_protein: u32,
    pub total_carbs: u32,
    pub total_fat: u32,
    pub estimated_cost: Decimal,
}

impl WeeklyTotals {
    /// Sum nutrition over every meal in the plan
    pub fn from_plan(weekly_plan: &BTreeMap<Weekday, DayPlan>, estimated_cost: Decimal) -> Self {
        let mut totals = Self {
            estimated_cost,
            ..Self::default()
        };
        for (_, meal) in weekly_plan.values().flat_map(DayPlan::meals) {
            totals.total_calories = totals.total_calories.saturating_add(meal.calories);
            totals.total_protein = totals.total_protein.saturating_add(meal.protein);
            totals.total_carbs = totals.total_carbs.saturating_add(meal.carbs);
            totals.total_fat = totals.total_fat.saturating_add(meal.fat);
        }
        let days = u32::try_from(weekly_plan.len()).unwrap_or(u32::MAX);
        if days > 0 {
            totals.avg_daily_calories = totals.total_calories / days;
        }
        totals
    }
}

/// Flattened, display-ready projection of one planned meal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealCard {
    pub day: Weekday,
    pub title: String,
    pub meal_type: MealType,
    pub calories: u32,
    pub protein: u32,
    pub carbs: u32,
    pub fat: u32,
    pub image_url: String,
    pub ingredients: Vec<String>,
    pub prep_time: String,
}

/// A seven-day plan plus its flattened meal cards
///
/// `meals` is derived from `weekly_plan` by `flatten_meals` and never edited
/// on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealPlan {
    pub weekly_plan: BTreeMap<Weekday, DayPlan>,
    pub weekly_totals: WeeklyTotals,
    pub shopping_list: Vec<String>,
    pub tips: Vec<String>,
    #[serde(default)]
    pub meals: Vec<MealCard>,
}

impl MealPlan {
    fn new(
        weekly_plan: BTreeMap<Weekday, DayPlan>,
        weekly_totals: WeeklyTotals,
        shopping_list: Vec<String>,
        tips: Vec<String>,
    ) -> Self {
        let meals = flatten_meals(&weekly_plan);
        Self {
            weekly_plan,
            weekly_totals,
            shopping_list,
            tips,
            meals,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TotalsDraft {
    #[serde(deserialize_with = "lenient_u32")]
    pub total_calories: u32,
    #[serde(deserialize_with = "lenient_u32")]
    pub avg_daily_calories: u32,
    #[serde(deserialize_with = "lenient_u32")]
    pub total_protein: u32,
    #[serde(deserialize_with = "lenient_u32")]
    pub total_carbs: u32,
    #[serde(deserialize_with = "lenient_u32")]
    pub total_fat: u32,
    #[serde(deserialize_with = "lenient_decimal_opt")]
    pub estimated_cost: Option<Decimal>,
}

/// Meal plan exactly as decoded from model text, before completion
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MealPlanDraft {
    pub weekly_plan: serde_json::Map<String, Value>,
    pub weekly_totals: Option<TotalsDraft>,
    #[serde(deserialize_with = "lenient_strings")]
    pub shopping_list: Vec<String>,
    #[serde(deserialize_with = "lenient_strings")]
    pub tips: Vec<String>,
}

/// Complete a decoded draft into a typed plan
///
/// Weekday keys match case-insensitively and unknown keys are dropped.
/// Totals the model omitted are summed from the meals.
pub fn assemble_plan(draft: MealPlanDraft) -> MealPlan {
    let mut weekly_plan = BTreeMap::new();
    for (key, value) in &draft.weekly_plan {
        match key.parse::<Weekday>() {
            Ok(day) => {
                if let Some(plan) = DayPlan::from_value(value) {
                    weekly_plan.insert(day, plan);
                }
            }
            Err(e) => debug!(error = %e, "Skipping plan entry"),
        }
    }

    let weekly_totals = match draft.weekly_totals {
        Some(t) if t.total_calories > 0 || t.avg_daily_calories > 0 => WeeklyTotals {
            total_calories: t.total_calories,
            avg_daily_calories: t.avg_daily_calories,
            total_protein: t.total_protein,
            total_carbs: t.total_carbs,
            total_fat: t.total_fat,
            estimated_cost: t.estimated_cost.unwrap_or(Decimal::ZERO),
        },
        other => WeeklyTotals::from_plan(
            &weekly_plan,
            other
                .and_then(|t| t.estimated_cost)
                .unwrap_or(Decimal::ZERO),
        ),
    };

    MealPlan::new(weekly_plan, weekly_totals, draft.shopping_list, draft.tips)
}

/// Project a weekly plan into display cards with per-type default images
pub fn flatten_meals(weekly_plan: &BTreeMap<Weekday, DayPlan>) -> Vec<MealCard> {
    weekly_plan
        .iter()
        .flat_map(|(day, plan)| {
            plan.meals().map(move |(meal_type, meal)| MealCard {
                day: *day,
                title: if meal.name.trim().is_empty() {
                    UNTITLED_MEAL.to_string()
                } else {
                    meal.name.clone()
                },
                meal_type,
                calories: meal.calories,
                protein: meal.protein,
                carbs: meal.carbs,
                fat: meal.fat,
                image_url: default_image_url(meal_type).to_string(),
                ingredients: meal.ingredients.clone(),
                prep_time: if meal.prep_time.trim().is_empty() {
                    UNKNOWN_PREP_TIME.to_string()
                } else {
                    meal.prep_time.clone()
                },
            })
        })
        .collect()
}

/// How many cards image search actually served
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichmentReport {
    pub found: usize,
    pub defaulted: usize,
    pub failed: usize,
}

impl EnrichmentReport {
    /// True when at least one lookup errored and a card kept its default
    pub fn degraded(&self) -> bool {
        self.failed > 0
    }
}

/// Replace default card images with search results where available
///
/// Lookups run one after another. A failing or empty lookup leaves the
/// card's default image in place and never aborts the rest.
pub async fn enrich_meals(cards: &mut [MealCard], search: &dyn ImageSearch) -> EnrichmentReport {
    let mut report = EnrichmentReport::default();
    for card in cards.iter_mut() {
        match search.find_image(&card.title).await {
            Ok(Some(url)) => {
                card.image_url = url;
                report.found += 1;
            }
            Ok(None) => report.defaulted += 1,
            Err(e) => {
                warn!(meal = %card.title, error = %e, "Image search failed, keeping default");
                report.failed += 1;
            }
        }
    }
    report
}

/// Basic single-day plan used when the model cannot be reached
pub fn fallback_plan(preferences: &Preferences) -> MealPlan {
    let mut weekly_plan = BTreeMap::new();
    weekly_plan.insert(
        Weekday::Monday,
        DayPlan {
            breakfast: Some(Meal::named("Oatmeal with Berries", 350, "5 mins")),
            lunch: Some(Meal::named("Grilled Chicken Salad", 450, "15 mins")),
            dinner: Some(Meal::named("Baked Salmon with Vegetables", 550, "25 mins")),
            snacks: Vec::new(),
        },
    );
    let mut totals = WeeklyTotals::from_plan(&weekly_plan, preferences.budget);
    totals.avg_daily_calories = preferences.caloric_target;

    MealPlan::new(
        weekly_plan,
        totals,
        ["Oats", "Berries", "Chicken", "Salmon", "Mixed Vegetables"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        vec!["This is a basic meal plan. Upload receipts for personalized recommendations.".to_string()],
    )
}

/// Empty plan used when the model answered but its output was unusable
pub fn limited_data_plan() -> MealPlan {
    MealPlan::new(
        BTreeMap::new(),
        WeeklyTotals {
            total_calories: 14000,
            avg_daily_calories: 2000,
            estimated_cost: Decimal::from(100),
            ..WeeklyTotals::default()
        },
        Vec::new(),
        vec!["Meal plan generated with limited data".to_string()],
    )
}
