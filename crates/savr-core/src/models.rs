//! Domain models for Savr

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::insights::Insights;
use crate::normalize::{decimal_from_value, lenient_decimal, lenient_quantity};
use crate::plan::MealPlan;

/// User identity used when a request does not name one
pub const ANONYMOUS_USER: &str = "anonymous";

fn default_quantity() -> u32 {
    1
}

/// One purchased product on a receipt
///
/// Prices are exact decimals; quantity is always at least 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub name: String,
    /// Unit price
    #[serde(
        alias = "unitPrice",
        default,
        deserialize_with = "lenient_decimal"
    )]
    pub price: Decimal,
    #[serde(default = "default_quantity", deserialize_with = "lenient_quantity")]
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl LineItem {
    pub fn new(name: impl Into<String>, price: Decimal, quantity: u32) -> Self {
        Self {
            name: name.into(),
            price,
            quantity: quantity.max(1),
            category: None,
        }
    }

    /// Price multiplied by quantity, saturating at `Decimal::MAX`
    pub fn line_total(&self) -> Decimal {
        self.price.saturating_mul(Decimal::from(self.quantity))
    }
}

/// Sum of `price * quantity` over a set of items; saturates instead of overflowing
pub fn total_spent(items: &[LineItem]) -> Decimal {
    items
        .iter()
        .map(LineItem::line_total)
        .fold(Decimal::ZERO, Decimal::saturating_add)
}

/// Outcome of a receipt OCR run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReceiptStatus {
    #[default]
    Processed,
    Error,
}

impl ReceiptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processed => "processed",
            Self::Error => "error",
        }
    }
}

impl std::str::FromStr for ReceiptStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "processed" => Ok(Self::Processed),
            "error" => Ok(Self::Error),
            _ => Err(format!("Unknown receipt status: {}", s)),
        }
    }
}

impl std::fmt::Display for ReceiptStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A processed receipt, keyed by (user_id, receipt_id)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptRecord {
    pub user_id: String,
    pub receipt_id: String,
    pub items: Vec<LineItem>,
    /// Storage key of the source image
    pub source_key: String,
    pub processed_at: DateTime<Utc>,
    pub status: ReceiptStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Attached by a later analysis run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insights: Option<Insights>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analyzed_at: Option<DateTime<Utc>>,
}

/// Authoritative dietary and budget preferences for a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    pub user_id: String,
    /// Weekly grocery budget
    pub budget: Decimal,
    /// Free text, may be empty
    pub dietary_restrictions: String,
    /// e.g. "maintenance", "weight_loss", "muscle_gain"
    pub nutrition_goal: String,
    pub caloric_target: u32,
    pub protein_target: u32,
    pub carb_target: u32,
    pub fat_target: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

/// Request-supplied preference values; every field is optional
///
/// A field counts as supplied only when it is "truthy": non-zero numbers
/// and non-blank strings. Zero or empty values defer to stored data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferenceOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dietary_restrictions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nutrition_goal: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caloric_target: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protein_target: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carb_target: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fat_target: Option<u32>,
}

impl PreferenceOverrides {
    /// True when the request carried no preference keys at all
    pub fn is_empty(&self) -> bool {
        self.budget.is_none()
            && self.dietary_restrictions.is_none()
            && self.nutrition_goal.is_none()
            && self.caloric_target.is_none()
            && self.protein_target.is_none()
            && self.carb_target.is_none()
            && self.fat_target.is_none()
    }

    /// Validate an untyped request object
    ///
    /// Numeric fields accept numbers or numeric strings; anything else is an
    /// input error naming the field. `null` counts as absent.
    pub fn from_json(value: &Value) -> Result<Self> {
        let obj = match value {
            Value::Null => return Ok(Self::default()),
            Value::Object(obj) => obj,
            _ => {
                return Err(Error::InvalidInput(
                    "preferences must be an object".to_string(),
                ))
            }
        };

        let number = |key: &str| -> Result<Option<Decimal>> {
            match obj.get(key) {
                None | Some(Value::Null) => Ok(None),
                Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
                Some(v) => decimal_from_value(v)
                    .filter(|d| !d.is_sign_negative())
                    .map(Some)
                    .ok_or_else(|| Error::InvalidInput(format!("{} must be a number", key))),
            }
        };
        let target = |key: &str| -> Result<Option<u32>> {
            use rust_decimal::prelude::ToPrimitive;
            number(key)?
                .map(|d| {
                    d.round()
                        .to_u32()
                        .ok_or_else(|| Error::InvalidInput(format!("{} must be a number", key)))
                })
                .transpose()
        };
        let text = |key: &str| -> Option<String> {
            match obj.get(key) {
                None | Some(Value::Null) => None,
                Some(Value::String(s)) => Some(s.clone()),
                Some(Value::Array(items)) => Some(
                    items
                        .iter()
                        .filter_map(|v| v.as_str())
                        .collect::<Vec<_>>()
                        .join(", "),
                ),
                Some(other) => Some(other.to_string()),
            }
        };

        Ok(Self {
            budget: number("budget")?,
            dietary_restrictions: text("dietaryRestrictions"),
            nutrition_goal: text("nutritionGoal"),
            caloric_target: target("caloricTarget")?,
            protein_target: target("proteinTarget")?,
            carb_target: target("carbTarget")?,
            fat_target: target("fatTarget")?,
        })
    }
}

/// Dietary profile kept alongside preferences: allergies and budget tracking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(skip_serializing)]
    #[serde(default)]
    pub user_id: String,
    pub allergies: Vec<String>,
    pub budget: Decimal,
    /// Running total of analyzed receipt spend
    pub spent: Decimal,
    pub custom_preferences: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

impl UserProfile {
    /// Profile returned for a user that has never saved one
    pub fn empty(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            allergies: Vec::new(),
            budget: Decimal::ZERO,
            spent: Decimal::ZERO,
            custom_preferences: String::new(),
            last_updated: None,
        }
    }

    /// Validate an untyped profile save request
    pub fn from_json(value: &Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| Error::InvalidInput("Invalid JSON in request body".to_string()))?;

        let user_id = obj
            .get("userId")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::InvalidInput("userId is required".to_string()))?;

        let allergies = match obj.get("allergies") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect(),
            Some(_) => {
                return Err(Error::InvalidInput(
                    "allergies must be an array".to_string(),
                ))
            }
        };

        let amount = |key: &str| -> Result<Decimal> {
            match obj.get(key) {
                None | Some(Value::Null) => Ok(Decimal::ZERO),
                Some(v) => decimal_from_value(v)
                    .ok_or_else(|| Error::InvalidInput(format!("{} must be a number", key))),
            }
        };

        let custom_preferences = match obj.get("customPreferences") {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        };

        Ok(Self {
            user_id: user_id.to_string(),
            allergies,
            budget: amount("budget")?,
            spent: amount("spent")?,
            custom_preferences,
            last_updated: None,
        })
    }
}

/// Lifecycle of a stored meal plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlanStatus {
    #[default]
    Active,
    Archived,
}

impl PlanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Archived => "archived",
        }
    }
}

impl std::str::FromStr for PlanStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "archived" => Ok(Self::Archived),
            _ => Err(format!("Unknown plan status: {}", s)),
        }
    }
}

/// A persisted meal plan, keyed by (user_id, plan_date)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredMealPlan {
    pub user_id: String,
    pub plan_date: NaiveDate,
    pub plan_id: String,
    pub meal_plan: MealPlan,
    pub preferences_used: Preferences,
    pub created_at: DateTime<Utc>,
    pub status: PlanStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_line_item_total() {
        let item = LineItem::new("Eggs", Decimal::new(250, 2), 2);
        assert_eq!(item.line_total(), Decimal::new(500, 2));
        assert_eq!(LineItem::new("Free", Decimal::ONE, 0).quantity, 1);
    }

    #[test]
    fn test_totals_saturate_instead_of_overflowing() {
        let bulk = LineItem::new("Bulk", Decimal::MAX, 2);
        assert_eq!(bulk.line_total(), Decimal::MAX);

        let items = vec![bulk, LineItem::new("Milk", Decimal::new(350, 2), 1)];
        assert_eq!(total_spent(&items), Decimal::MAX);
    }

    #[test]
    fn test_total_spent() {
        let items = vec![
            LineItem::new("Bread", Decimal::new(250, 2), 2),
            LineItem::new("Apple", Decimal::new(100, 2), 1),
        ];
        assert_eq!(total_spent(&items), Decimal::new(600, 2));
        assert_eq!(total_spent(&[]), Decimal::ZERO);
    }

    #[test]
    fn test_line_item_lenient_json() {
        let item: LineItem =
            serde_json::from_value(json!({"name": "Milk", "unitPrice": "$3.50"})).unwrap();
        assert_eq!(item.price, Decimal::new(350, 2));
        assert_eq!(item.quantity, 1);

        let out = serde_json::to_value(&item).unwrap();
        assert_eq!(out["price"], json!(3.5));
        assert!(out.get("category").is_none());
    }

    #[test]
    fn test_receipt_status_parse() {
        assert_eq!("processed".parse::<ReceiptStatus>(), Ok(ReceiptStatus::Processed));
        assert_eq!("ERROR".parse::<ReceiptStatus>(), Ok(ReceiptStatus::Error));
        assert!("pending".parse::<ReceiptStatus>().is_err());
    }

    #[test]
    fn test_overrides_from_json() {
        let overrides = PreferenceOverrides::from_json(&json!({
            "budget": "80",
            "caloricTarget": 1800,
            "dietaryRestrictions": ["peanuts", "dairy"],
            "nutritionGoal": null
        }))
        .unwrap();
        assert_eq!(overrides.budget, Some(Decimal::from(80)));
        assert_eq!(overrides.caloric_target, Some(1800));
        assert_eq!(
            overrides.dietary_restrictions.as_deref(),
            Some("peanuts, dairy")
        );
        assert!(overrides.nutrition_goal.is_none());
        assert!(!overrides.is_empty());

        assert!(PreferenceOverrides::from_json(&json!({})).unwrap().is_empty());
        assert!(PreferenceOverrides::from_json(&Value::Null).unwrap().is_empty());
    }

    #[test]
    fn test_overrides_reject_non_numeric_budget() {
        let err = PreferenceOverrides::from_json(&json!({"budget": "lots"})).unwrap_err();
        assert!(err.is_input_error());
        assert_eq!(err.to_string(), "budget must be a number");
    }

    #[test]
    fn test_profile_from_json_validation() {
        let profile = UserProfile::from_json(&json!({
            "userId": "u1",
            "allergies": ["peanuts"],
            "budget": 500,
            "spent": "150.25",
            "customPreferences": 42
        }))
        .unwrap();
        assert_eq!(profile.allergies, vec!["peanuts".to_string()]);
        assert_eq!(profile.spent, Decimal::new(15025, 2));
        assert_eq!(profile.custom_preferences, "42");

        let err = UserProfile::from_json(&json!({"userId": "u1", "allergies": "nuts"}))
            .unwrap_err();
        assert_eq!(err.to_string(), "allergies must be an array");

        let err = UserProfile::from_json(&json!({"allergies": []})).unwrap_err();
        assert_eq!(err.to_string(), "userId is required");

        let err = UserProfile::from_json(&json!({"userId": "u1", "budget": "abc"}))
            .unwrap_err();
        assert_eq!(err.to_string(), "budget must be a number");
    }
}
