//! Mock backend for testing
//!
//! Returns canned model text without any network access. By default the
//! reply matches the kind of prompt (meal plan or receipt analysis).

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::prompts::RenderedPrompt;

use super::types::GenerationOptions;
use super::AIBackend;

/// Canned receipt analysis, wrapped in prose the way real models answer
pub const MOCK_INSIGHTS_RESPONSE: &str = r#"Here is the analysis you asked for:
{
  "categories": {
    "dairy": [{"name": "Milk", "price": 3.50, "quantity": 1}],
    "protein": [{"name": "Eggs", "price": 4.00, "quantity": 1}]
  },
  "nutritionalAssessment": {
    "healthScore": 7,
    "healthyItemsCount": 2,
    "unhealthyItemsCount": 0,
    "balanceDescription": "Good protein sources, no produce"
  },
  "budgetAnalysis": {
    "totalSpent": 7.50,
    "averageItemCost": 3.75,
    "budgetStatus": "Under budget",
    "savingsOpportunities": ["Buy eggs by the dozen"]
  },
  "recipeSuggestions": [
    {"name": "French toast", "ingredients": ["milk", "eggs", "bread"], "prepTime": "15 mins", "servings": 2, "estimatedCost": 4.00}
  ],
  "missingEssentials": ["vegetables", "fruit"],
  "mealPlanIdeas": ["Monday: scrambled eggs"],
  "healthTips": ["Add leafy greens"]
}
Hope this helps!"#;

/// Canned two-day meal plan
pub const MOCK_MEAL_PLAN_RESPONSE: &str = r#"```json
{
  "weeklyPlan": {
    "monday": {
      "breakfast": {"name": "Greek Yogurt Parfait", "ingredients": ["yogurt", "berries", "granola"], "calories": 350, "protein": 20, "carbs": 45, "fat": 9, "prepTime": "5 mins"},
      "lunch": {"name": "Turkey Sandwich", "ingredients": ["bread", "turkey", "lettuce"], "calories": 500, "protein": 30, "carbs": 50, "fat": 15, "prepTime": "10 mins"},
      "dinner": {"name": "Chicken Stir Fry", "ingredients": ["chicken", "peppers", "rice"], "calories": 650, "protein": 40, "carbs": 70, "fat": 18, "prepTime": "25 mins"},
      "snacks": [{"name": "Apple Slices", "ingredients": ["apple"], "calories": 95, "protein": 0, "carbs": 25, "fat": 0, "prepTime": "2 mins"}]
    },
    "tuesday": {
      "breakfast": {"name": "Scrambled Eggs", "ingredients": ["eggs", "butter"], "calories": 300, "protein": 18, "carbs": 2, "fat": 22, "prepTime": "8 mins"},
      "lunch": {"name": "Lentil Soup", "ingredients": ["lentils", "carrots"], "calories": 450, "protein": 24, "carbs": 60, "fat": 8, "prepTime": "30 mins"},
      "dinner": {"name": "Baked Cod", "ingredients": ["cod", "potatoes"], "calories": 600, "protein": 42, "carbs": 55, "fat": 14, "prepTime": "25 mins"},
      "snacks": []
    }
  },
  "weeklyTotals": {"totalCalories": 2945, "avgDailyCalories": 1473, "totalProtein": 174, "totalCarbs": 307, "totalFat": 86, "estimatedCost": 62.50},
  "shoppingList": ["yogurt", "berries", "turkey", "chicken", "lentils", "cod"],
  "tips": ["Prep the stir fry vegetables on Sunday"]
}
```"#;

#[derive(Clone)]
enum MockReply {
    /// Pick a canned reply from the prompt contents
    Canned,
    Fixed(String),
    Fail(String),
}

/// Mock AI backend for testing
///
/// Records every prompt it receives so tests can assert on rendering.
#[derive(Clone)]
pub struct MockBackend {
    /// Whether health_check should return true
    pub healthy: bool,
    reply: MockReply,
    prompts: Arc<Mutex<Vec<RenderedPrompt>>>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    /// Create a new mock backend (healthy, canned replies)
    pub fn new() -> Self {
        Self {
            healthy: true,
            reply: MockReply::Canned,
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn unhealthy() -> Self {
        Self {
            healthy: false,
            ..Self::new()
        }
    }

    /// Always answer with `text`
    pub fn with_response(text: &str) -> Self {
        Self {
            reply: MockReply::Fixed(text.to_string()),
            ..Self::new()
        }
    }

    /// Fail every generation with an upstream error
    pub fn failing(message: &str) -> Self {
        Self {
            reply: MockReply::Fail(message.to_string()),
            ..Self::new()
        }
    }

    /// Create a new instance with a different model (no-op for mock)
    pub fn with_model(&self, _model: &str) -> Self {
        self.clone()
    }

    /// Prompts received so far, oldest first
    pub fn prompts(&self) -> Vec<RenderedPrompt> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl AIBackend for MockBackend {
    async fn generate(
        &self,
        prompt: &RenderedPrompt,
        _options: &GenerationOptions,
    ) -> Result<String> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.clone());
        }

        match &self.reply {
            MockReply::Fixed(text) => Ok(text.clone()),
            MockReply::Fail(message) => Err(Error::Upstream(message.clone())),
            MockReply::Canned if prompt.user.contains("weeklyPlan") => {
                Ok(MOCK_MEAL_PLAN_RESPONSE.to_string())
            }
            MockReply::Canned => Ok(MOCK_INSIGHTS_RESPONSE.to_string()),
        }
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }

    fn model(&self) -> &str {
        "mock"
    }

    fn host(&self) -> &str {
        "mock://localhost"
    }

    fn backend_name(&self) -> &'static str {
        "mock"
    }
}
