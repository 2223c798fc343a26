//! Receipt and meal plan pipelines
//!
//! Each run walks a fixed sequence of stages:
//!
//! ```text
//! Extracting -> Extracted | ExtractionFailed
//! Prompting -> ModelInvoked -> Parsed | ParseFailed
//! Enriching -> Enriched | EnrichmentFailed
//! Assembled -> Persisted
//! ```
//!
//! Every failure edge lands on a deterministic fallback and continues to
//! `Assembled`. Only missing input and missing configuration stop a run.
//! Stage transitions are logged with `stage` and `fallback` fields.

use std::sync::{Arc, Mutex};

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::ai::parsing::{parse_insights_response, parse_meal_plan_response};
use crate::ai::{AIBackend, AIClient, BackendInfo, GenerationOptions};
use crate::config::SavrConfig;
use crate::error::{Error, Result};
use crate::extract::{build_receipt_record, error_record, extract_line_items, ReceiptKey};
use crate::images::{ImageSearch, NoImageSearch, PexelsClient};
use crate::insights::{fallback_insights, Insights};
use crate::models::{
    LineItem, PlanStatus, PreferenceOverrides, Preferences, ReceiptRecord, StoredMealPlan,
    UserProfile, ANONYMOUS_USER,
};
use crate::normalize::{lenient_decimal_opt, lenient_strings};
use crate::ocr::{self, OcrEngine};
use crate::plan::{enrich_meals, fallback_plan, limited_data_plan, MealPlan};
use crate::preferences::PreferenceResolver;
use crate::prompts::{
    build_analysis_prompt, build_meal_plan_prompt, AnalysisContext, PromptLibrary, RenderedPrompt,
};
use crate::store::Store;

/// Pipeline state machine stages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Extracting,
    Extracted,
    ExtractionFailed,
    Prompting,
    ModelInvoked,
    Parsed,
    ParseFailed,
    Enriching,
    Enriched,
    EnrichmentFailed,
    Assembled,
    Persisted,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Extracting => "extracting",
            Self::Extracted => "extracted",
            Self::ExtractionFailed => "extraction_failed",
            Self::Prompting => "prompting",
            Self::ModelInvoked => "model_invoked",
            Self::Parsed => "parsed",
            Self::ParseFailed => "parse_failed",
            Self::Enriching => "enriching",
            Self::Enriched => "enriched",
            Self::EnrichmentFailed => "enrichment_failed",
            Self::Assembled => "assembled",
            Self::Persisted => "persisted",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which fallback, if any, produced an artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Fallback {
    /// Model unavailable or failed: local synthetic result
    ModelUnavailable,
    /// Model answered but the answer could not be parsed
    Unparseable,
}

/// Input for a receipt analysis run
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub s3_key: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    /// Items to analyze; when empty they are read from the stored receipt
    #[serde(default)]
    pub items: Vec<LineItem>,
    #[serde(default, deserialize_with = "lenient_decimal_opt")]
    pub budget: Option<Decimal>,
    #[serde(default)]
    pub dietary_restrictions: Option<String>,
}

/// Input for a meal plan run
#[derive(Debug, Clone, Default)]
pub struct PlanRequest {
    pub user_id: Option<String>,
    /// Ingredient names on hand; when empty, grocery history is used
    pub pantry_items: Vec<String>,
    pub preferences: PreferenceOverrides,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPlanRequest {
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_strings")]
    pantry_items: Vec<String>,
    #[serde(default)]
    preferences: Value,
}

impl PlanRequest {
    /// Validate an untyped request body
    pub fn from_json(value: &Value) -> Result<Self> {
        let raw: RawPlanRequest = match value {
            Value::Null => return Ok(Self::default()),
            _ => serde_json::from_value(value.clone())
                .map_err(|e| Error::InvalidInput(format!("Invalid request body: {}", e)))?,
        };
        Ok(Self {
            user_id: raw.user_id.filter(|u| !u.trim().is_empty()),
            pantry_items: raw.pantry_items,
            preferences: PreferenceOverrides::from_json(&raw.preferences)?,
        })
    }
}

/// Result of OCR + extraction for one receipt image
#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    pub record: ReceiptRecord,
    /// Whether the record reached the store
    pub persisted: bool,
}

/// Result of a receipt analysis run
#[derive(Debug, Clone)]
pub struct AnalyzeOutcome {
    pub user_id: String,
    pub s3_key: Option<String>,
    pub insights: Insights,
    pub fallback: Option<Fallback>,
    /// New running spend, when budget tracking succeeded
    pub spent: Option<Decimal>,
}

/// Result of a meal plan run
#[derive(Debug, Clone)]
pub struct PlanOutcome {
    pub user_id: String,
    /// `None` when the plan could not be persisted
    pub plan_id: Option<String>,
    pub plan_date: NaiveDate,
    pub meal_plan: MealPlan,
    pub preferences: Preferences,
    pub fallback: Option<Fallback>,
}

/// Collaborator configuration and AI health
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub ai: Option<BackendInfo>,
    pub ai_healthy: bool,
    pub ocr: Option<String>,
    pub image_search: bool,
}

/// Orchestrates extraction, analysis and planning over injected collaborators
pub struct Pipeline {
    store: Arc<dyn Store>,
    ai: Option<AIClient>,
    ocr: Option<Arc<dyn OcrEngine>>,
    images: Arc<dyn ImageSearch>,
    prompts: Arc<Mutex<PromptLibrary>>,
    config: SavrConfig,
}

impl Pipeline {
    /// Pipeline with a store and nothing else: no model, no OCR, no image search
    pub fn new(store: Arc<dyn Store>, config: SavrConfig) -> Self {
        Self {
            store,
            ai: None,
            ocr: None,
            images: Arc::new(NoImageSearch),
            prompts: Arc::new(Mutex::new(PromptLibrary::new())),
            config,
        }
    }

    /// Wire every collaborator from the environment
    pub fn from_env(store: Arc<dyn Store>, config: SavrConfig) -> Self {
        let images: Arc<dyn ImageSearch> = match PexelsClient::from_env(config.image_timeout) {
            Some(client) => Arc::new(client),
            None => Arc::new(NoImageSearch),
        };

        let mut pipeline = Self::new(store, config).with_images(images);
        pipeline.ai = AIClient::from_env();
        pipeline.ocr = ocr::from_env();
        pipeline
    }

    pub fn with_ai(mut self, ai: AIClient) -> Self {
        self.ai = Some(ai);
        self
    }

    pub fn with_ocr(mut self, engine: Arc<dyn OcrEngine>) -> Self {
        self.ocr = Some(engine);
        self
    }

    pub fn with_images(mut self, images: Arc<dyn ImageSearch>) -> Self {
        self.images = images;
        self
    }

    pub fn with_prompts(mut self, library: PromptLibrary) -> Self {
        self.prompts = Arc::new(Mutex::new(library));
        self
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    pub fn ai(&self) -> Option<&AIClient> {
        self.ai.as_ref()
    }

    pub fn config(&self) -> &SavrConfig {
        &self.config
    }

    /// Record an API call; failures are logged and swallowed
    pub fn audit(
        &self,
        user_id: &str,
        action: &str,
        entity_type: Option<&str>,
        entity_id: Option<&str>,
        details: Option<&str>,
    ) {
        if let Err(e) = self
            .store
            .log_audit(user_id, action, entity_type, entity_id, details)
        {
            warn!(user_id = %user_id, action = %action, error = %e, "Audit write failed");
        }
    }

    pub async fn health(&self) -> HealthReport {
        let (ai, ai_healthy) = match &self.ai {
            Some(client) => (Some(client.info()), client.health_check().await),
            None => (None, false),
        };
        HealthReport {
            ai,
            ai_healthy,
            ocr: self.ocr.as_ref().map(|engine| engine.name().to_string()),
            image_search: self.images.is_enabled(),
        }
    }

    /// Run OCR over a stored receipt image and persist the extracted record
    ///
    /// An OCR failure is not an error: an error record is persisted in its
    /// place and returned.
    pub async fn process_receipt(&self, key: &str) -> Result<ProcessOutcome> {
        let key = key.trim();
        if key.is_empty() {
            return Err(Error::InvalidInput("s3Key is required".to_string()));
        }
        let engine = self.ocr.as_ref().ok_or_else(|| {
            Error::Config("No OCR engine configured (set SAVR_OCR_URL or SAVR_OCR_DIR)".to_string())
        })?;

        let receipt_key = ReceiptKey::parse(key);
        info!(stage = %Stage::Extracting, fallback = false, key = %key, engine = engine.name());

        let now = Utc::now();
        let record = match engine.analyze_expense(key).await {
            Ok(analysis) => {
                let items = extract_line_items(&analysis);
                info!(stage = %Stage::Extracted, fallback = false, items = items.len());
                build_receipt_record(&receipt_key, items, now)
            }
            Err(e) => {
                warn!(stage = %Stage::ExtractionFailed, fallback = true, error = %e, key = %key);
                error_record(&receipt_key, &e.to_string(), now)
            }
        };

        let persisted = match self.store.put_receipt(&record) {
            Ok(()) => {
                info!(stage = %Stage::Persisted, fallback = false, receipt_id = %record.receipt_id);
                true
            }
            Err(e) => {
                warn!(stage = %Stage::Persisted, fallback = true, error = %e, "Receipt write failed");
                false
            }
        };

        self.audit(
            &record.user_id,
            "process_receipt",
            Some("receipt"),
            Some(&record.receipt_id),
            Some(record.status.as_str()),
        );

        Ok(ProcessOutcome { record, persisted })
    }

    /// Ask the model for text, or say why there is none
    async fn invoke_model(
        &self,
        prompt: Result<RenderedPrompt>,
        options: &GenerationOptions,
    ) -> Result<String> {
        let prompt = prompt?;
        let ai = self
            .ai
            .as_ref()
            .ok_or_else(|| Error::Upstream("No AI backend configured".to_string()))?;

        debug!(backend = ai.backend_name(), model = ai.model(), "Invoking model");
        let text = ai.generate(&prompt, options).await?;
        info!(stage = %Stage::ModelInvoked, fallback = false, chars = text.len());
        Ok(text)
    }

    fn render<T>(&self, build: impl FnOnce(&mut PromptLibrary) -> Result<T>) -> Result<T> {
        info!(stage = %Stage::Prompting, fallback = false);
        let mut library = self
            .prompts
            .lock()
            .map_err(|_| Error::Config("Prompt library lock poisoned".to_string()))?;
        build(&mut library)
    }

    /// Analyze receipt items into insights; never fails once input is valid
    pub async fn analyze(&self, request: AnalyzeRequest) -> Result<AnalyzeOutcome> {
        let s3_key = request
            .s3_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string);
        let receipt_key = s3_key.as_deref().map(ReceiptKey::parse);

        if request.items.is_empty() && receipt_key.is_none() {
            return Err(Error::InvalidInput(
                "Either items or s3Key is required".to_string(),
            ));
        }

        let user_id = request
            .user_id
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(str::to_string)
            .or_else(|| receipt_key.as_ref().map(|k| k.user_id.clone()))
            .unwrap_or_else(|| ANONYMOUS_USER.to_string());

        let items = match (&receipt_key, request.items.is_empty()) {
            (Some(key), true) => self.stored_items(&user_id, &key.receipt_id),
            _ => request.items.clone(),
        };

        let stored = self.store.get_preferences(&user_id).unwrap_or_else(|e| {
            warn!(user_id = %user_id, error = %e, "Preference read failed");
            None
        });
        let context = AnalysisContext {
            budget: request
                .budget
                .filter(|b| !b.is_zero())
                .or_else(|| stored.as_ref().map(|p| p.budget)),
            dietary_restrictions: request
                .dietary_restrictions
                .clone()
                .filter(|r| !r.trim().is_empty())
                .or_else(|| stored.as_ref().map(|p| p.dietary_restrictions.clone())),
        };

        let prompt = self.render(|lib| build_analysis_prompt(lib, &items, &context));
        let analyzed_at = Utc::now();

        let (insights, fallback) = match self.invoke_model(prompt, &self.config.analysis).await {
            Err(e) => {
                warn!(stage = %Stage::ModelInvoked, fallback = true, error = %e, "Using local insights");
                (fallback_insights(&items, analyzed_at), Some(Fallback::ModelUnavailable))
            }
            Ok(text) => match parse_insights_response(
                &text,
                &items,
                analyzed_at,
                self.config.json_extraction,
            ) {
                Ok(insights) => {
                    info!(stage = %Stage::Parsed, fallback = false);
                    (insights, None)
                }
                Err(e) => {
                    warn!(stage = %Stage::ParseFailed, fallback = true, error = %e, "Using local insights");
                    (fallback_insights(&items, analyzed_at), Some(Fallback::Unparseable))
                }
            },
        };
        info!(stage = %Stage::Assembled, fallback = fallback.is_some(), items = insights.item_count);

        if let Some(key) = &receipt_key {
            match self
                .store
                .attach_insights(&user_id, &key.receipt_id, &insights, analyzed_at)
            {
                Ok(()) => info!(stage = %Stage::Persisted, fallback = false, receipt_id = %key.receipt_id),
                Err(e) => warn!(stage = %Stage::Persisted, fallback = true, error = %e, "Insights not attached"),
            }
        }

        let spent = match self
            .store
            .add_spent(&user_id, insights.budget_analysis.total_spent)
        {
            Ok(total) => {
                debug!(user_id = %user_id, spent = %total, "Budget tracking updated");
                Some(total)
            }
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Budget tracking failed");
                None
            }
        };

        self.audit(
            &user_id,
            "analyze_receipt",
            Some("receipt"),
            receipt_key.as_ref().map(|k| k.receipt_id.as_str()),
            fallback.map(|_| "fallback"),
        );

        Ok(AnalyzeOutcome {
            user_id,
            s3_key,
            insights,
            fallback,
            spent,
        })
    }

    fn stored_items(&self, user_id: &str, receipt_id: &str) -> Vec<LineItem> {
        match self.store.get_receipt(user_id, receipt_id) {
            Ok(Some(record)) => record.items,
            Ok(None) => {
                warn!(user_id = %user_id, receipt_id = %receipt_id, "No stored receipt to analyze");
                Vec::new()
            }
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Receipt read failed");
                Vec::new()
            }
        }
    }

    /// Names of recently purchased items, newest receipt first
    pub fn grocery_history(&self, user_id: &str) -> Vec<String> {
        let history = &self.config.history;
        match self.store.recent_receipts(user_id, history.receipt_limit) {
            Ok(records) => records
                .into_iter()
                .flat_map(|r| r.items)
                .take(history.item_limit)
                .map(|item| item.name)
                .collect(),
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Grocery history read failed");
                Vec::new()
            }
        }
    }

    /// Generate, enrich and persist a weekly meal plan
    pub async fn generate_plan(&self, request: PlanRequest) -> Result<PlanOutcome> {
        let user_id = request
            .user_id
            .clone()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| ANONYMOUS_USER.to_string());

        let preferences =
            PreferenceResolver::new(self.store.as_ref()).resolve(&user_id, &request.preferences);

        let groceries = if request.pantry_items.is_empty() {
            self.grocery_history(&user_id)
        } else {
            request.pantry_items.clone()
        };
        debug!(user_id = %user_id, groceries = groceries.len(), "Grocery context ready");

        let prompt = self.render(|lib| {
            build_meal_plan_prompt(
                lib,
                &preferences,
                &groceries,
                self.config.history.prompt_item_limit,
            )
        });

        let (mut meal_plan, fallback) =
            match self.invoke_model(prompt, &self.config.meal_plan).await {
                Err(e) => {
                    warn!(stage = %Stage::ModelInvoked, fallback = true, error = %e, "Using basic meal plan");
                    (fallback_plan(&preferences), Some(Fallback::ModelUnavailable))
                }
                Ok(text) => match parse_meal_plan_response(&text, self.config.json_extraction) {
                    Ok(plan) => {
                        info!(stage = %Stage::Parsed, fallback = false, meals = plan.meals.len());
                        (plan, None)
                    }
                    Err(e) => {
                        warn!(stage = %Stage::ParseFailed, fallback = true, error = %e, "Using limited-data plan");
                        (limited_data_plan(), Some(Fallback::Unparseable))
                    }
                },
            };

        if self.images.is_enabled() && !meal_plan.meals.is_empty() {
            info!(stage = %Stage::Enriching, fallback = false, meals = meal_plan.meals.len());
            let report = enrich_meals(&mut meal_plan.meals, self.images.as_ref()).await;
            if report.degraded() {
                warn!(
                    stage = %Stage::EnrichmentFailed,
                    fallback = true,
                    found = report.found,
                    failed = report.failed,
                    "Some meals kept default images"
                );
            } else {
                info!(stage = %Stage::Enriched, fallback = false, found = report.found);
            }
        }
        info!(stage = %Stage::Assembled, fallback = fallback.is_some(), meals = meal_plan.meals.len());

        let now = Utc::now();
        let stored = StoredMealPlan {
            user_id: user_id.clone(),
            plan_date: now.date_naive(),
            plan_id: uuid::Uuid::new_v4().to_string(),
            meal_plan,
            preferences_used: preferences,
            created_at: now,
            status: PlanStatus::Active,
        };

        let plan_id = match self.store.put_meal_plan(&stored) {
            Ok(()) => {
                info!(stage = %Stage::Persisted, fallback = false, plan_id = %stored.plan_id);
                Some(stored.plan_id.clone())
            }
            Err(e) => {
                warn!(stage = %Stage::Persisted, fallback = true, error = %e, "Meal plan write failed");
                None
            }
        };

        self.audit(
            &user_id,
            "generate_meal_plan",
            Some("meal_plan"),
            plan_id.as_deref(),
            fallback.map(|_| "fallback"),
        );

        Ok(PlanOutcome {
            user_id,
            plan_id,
            plan_date: stored.plan_date,
            meal_plan: stored.meal_plan,
            preferences: stored.preferences_used,
            fallback,
        })
    }

    /// Resolved preferences without writing anything
    pub fn preferences(&self, user_id: &str) -> Preferences {
        PreferenceResolver::new(self.store.as_ref()).resolve(user_id, &PreferenceOverrides::default())
    }

    /// Explicit merge-and-save; persistence failures propagate
    pub fn save_preferences(
        &self,
        user_id: &str,
        overrides: &PreferenceOverrides,
    ) -> Result<Preferences> {
        PreferenceResolver::new(self.store.as_ref()).save(user_id, overrides)
    }

    /// Stored profile, or an empty one for a new user
    pub fn profile(&self, user_id: &str) -> Result<UserProfile> {
        Ok(self
            .store
            .get_profile(user_id)?
            .unwrap_or_else(|| UserProfile::empty(user_id)))
    }

    pub fn save_profile(&self, mut profile: UserProfile) -> Result<UserProfile> {
        profile.last_updated = Some(Utc::now());
        self.store.put_profile(&profile)?;
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::MockBackend;
    use crate::insights::FALLBACK_CATEGORY;
    use crate::ocr::MockOcrEngine;
    use crate::test_utils::{FailingStore, MemoryStore};

    fn pipeline(store: Arc<dyn Store>) -> Pipeline {
        Pipeline::new(store, SavrConfig::default()).with_prompts(PromptLibrary::embedded_only())
    }

    fn milk_and_eggs() -> Vec<LineItem> {
        vec![
            LineItem::new("Milk", Decimal::new(350, 2), 1),
            LineItem::new("Eggs", Decimal::new(400, 2), 1),
        ]
    }

    #[tokio::test]
    async fn test_process_receipt_persists_items() {
        let store = Arc::new(MemoryStore::new());
        let engine = Arc::new(MockOcrEngine::with_items(&[("Milk", "$3.50", "1")]));
        let pipeline = pipeline(store.clone()).with_ocr(engine.clone());

        let outcome = pipeline
            .process_receipt("receipts/u1/r1.jpg")
            .await
            .unwrap();
        assert!(outcome.persisted);
        assert_eq!(outcome.record.items.len(), 1);
        assert_eq!(engine.calls(), vec!["receipts/u1/r1.jpg".to_string()]);

        let stored = store.get_receipt("u1", "r1.jpg").unwrap().unwrap();
        assert_eq!(stored.items[0].price, Decimal::new(350, 2));
        assert_eq!(store.audit_entries()[0].1, "process_receipt");
    }

    #[tokio::test]
    async fn test_process_receipt_ocr_failure_persists_error_record() {
        let store = Arc::new(MemoryStore::new());
        let pipeline =
            pipeline(store.clone()).with_ocr(Arc::new(MockOcrEngine::failing("throttled")));

        let outcome = pipeline
            .process_receipt("receipts/u1/r1.jpg")
            .await
            .unwrap();
        assert_eq!(outcome.record.status, crate::models::ReceiptStatus::Error);
        assert!(outcome.record.receipt_id.starts_with("error-"));
        assert!(outcome.record.error.as_deref().unwrap().contains("throttled"));
        assert_eq!(store.recent_receipts("u1", 10).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_analyze_with_overflowing_price_still_answers() {
        let store = Arc::new(MemoryStore::new());
        let pipeline = pipeline(store.clone());

        let items: Vec<LineItem> = serde_json::from_value(serde_json::json!([
            {"name": "Bulk", "price": "79228162514264337593543950335", "quantity": 2}
        ]))
        .unwrap();
        let outcome = pipeline
            .analyze(AnalyzeRequest {
                user_id: Some("u1".to_string()),
                items,
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(outcome.insights.budget_analysis.total_spent, Decimal::MAX);
        assert_eq!(outcome.insights.item_count, 1);

        pipeline
            .analyze(AnalyzeRequest {
                user_id: Some("u1".to_string()),
                items: milk_and_eggs(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(store.get_profile("u1").unwrap().unwrap().spent, Decimal::MAX);
    }

    #[tokio::test]
    async fn test_process_receipt_requires_key_and_engine() {
        let pipeline = pipeline(Arc::new(MemoryStore::new()));
        assert!(pipeline.process_receipt("  ").await.unwrap_err().is_input_error());
        assert!(pipeline
            .process_receipt("receipts/u1/r1.jpg")
            .await
            .unwrap_err()
            .is_configuration_fault());
    }

    #[tokio::test]
    async fn test_analyze_without_model_uses_fallback() {
        let store = Arc::new(MemoryStore::new());
        let pipeline = pipeline(store.clone());

        let outcome = pipeline
            .analyze(AnalyzeRequest {
                user_id: Some("u1".to_string()),
                items: milk_and_eggs(),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(outcome.fallback, Some(Fallback::ModelUnavailable));
        assert_eq!(outcome.insights.budget_analysis.total_spent, Decimal::new(750, 2));
        assert_eq!(outcome.insights.categories[FALLBACK_CATEGORY].len(), 2);
        assert_eq!(outcome.spent, Some(Decimal::new(750, 2)));
        assert_eq!(
            store.get_profile("u1").unwrap().unwrap().spent,
            Decimal::new(750, 2)
        );
    }

    #[tokio::test]
    async fn test_analyze_with_model_attaches_insights() {
        let store = Arc::new(MemoryStore::new());
        let mock = MockBackend::new();
        let pipeline = pipeline(store.clone())
            .with_ocr(Arc::new(MockOcrEngine::with_items(&[
                ("Milk", "3.50", "1"),
                ("Eggs", "4.00", "1"),
            ])))
            .with_ai(AIClient::Mock(mock.clone()));

        pipeline.process_receipt("receipts/u1/r1.jpg").await.unwrap();

        let mut prefs = PreferenceResolver::defaults("u1");
        prefs.budget = Decimal::from(60);
        prefs.dietary_restrictions = "no pork".to_string();
        store.put_preferences(&prefs).unwrap();

        let outcome = pipeline
            .analyze(AnalyzeRequest {
                s3_key: Some("receipts/u1/r1.jpg".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(outcome.user_id, "u1");
        assert_eq!(outcome.fallback, None);
        assert_eq!(outcome.insights.nutritional_assessment.health_score, 7);
        assert_eq!(outcome.insights.item_count, 2);

        let prompt = &mock.prompts()[0].user;
        assert!(prompt.contains("- Milk: $3.50 (Qty: 1)"));
        assert!(prompt.contains("$60"));
        assert!(prompt.contains("no pork"));

        let record = store.get_receipt("u1", "r1.jpg").unwrap().unwrap();
        assert!(record.insights.is_some());
        assert!(record.analyzed_at.is_some());
    }

    #[tokio::test]
    async fn test_analyze_unparseable_reply() {
        let pipeline = pipeline(Arc::new(MemoryStore::new()))
            .with_ai(AIClient::Mock(MockBackend::with_response("I'd rather not.")));

        let outcome = pipeline
            .analyze(AnalyzeRequest {
                items: milk_and_eggs(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(outcome.fallback, Some(Fallback::Unparseable));
        assert_eq!(outcome.user_id, ANONYMOUS_USER);
    }

    #[tokio::test]
    async fn test_analyze_requires_items_or_key() {
        let pipeline = pipeline(Arc::new(MemoryStore::new()));
        let err = pipeline.analyze(AnalyzeRequest::default()).await.unwrap_err();
        assert!(err.is_input_error());
    }

    #[tokio::test]
    async fn test_analyze_survives_store_outage() {
        let pipeline = pipeline(Arc::new(FailingStore))
            .with_ai(AIClient::Mock(MockBackend::failing("down")));

        let outcome = pipeline
            .analyze(AnalyzeRequest {
                s3_key: Some("receipts/u1/r1.jpg".to_string()),
                items: milk_and_eggs(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(outcome.spent, None);
        assert_eq!(outcome.insights.item_count, 2);
    }

    #[tokio::test]
    async fn test_generate_plan_with_model() {
        let store = Arc::new(MemoryStore::new());
        let pipeline = pipeline(store.clone()).with_ai(AIClient::mock());

        let outcome = pipeline
            .generate_plan(PlanRequest {
                user_id: Some("u1".to_string()),
                pantry_items: vec!["rice".to_string(), "beans".to_string()],
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(outcome.fallback, None);
        assert_eq!(outcome.meal_plan.meals.len(), 7);
        let plan_id = outcome.plan_id.unwrap();

        let stored = store
            .get_meal_plan("u1", outcome.plan_date)
            .unwrap()
            .unwrap();
        assert_eq!(stored.plan_id, plan_id);
        assert_eq!(stored.status, PlanStatus::Active);
    }

    #[tokio::test]
    async fn test_generate_plan_uses_grocery_history() {
        let store = Arc::new(MemoryStore::new());
        let mock = MockBackend::new();
        let pipeline = pipeline(store.clone())
            .with_ocr(Arc::new(MockOcrEngine::with_items(&[("Kale", "2.00", "1")])))
            .with_ai(AIClient::Mock(mock.clone()));

        pipeline.process_receipt("receipts/u1/r1.jpg").await.unwrap();
        pipeline
            .generate_plan(PlanRequest {
                user_id: Some("u1".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert!(mock.prompts()[0].user.contains("- Kale"));
    }

    #[tokio::test]
    async fn test_generate_plan_model_failure_basic_plan() {
        let store = Arc::new(MemoryStore::new());
        let pipeline = pipeline(store.clone());

        let outcome = pipeline
            .generate_plan(PlanRequest {
                user_id: Some("u1".to_string()),
                preferences: PreferenceOverrides {
                    caloric_target: Some(1800),
                    ..Default::default()
                },
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(outcome.fallback, Some(Fallback::ModelUnavailable));
        assert_eq!(outcome.meal_plan.meals.len(), 3);
        assert_eq!(outcome.meal_plan.weekly_totals.avg_daily_calories, 1800);
        // Non-empty request preferences are written back
        assert_eq!(
            store.get_preferences("u1").unwrap().unwrap().caloric_target,
            1800
        );
    }

    #[tokio::test]
    async fn test_generate_plan_parse_failure_limited_plan() {
        let pipeline = pipeline(Arc::new(MemoryStore::new()))
            .with_ai(AIClient::Mock(MockBackend::with_response("no plan today")));

        let outcome = pipeline.generate_plan(PlanRequest::default()).await.unwrap();
        assert_eq!(outcome.fallback, Some(Fallback::Unparseable));
        assert!(outcome.meal_plan.meals.is_empty());
        assert_eq!(outcome.meal_plan.weekly_totals.total_calories, 14000);
    }

    #[tokio::test]
    async fn test_generate_plan_persistence_failure_has_no_id() {
        let pipeline = pipeline(Arc::new(FailingStore));
        let outcome = pipeline.generate_plan(PlanRequest::default()).await.unwrap();
        assert_eq!(outcome.plan_id, None);
        assert_eq!(outcome.meal_plan.meals.len(), 3);
    }

    #[test]
    fn test_plan_request_from_json() {
        let request = PlanRequest::from_json(&serde_json::json!({
            "userId": "u1",
            "pantryItems": ["rice", "beans"],
            "preferences": {"budget": "75", "caloricTarget": 1900}
        }))
        .unwrap();
        assert_eq!(request.user_id.as_deref(), Some("u1"));
        assert_eq!(request.pantry_items.len(), 2);
        assert_eq!(request.preferences.budget, Some(Decimal::from(75)));

        let err = PlanRequest::from_json(&serde_json::json!({
            "preferences": {"budget": "lots"}
        }))
        .unwrap_err();
        assert_eq!(err.to_string(), "budget must be a number");
    }

    #[tokio::test]
    async fn test_health_report() {
        let pipeline = pipeline(Arc::new(MemoryStore::new()));
        let report = pipeline.health().await;
        assert!(report.ai.is_none());
        assert!(!report.ai_healthy);
        assert!(!report.image_search);

        let report = pipeline.with_ai(AIClient::mock()).health().await;
        assert_eq!(report.ai.unwrap().backend, "mock");
        assert!(report.ai_healthy);
    }
}
