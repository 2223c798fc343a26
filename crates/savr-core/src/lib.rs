//! Savr Core Library
//!
//! Shared functionality for the Savr grocery tool:
//! - Receipt OCR engines and line item extraction
//! - Money and quantity normalization
//! - Preference resolution
//! - Prompt library for customizable AI prompts
//! - Pluggable AI backends (Ollama, OpenAI-compatible, Anthropic)
//! - Insight and meal plan parsing with deterministic fallbacks
//! - Meal image lookup
//! - Database access and migrations
//! - The pipeline tying these together

pub mod ai;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod images;
pub mod insights;
pub mod models;
pub mod normalize;
pub mod ocr;
pub mod pipeline;
pub mod plan;
pub mod preferences;
pub mod prompts;
pub mod store;

/// Test utilities including mock model and image servers
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use ai::{
    AIBackend, AIClient, AnthropicBackend, BackendInfo, GenerationOptions, MockBackend,
    OllamaBackend, OpenAICompatibleBackend,
};
pub use config::SavrConfig;
pub use db::{AuditEntry, Database};
pub use error::{Error, Result};
pub use extract::{extract_line_items, ReceiptKey};
pub use images::{ImageSearch, NoImageSearch, PexelsClient};
pub use insights::Insights;
pub use models::{
    LineItem, PlanStatus, PreferenceOverrides, Preferences, ReceiptRecord, ReceiptStatus,
    StoredMealPlan, UserProfile, ANONYMOUS_USER,
};
pub use ocr::{DirectoryOcrEngine, ExpenseAnalysis, HttpOcrEngine, MockOcrEngine, OcrEngine};
pub use pipeline::{
    AnalyzeOutcome, AnalyzeRequest, Fallback, HealthReport, Pipeline, PlanOutcome, PlanRequest,
    ProcessOutcome, Stage,
};
pub use plan::{MealCard, MealPlan, MealType, Weekday};
pub use preferences::PreferenceResolver;
pub use prompts::{Prompt, PromptId, PromptInfo, PromptLibrary};
pub use store::Store;
