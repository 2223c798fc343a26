//! Integration tests for savr-core
//!
//! These tests exercise the full receipt → analysis → meal plan workflow
//! against a real database and mock HTTP collaborators.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use serde_json::json;

use savr_core::{
    ai::AIClient,
    db::Database,
    insights::FALLBACK_CATEGORY,
    ocr::DirectoryOcrEngine,
    pipeline::{AnalyzeRequest, Fallback, Pipeline, PlanRequest},
    test_utils::{MockOllamaServer, MockPexelsServer, MOCK_PHOTO_URL},
    LineItem, PexelsClient, PromptLibrary, ReceiptStatus, SavrConfig, Store,
};

/// Expense analysis in the shape the OCR service returns it
fn grocery_receipt() -> serde_json::Value {
    json!({
        "ExpenseDocuments": [{
            "LineItemGroups": [{
                "LineItems": [
                    {"LineItemExpenseFields": [
                        {"Type": {"Text": "ITEM"}, "ValueDetection": {"Text": "Milk"}},
                        {"Type": {"Text": "PRICE"}, "ValueDetection": {"Text": "$3.50"}}
                    ]},
                    {"LineItemExpenseFields": [
                        {"Type": {"Text": "ITEM"}, "ValueDetection": {"Text": "Eggs"}},
                        {"Type": {"Text": "PRICE"}, "ValueDetection": {"Text": "4.00"}},
                        {"Type": {"Text": "QUANTITY"}, "ValueDetection": {"Text": "1"}}
                    ]}
                ]
            }],
            "SummaryFields": [
                {"Type": {"Text": "TOTAL"}, "ValueDetection": {"Text": "$7.50"}},
                {"Type": {"Text": "VENDOR_NAME"}, "ValueDetection": {"Text": "Corner Market"}}
            ]
        }]
    })
}

fn ocr_dir_with(name: &str, analysis: serde_json::Value) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join(format!("{}.json", name)),
        serde_json::to_string(&analysis).unwrap(),
    )
    .unwrap();
    dir
}

fn pipeline(db: &Database) -> Pipeline {
    Pipeline::new(Arc::new(db.clone()), SavrConfig::default())
        .with_prompts(PromptLibrary::embedded_only())
}

// =============================================================================
// Receipt Workflow
// =============================================================================

#[tokio::test]
async fn test_receipt_to_insights_with_failing_model() {
    let db = Database::in_memory().expect("Failed to create database");
    let ocr_dir = ocr_dir_with("r1.jpg", grocery_receipt());
    let model = MockOllamaServer::start_failing().await;

    let pipeline = pipeline(&db)
        .with_ocr(Arc::new(DirectoryOcrEngine::new(ocr_dir.path())))
        .with_ai(AIClient::ollama(&model.url(), "llama3.2"));

    let processed = pipeline
        .process_receipt("receipts/u1/r1.jpg")
        .await
        .unwrap();
    assert_eq!(processed.record.status, ReceiptStatus::Processed);
    assert_eq!(processed.record.items.len(), 2);

    let outcome = pipeline
        .analyze(AnalyzeRequest {
            s3_key: Some("receipts/u1/r1.jpg".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(outcome.fallback, Some(Fallback::ModelUnavailable));
    assert_eq!(
        outcome.insights.budget_analysis.total_spent,
        Decimal::new(750, 2)
    );
    let other = &outcome.insights.categories[FALLBACK_CATEGORY];
    let names: Vec<&str> = other.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, vec!["Milk", "Eggs"]);
    assert_eq!(outcome.insights.item_count, 2);

    // Insights attached and spend tracked
    let record = db.get_receipt("u1", "r1.jpg").unwrap().unwrap();
    assert_eq!(record.insights.unwrap().item_count, 2);
    assert_eq!(
        db.get_profile("u1").unwrap().unwrap().spent,
        Decimal::new(750, 2)
    );
    assert_eq!(model.prompts().len(), 1);
}

#[tokio::test]
async fn test_summary_only_receipt() {
    let db = Database::in_memory().unwrap();
    let ocr_dir = ocr_dir_with(
        "total-only.jpg",
        json!({"ExpenseDocuments": [{"SummaryFields": [
            {"Type": {"Text": "TOTAL"}, "ValueDetection": {"Text": "$1,234.56"}}
        ]}]}),
    );

    let pipeline = pipeline(&db).with_ocr(Arc::new(DirectoryOcrEngine::new(ocr_dir.path())));
    let processed = pipeline
        .process_receipt("receipts/u2/total-only.jpg")
        .await
        .unwrap();

    assert_eq!(
        processed.record.items,
        vec![LineItem::new(
            "Purchase from Unknown Store",
            Decimal::new(123456, 2),
            1
        )]
    );
}

#[tokio::test]
async fn test_missing_analysis_persists_error_record() {
    let db = Database::in_memory().unwrap();
    let ocr_dir = tempfile::tempdir().unwrap();

    let pipeline = pipeline(&db).with_ocr(Arc::new(DirectoryOcrEngine::new(ocr_dir.path())));
    let processed = pipeline
        .process_receipt("receipts/u3/missing.jpg")
        .await
        .unwrap();

    assert!(processed.persisted);
    assert_eq!(processed.record.status, ReceiptStatus::Error);
    let stored = db.recent_receipts("u3", 10).unwrap();
    assert_eq!(stored.len(), 1);
    assert!(stored[0].items.is_empty());
}

#[tokio::test]
async fn test_analysis_with_ollama_model() {
    let db = Database::in_memory().unwrap();
    let model = MockOllamaServer::start().await;
    let pipeline = pipeline(&db).with_ai(AIClient::ollama(&model.url(), "llama3.2"));

    let outcome = pipeline
        .analyze(AnalyzeRequest {
            user_id: Some("u1".to_string()),
            items: vec![
                LineItem::new("Milk", Decimal::new(350, 2), 1),
                LineItem::new("Eggs", Decimal::new(400, 2), 1),
            ],
            budget: Some(Decimal::from(50)),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(outcome.fallback, None);
    assert!(outcome.insights.categories.contains_key("dairy"));
    assert_eq!(outcome.insights.original_items.len(), 2);
    assert!(model.prompts()[0].contains("$50"));
}

// =============================================================================
// Meal Plan Workflow
// =============================================================================

#[tokio::test]
async fn test_meal_plan_with_images() {
    let db = Database::in_memory().unwrap();
    let model = MockOllamaServer::start().await;
    let pexels = MockPexelsServer::start().await;
    let images =
        PexelsClient::with_base_url(&pexels.url(), "test-key", Duration::from_secs(5)).unwrap();

    let pipeline = pipeline(&db)
        .with_ai(AIClient::ollama(&model.url(), "llama3.2"))
        .with_images(Arc::new(images));

    let outcome = pipeline
        .generate_plan(PlanRequest {
            user_id: Some("u1".to_string()),
            pantry_items: vec!["chicken".to_string()],
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(outcome.fallback, None);
    assert_eq!(outcome.meal_plan.meals.len(), 7);
    assert!(outcome
        .meal_plan
        .meals
        .iter()
        .all(|m| m.image_url == MOCK_PHOTO_URL));
    assert!(pexels
        .queries()
        .contains(&"Greek Yogurt Parfait food".to_string()));

    let stored = db.get_meal_plan("u1", outcome.plan_date).unwrap().unwrap();
    assert_eq!(Some(stored.plan_id), outcome.plan_id);
    assert_eq!(stored.meal_plan.meals.len(), 7);
}

#[tokio::test]
async fn test_meal_plan_image_search_failure_keeps_defaults() {
    let db = Database::in_memory().unwrap();
    let model = MockOllamaServer::start().await;
    let pexels = MockPexelsServer::start_failing().await;
    let images =
        PexelsClient::with_base_url(&pexels.url(), "test-key", Duration::from_secs(5)).unwrap();

    let pipeline = pipeline(&db)
        .with_ai(AIClient::ollama(&model.url(), "llama3.2"))
        .with_images(Arc::new(images));

    let outcome = pipeline.generate_plan(PlanRequest::default()).await.unwrap();
    assert_eq!(outcome.meal_plan.meals.len(), 7);
    assert!(outcome
        .meal_plan
        .meals
        .iter()
        .all(|m| m.image_url.starts_with("https://images.pexels.com/")));
}

#[tokio::test]
async fn test_meal_plan_preferences_round_trip() {
    let db = Database::in_memory().unwrap();
    let pipeline = pipeline(&db);

    let request = PlanRequest::from_json(&json!({
        "userId": "u9",
        "preferences": {"budget": 80, "dietaryRestrictions": "vegan", "proteinTarget": "120"}
    }))
    .unwrap();
    let outcome = pipeline.generate_plan(request).await.unwrap();

    assert_eq!(outcome.fallback, Some(Fallback::ModelUnavailable));
    assert_eq!(
        outcome.meal_plan.weekly_totals.estimated_cost,
        Decimal::from(80)
    );

    // A later read without request data sees the written-back values
    let prefs = pipeline.preferences("u9");
    assert_eq!(prefs.dietary_restrictions, "vegan");
    assert_eq!(prefs.protein_target, 120);
    assert_eq!(prefs.caloric_target, 2000);
}
