//! Database tests

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;

use super::*;
use crate::extract::{build_receipt_record, error_record, ReceiptKey};
use crate::insights::fallback_insights;
use crate::models::{LineItem, PlanStatus, ReceiptStatus};
use crate::plan::fallback_plan;
use crate::preferences::PreferenceResolver;

fn items() -> Vec<LineItem> {
    vec![
        LineItem::new("Milk", Decimal::new(350, 2), 1),
        LineItem::new("Eggs", Decimal::new(400, 2), 2),
    ]
}

#[test]
fn test_in_memory_db() {
    let db = Database::in_memory().unwrap();
    assert!(db.recent_receipts("u1", 10).unwrap().is_empty());
    assert!(db.get_preferences("u1").unwrap().is_none());
}

#[test]
fn test_migrations_are_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("savr.db");
    let path = path.to_str().unwrap();

    let db = Database::new_unencrypted(path).unwrap();
    db.put_receipt(&build_receipt_record(
        &ReceiptKey::parse("receipts/u1/a.jpg"),
        items(),
        Utc::now(),
    ))
    .unwrap();
    drop(db);

    let db = Database::new_unencrypted(path).unwrap();
    assert_eq!(db.recent_receipts("u1", 10).unwrap().len(), 1);
}

#[test]
fn test_receipt_roundtrip_keeps_exact_prices() {
    let db = Database::in_memory().unwrap();
    let key = ReceiptKey::parse("receipts/u1/r1.jpg");
    db.put_receipt(&build_receipt_record(&key, items(), Utc::now()))
        .unwrap();

    let record = db.get_receipt("u1", "r1.jpg").unwrap().unwrap();
    assert_eq!(record.items, items());
    assert_eq!(record.status, ReceiptStatus::Processed);
    assert_eq!(record.source_key, "receipts/u1/r1.jpg");
    assert!(record.insights.is_none());
    assert!(db.get_receipt("u2", "r1.jpg").unwrap().is_none());
}

#[test]
fn test_recent_receipts_newest_first() {
    let db = Database::in_memory().unwrap();
    let base = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();

    for i in 0..5 {
        let key = ReceiptKey::parse(&format!("receipts/u1/r{}.jpg", i));
        db.put_receipt(&build_receipt_record(&key, items(), base + Duration::days(i)))
            .unwrap();
    }

    let recent = db.recent_receipts("u1", 3).unwrap();
    let ids: Vec<&str> = recent.iter().map(|r| r.receipt_id.as_str()).collect();
    assert_eq!(ids, vec!["r4.jpg", "r3.jpg", "r2.jpg"]);
}

#[test]
fn test_error_record_persists() {
    let db = Database::in_memory().unwrap();
    let at = Utc.with_ymd_and_hms(2025, 6, 1, 8, 30, 0).unwrap();
    db.put_receipt(&error_record(
        &ReceiptKey::parse("receipts/u1/bad.jpg"),
        "OCR timed out",
        at,
    ))
    .unwrap();

    let record = db.get_receipt("u1", "error-20250601-083000").unwrap().unwrap();
    assert_eq!(record.status, ReceiptStatus::Error);
    assert_eq!(record.error.as_deref(), Some("OCR timed out"));
}

#[test]
fn test_attach_insights() {
    let db = Database::in_memory().unwrap();
    let key = ReceiptKey::parse("receipts/u1/r1.jpg");
    db.put_receipt(&build_receipt_record(&key, items(), Utc::now()))
        .unwrap();

    let at = Utc::now();
    let insights = fallback_insights(&items(), at);
    db.attach_insights("u1", "r1.jpg", &insights, at).unwrap();

    let record = db.get_receipt("u1", "r1.jpg").unwrap().unwrap();
    let stored = record.insights.unwrap();
    assert_eq!(stored.budget_analysis.total_spent, Decimal::new(1150, 2));
    assert_eq!(stored.item_count, 2);
    assert!(record.analyzed_at.is_some());

    let err = db
        .attach_insights("u1", "missing.jpg", &insights, at)
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[test]
fn test_preferences_last_write_wins() {
    let db = Database::in_memory().unwrap();
    let mut prefs = PreferenceResolver::defaults("u1");
    prefs.budget = Decimal::new(7525, 2);
    prefs.dietary_restrictions = "vegetarian".to_string();
    db.put_preferences(&prefs).unwrap();

    prefs.caloric_target = 1800;
    db.put_preferences(&prefs).unwrap();

    let stored = db.get_preferences("u1").unwrap().unwrap();
    assert_eq!(stored.budget, Decimal::new(7525, 2));
    assert_eq!(stored.caloric_target, 1800);
    assert_eq!(stored.dietary_restrictions, "vegetarian");
}

#[test]
fn test_profile_and_spent_tracking() {
    let db = Database::in_memory().unwrap();

    // No profile yet: created on first increment
    let total = db.add_spent("u1", Decimal::new(750, 2)).unwrap();
    assert_eq!(total, Decimal::new(750, 2));
    let total = db.add_spent("u1", Decimal::new(250, 2)).unwrap();
    assert_eq!(total, Decimal::new(1000, 2));

    let profile = db.get_profile("u1").unwrap().unwrap();
    assert_eq!(profile.spent, Decimal::new(1000, 2));
    assert!(profile.allergies.is_empty());

    let mut updated = profile.clone();
    updated.allergies = vec!["peanuts".to_string()];
    updated.budget = Decimal::from(150);
    db.put_profile(&updated).unwrap();

    let profile = db.get_profile("u1").unwrap().unwrap();
    assert_eq!(profile.allergies, vec!["peanuts".to_string()]);
    assert_eq!(profile.budget, Decimal::from(150));
    assert_eq!(profile.spent, Decimal::new(1000, 2));
}

#[test]
fn test_spent_saturates_at_max() {
    let db = Database::in_memory().unwrap();

    db.add_spent("u1", Decimal::MAX).unwrap();
    let total = db.add_spent("u1", Decimal::new(750, 2)).unwrap();
    assert_eq!(total, Decimal::MAX);
    assert_eq!(db.get_profile("u1").unwrap().unwrap().spent, Decimal::MAX);
}

#[test]
fn test_meal_plans_keyed_by_date() {
    let db = Database::in_memory().unwrap();
    let prefs = PreferenceResolver::defaults("u1");

    for day in 1..=3 {
        db.put_meal_plan(&StoredMealPlan {
            user_id: "u1".to_string(),
            plan_date: NaiveDate::from_ymd_opt(2025, 2, day).unwrap(),
            plan_id: format!("plan-{}", day),
            meal_plan: fallback_plan(&prefs),
            preferences_used: prefs.clone(),
            created_at: Utc::now(),
            status: PlanStatus::Active,
        })
        .unwrap();
    }

    let date = NaiveDate::from_ymd_opt(2025, 2, 2).unwrap();
    let plan = db.get_meal_plan("u1", date).unwrap().unwrap();
    assert_eq!(plan.plan_id, "plan-2");
    assert_eq!(plan.meal_plan, fallback_plan(&prefs));
    assert_eq!(plan.preferences_used, prefs);

    let recent = db.recent_meal_plans("u1", 2).unwrap();
    let ids: Vec<&str> = recent.iter().map(|p| p.plan_id.as_str()).collect();
    assert_eq!(ids, vec!["plan-3", "plan-2"]);
}

#[test]
fn test_audit_log() {
    let db = Database::in_memory().unwrap();
    let first = db
        .log_audit("u1", "analyze", Some("receipt"), Some("r1.jpg"), None)
        .unwrap();
    let second = db
        .log_audit("u1", "generate_plan", None, None, Some("fallback"))
        .unwrap();
    assert!(second > first);

    let entries = db.list_audit_log(10).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].action, "generate_plan");
    assert_eq!(entries[1].entity_id.as_deref(), Some("r1.jpg"));
}

#[test]
fn test_encrypted_database_reopens_with_key() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("enc.db");
    let path = path.to_str().unwrap();

    let db = Database::new_with_key(path, Some("correct horse")).unwrap();
    db.put_preferences(&PreferenceResolver::defaults("u1")).unwrap();
    drop(db);

    let db = Database::new_with_key(path, Some("correct horse")).unwrap();
    assert!(db.get_preferences("u1").unwrap().is_some());
    drop(db);

    assert!(Database::new_with_key(path, Some("wrong")).is_err());
}

#[test]
fn test_derive_key_is_stable() {
    let a = derive_key("passphrase").unwrap();
    let b = derive_key("passphrase").unwrap();
    assert_eq!(a, b);
    assert_ne!(a, derive_key("other").unwrap());
}
