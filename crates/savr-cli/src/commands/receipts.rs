//! Receipt workflow commands
//!
//! - `cmd_extract` - Line items from a saved expense analysis file
//! - `cmd_process` - OCR a stored receipt and save its items
//! - `cmd_analyze` - Insights for a receipt or explicit items
//! - `cmd_receipts` - Recent receipts for a user

use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use savr_core::extract::build_receipt_record;
use savr_core::models::total_spent;
use savr_core::normalize::{parse_quantity, try_parse_decimal};
use savr_core::{
    extract_line_items, AnalyzeRequest, ExpenseAnalysis, Insights, LineItem, Pipeline,
    ReceiptKey, ReceiptStatus, Store,
};

use super::{truncate, user_or_anonymous};

/// Parse an item argument of the form `NAME:PRICE[:QUANTITY]`
///
/// The name may itself contain colons when a quantity is given.
pub fn parse_item(arg: &str) -> Result<LineItem> {
    let parts: Vec<&str> = arg.rsplitn(3, ':').collect();
    let (name, price, quantity) = match parts.as_slice() {
        [price, name] => (*name, *price, None),
        [quantity, price, name] => (*name, *price, Some(*quantity)),
        _ => bail!("Item must look like NAME:PRICE[:QUANTITY], got '{}'", arg),
    };

    let name = name.trim();
    if name.is_empty() {
        bail!("Item name is empty in '{}'", arg);
    }
    let price = try_parse_decimal(price)
        .filter(|p| !p.is_sign_negative())
        .with_context(|| format!("Invalid price in '{}'", arg))?;
    let quantity = quantity.map(parse_quantity).unwrap_or(1);

    Ok(LineItem::new(name, price, quantity))
}

/// Build an analysis request from command-line arguments
pub fn analyze_request(
    user: Option<&str>,
    key: Option<&str>,
    items: &[String],
    budget: Option<&str>,
) -> Result<AnalyzeRequest> {
    let items = items
        .iter()
        .map(|arg| parse_item(arg))
        .collect::<Result<Vec<_>>>()?;
    let budget = budget
        .map(|b| try_parse_decimal(b).with_context(|| format!("Invalid budget '{}'", b)))
        .transpose()?;

    Ok(AnalyzeRequest {
        s3_key: key.map(str::to_string),
        user_id: user.map(str::to_string),
        items,
        budget,
        dietary_restrictions: None,
    })
}

fn print_items(items: &[LineItem]) {
    println!("   {:<35} {:>5} {:>10}", "ITEM", "QTY", "PRICE");
    println!("   {}", "-".repeat(52));
    for item in items {
        println!(
            "   {:<35} {:>5} {:>10}",
            truncate(&item.name, 35),
            item.quantity,
            format!("${:.2}", item.price)
        );
    }
}

pub fn cmd_extract(file: &Path, key: Option<&str>, json: bool) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let analysis: ExpenseAnalysis = serde_json::from_str(&content)
        .with_context(|| format!("{} is not an expense analysis result", file.display()))?;

    let items = extract_line_items(&analysis);

    if let Some(key) = key {
        let record = build_receipt_record(&ReceiptKey::parse(key), items, Utc::now());
        if json {
            println!("{}", serde_json::to_string_pretty(&record)?);
        } else {
            println!(
                "🧾 Receipt {} for user {}: {} item(s)",
                record.receipt_id,
                record.user_id,
                record.items.len()
            );
            if !record.items.is_empty() {
                println!();
                print_items(&record.items);
            }
        }
        return Ok(());
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    println!("🧾 {} item(s) found in {}", items.len(), file.display());
    if !items.is_empty() {
        println!();
        print_items(&items);
    }

    Ok(())
}

pub async fn cmd_process(pipeline: &Pipeline, key: &str) -> Result<()> {
    println!("🔍 Processing receipt {}...", key);

    let outcome = pipeline.process_receipt(key).await?;
    let record = &outcome.record;

    match record.status {
        ReceiptStatus::Processed => {
            println!(
                "✅ Receipt {} processed: {} item(s) for user {}",
                record.receipt_id,
                record.items.len(),
                record.user_id
            );
            if !record.items.is_empty() {
                println!();
                print_items(&record.items);
            }
        }
        ReceiptStatus::Error => {
            println!(
                "⚠️  OCR failed: {}",
                record.error.as_deref().unwrap_or("unknown error")
            );
            println!("   Error record saved as {}", record.receipt_id);
        }
    }

    if !outcome.persisted {
        println!("⚠️  The record could not be saved to the database");
    }

    Ok(())
}

fn print_insights(insights: &Insights) {
    let nutrition = &insights.nutritional_assessment;
    let budget = &insights.budget_analysis;

    println!("📊 Receipt Insights ({} items)", insights.item_count);
    println!("   ─────────────────────────────");
    println!("   Total spent:   ${:.2}", budget.total_spent);
    println!("   Average item:  ${:.2}", budget.average_item_cost);
    println!("   Budget:        {}", budget.budget_status);
    println!("   Health score:  {}/10", nutrition.health_score);
    if !nutrition.balance_description.is_empty() {
        println!("   Balance:       {}", nutrition.balance_description);
    }

    println!();
    println!("🥕 Categories");
    for (category, items) in &insights.categories {
        let names: Vec<&str> = items.iter().map(|i| i.name.as_str()).collect();
        println!("   {:<12} {}", category, names.join(", "));
    }

    let sections: [(&str, Vec<&str>); 4] = [
        (
            "🍳 Recipe ideas",
            insights
                .recipe_suggestions
                .iter()
                .map(|r| r.name.as_str())
                .collect(),
        ),
        (
            "🛒 Missing essentials",
            insights.missing_essentials.iter().map(String::as_str).collect(),
        ),
        (
            "💰 Savings",
            budget.savings_opportunities.iter().map(String::as_str).collect(),
        ),
        (
            "💡 Health tips",
            insights.health_tips.iter().map(String::as_str).collect(),
        ),
    ];
    for (title, lines) in sections {
        if lines.is_empty() {
            continue;
        }
        println!();
        println!("{}", title);
        for line in lines {
            println!("   - {}", line);
        }
    }
}

pub async fn cmd_analyze(pipeline: &Pipeline, request: AnalyzeRequest, json: bool) -> Result<()> {
    let outcome = pipeline.analyze(request).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome.insights)?);
        return Ok(());
    }

    if outcome.fallback.is_some() {
        println!("💡 AI analysis unavailable; showing basic insights");
        println!();
    }
    print_insights(&outcome.insights);

    if let Some(spent) = outcome.spent {
        println!();
        println!("   Running spend for {}: ${:.2}", outcome.user_id, spent);
    }

    Ok(())
}

pub fn cmd_receipts(pipeline: &Pipeline, user: Option<&str>, limit: usize) -> Result<()> {
    let user_id = user_or_anonymous(user);
    let receipts = pipeline.store().recent_receipts(user_id, limit)?;

    if receipts.is_empty() {
        println!("No receipts for {}.", user_id);
        return Ok(());
    }

    println!(
        "{:<30} {:<10} {:>6} {:>10}  {}",
        "RECEIPT", "STATUS", "ITEMS", "TOTAL", "PROCESSED"
    );
    println!("{}", "-".repeat(80));

    for record in receipts {
        let total = total_spent(&record.items);
        println!(
            "{:<30} {:<10} {:>6} {:>10}  {}",
            truncate(&record.receipt_id, 30),
            record.status.as_str(),
            record.items.len(),
            format!("${:.2}", total),
            record.processed_at.format("%Y-%m-%d %H:%M")
        );
    }

    Ok(())
}
