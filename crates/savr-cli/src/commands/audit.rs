//! Audit log command

use anyhow::Result;
use savr_core::Database;

use super::truncate;

pub fn cmd_audit(db: &Database, limit: i64) -> Result<()> {
    let entries = db.list_audit_log(limit)?;

    if entries.is_empty() {
        println!("No audit entries yet.");
        return Ok(());
    }

    println!(
        "{:<27} {:<16} {:<18} {:<12} {}",
        "TIME", "USER", "ACTION", "ENTITY", "DETAILS"
    );
    println!("{}", "-".repeat(90));

    for entry in entries {
        println!(
            "{:<27} {:<16} {:<18} {:<12} {}",
            truncate(&entry.timestamp, 27),
            truncate(&entry.user_id, 16),
            entry.action,
            entry.entity_type.as_deref().unwrap_or("-"),
            entry.details.as_deref().unwrap_or("")
        );
    }

    Ok(())
}
