//! Receipt record operations

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use super::{format_datetime, json_column, parse_datetime, Database};
use crate::error::{Error, Result};
use crate::insights::Insights;
use crate::models::ReceiptRecord;

const RECEIPT_COLUMNS: &str = "user_id, receipt_id, source_key, items, processed_at, status,
     error, insights, analyzed_at";

impl Database {
    /// Insert or replace a receipt record
    pub fn upsert_receipt(&self, record: &ReceiptRecord) -> Result<()> {
        let conn = self.conn()?;
        let insights = record
            .insights
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        conn.execute(
            "INSERT OR REPLACE INTO receipts (user_id, receipt_id, source_key, items, processed_at,
             status, error, insights, analyzed_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                record.user_id,
                record.receipt_id,
                record.source_key,
                serde_json::to_string(&record.items)?,
                format_datetime(&record.processed_at),
                record.status.as_str(),
                record.error,
                insights,
                record.analyzed_at.as_ref().map(format_datetime),
            ],
        )?;
        Ok(())
    }

    /// Get a receipt by its composite key
    pub fn find_receipt(&self, user_id: &str, receipt_id: &str) -> Result<Option<ReceiptRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM receipts WHERE user_id = ? AND receipt_id = ?",
            RECEIPT_COLUMNS
        ))?;

        let record = stmt
            .query_row(params![user_id, receipt_id], Self::row_to_receipt)
            .optional()?;

        Ok(record)
    }

    /// Most recently processed receipts for a user
    pub fn list_receipts(&self, user_id: &str, limit: usize) -> Result<Vec<ReceiptRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM receipts WHERE user_id = ?
             ORDER BY processed_at DESC, receipt_id DESC
             LIMIT ?",
            RECEIPT_COLUMNS
        ))?;

        let records = stmt
            .query_map(params![user_id, limit as i64], Self::row_to_receipt)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(records)
    }

    /// Attach analysis results to a stored receipt
    pub fn update_receipt_insights(
        &self,
        user_id: &str,
        receipt_id: &str,
        insights: &Insights,
        analyzed_at: DateTime<Utc>,
    ) -> Result<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE receipts SET insights = ?, analyzed_at = ? WHERE user_id = ? AND receipt_id = ?",
            params![
                serde_json::to_string(insights)?,
                format_datetime(&analyzed_at),
                user_id,
                receipt_id,
            ],
        )?;

        if updated == 0 {
            return Err(Error::NotFound(format!(
                "receipt {} for user {}",
                receipt_id, user_id
            )));
        }
        Ok(())
    }

    fn row_to_receipt(row: &rusqlite::Row<'_>) -> rusqlite::Result<ReceiptRecord> {
        let processed_at: String = row.get(4)?;
        let status: String = row.get(5)?;
        let insights: Option<String> = row.get(7)?;
        let analyzed_at: Option<String> = row.get(8)?;

        Ok(ReceiptRecord {
            user_id: row.get(0)?,
            receipt_id: row.get(1)?,
            source_key: row.get(2)?,
            items: json_column(row, 3)?,
            processed_at: parse_datetime(&processed_at),
            status: status.parse().unwrap_or_default(),
            error: row.get(6)?,
            // Unreadable insights are treated as not yet analyzed
            insights: insights.and_then(|s| serde_json::from_str(&s).ok()),
            analyzed_at: analyzed_at.as_deref().map(parse_datetime),
        })
    }
}
