//! Database access layer with connection pooling and migrations
//!
//! This module is organized by domain:
//! - `receipts` - Receipt records and attached insights
//! - `preferences` - Resolved dietary/budget preferences
//! - `profiles` - Allergies, custom preferences and budget tracking
//! - `meal_plans` - Generated weekly plans, one per user and day
//! - `audit` - API access log
//!
//! Money is stored as decimal TEXT so values round-trip exactly. Nested
//! artifacts (items, insights, plans) are stored as JSON TEXT.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rust_decimal::Decimal;
use tracing::info;

use crate::error::{Error, Result};
use crate::insights::Insights;
use crate::models::{Preferences, ReceiptRecord, StoredMealPlan, UserProfile};
use crate::store::Store;

mod audit;
mod meal_plans;
mod preferences;
mod profiles;
mod receipts;

#[cfg(test)]
mod tests;

pub use audit::AuditEntry;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// Environment variable for database encryption key
pub const DB_KEY_ENV: &str = "SAVR_DB_KEY";

/// Derive an encryption key from a passphrase using Argon2
///
/// The salt is fixed so a passphrase opens the database wherever the file lives.
fn derive_key(passphrase: &str) -> Result<String> {
    use argon2::{password_hash::SaltString, Argon2, PasswordHasher};

    // Changing this invalidates every existing encrypted database
    const APP_SALT: &[u8; 16] = b"savr-salt-v1-fix";

    let salt = SaltString::encode_b64(APP_SALT)
        .map_err(|e| Error::Encryption(format!("Failed to create salt: {}", e)))?;

    let hash = Argon2::default()
        .hash_password(passphrase.as_bytes(), &salt)
        .map_err(|e| Error::Encryption(format!("Failed to derive key: {}", e)))?;

    let output = hash
        .hash
        .ok_or_else(|| Error::Encryption("No hash output".to_string()))?;
    Ok(hex::encode(output.as_bytes()))
}

/// Format a timestamp for storage; fixed width so TEXT ordering is chronological
pub(crate) fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored timestamp (RFC 3339, or SQLite's `CURRENT_TIMESTAMP` format)
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|dt| dt.and_utc())
        })
        .unwrap_or_else(|_| Utc::now())
}

/// Read a decimal TEXT column
pub(crate) fn decimal_column(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let text: String = row.get(idx)?;
    Decimal::from_str(&text).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Read a JSON TEXT column
pub(crate) fn json_column<T: serde::de::DeserializeOwned>(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> rusqlite::Result<T> {
    let text: String = row.get(idx)?;
    serde_json::from_str(&text).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Database wrapper with connection pooling
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
    db_path: String,
}

impl Database {
    /// Create a new database connection pool with encryption
    ///
    /// Requires `SAVR_DB_KEY`. Use `new_unencrypted()` for development or
    /// testing without encryption.
    pub fn new(path: &str) -> Result<Self> {
        match std::env::var(DB_KEY_ENV).ok() {
            Some(key) => Self::new_with_key(path, Some(&key)),
            None => Err(Error::Encryption(format!(
                "Database encryption required. Set {} environment variable with your passphrase, \
                or use --no-encrypt for unencrypted databases.",
                DB_KEY_ENV
            ))),
        }
    }

    /// Create a new unencrypted database connection pool
    pub fn new_unencrypted(path: &str) -> Result<Self> {
        Self::new_with_key(path, None)
    }

    /// Create a new database with an explicit encryption key
    pub fn new_with_key(path: &str, passphrase: Option<&str>) -> Result<Self> {
        let manager = SqliteConnectionManager::file(path);

        let pool = match passphrase {
            Some(pass) => {
                let key_pragma = format!("PRAGMA key = 'x\"{}\"';", derive_key(pass)?);
                // Every pooled connection needs the key before its first query
                let manager = manager.with_init(move |conn| conn.execute_batch(&key_pragma));
                Pool::builder().max_size(10).build(manager)?
            }
            None => Pool::builder().max_size(10).build(manager)?,
        };

        let db = Self {
            pool,
            db_path: path.to_string(),
        };
        db.run_migrations()?;

        Ok(db)
    }

    /// Get the path to the database file
    pub fn path(&self) -> &str {
        &self.db_path
    }

    /// Create a throwaway database (for testing)
    ///
    /// Uses a temporary file rather than `:memory:` so every pooled
    /// connection sees the same data.
    pub fn in_memory() -> Result<Self> {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!(
            "savr_test_{}_{}.db",
            std::process::id(),
            id
        ));
        let path = path.to_string_lossy().to_string();

        let _ = std::fs::remove_file(&path);

        Self::new_unencrypted(&path)
    }

    /// Get a connection from the pool
    pub fn conn(&self) -> Result<DbConn> {
        Ok(self.pool.get()?)
    }

    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            -- WAL: readers don't block writers
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;

            CREATE TABLE IF NOT EXISTS receipts (
                user_id TEXT NOT NULL,
                receipt_id TEXT NOT NULL,
                source_key TEXT NOT NULL,
                items TEXT NOT NULL DEFAULT '[]',       -- JSON array of line items
                processed_at TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'processed', -- processed, error
                error TEXT,
                insights TEXT,                          -- JSON, attached by analysis
                analyzed_at TEXT,
                PRIMARY KEY (user_id, receipt_id)
            );

            CREATE INDEX IF NOT EXISTS idx_receipts_processed ON receipts(user_id, processed_at);

            CREATE TABLE IF NOT EXISTS user_preferences (
                user_id TEXT PRIMARY KEY,
                budget TEXT NOT NULL,
                dietary_restrictions TEXT NOT NULL DEFAULT '',
                nutrition_goal TEXT NOT NULL,
                caloric_target INTEGER NOT NULL,
                protein_target INTEGER NOT NULL,
                carb_target INTEGER NOT NULL,
                fat_target INTEGER NOT NULL,
                last_updated TEXT
            );

            CREATE TABLE IF NOT EXISTS user_profiles (
                user_id TEXT PRIMARY KEY,
                allergies TEXT NOT NULL DEFAULT '[]',   -- JSON array of strings
                budget TEXT NOT NULL DEFAULT '0',
                spent TEXT NOT NULL DEFAULT '0',
                custom_preferences TEXT NOT NULL DEFAULT '',
                last_updated TEXT
            );

            CREATE TABLE IF NOT EXISTS meal_plans (
                user_id TEXT NOT NULL,
                plan_date TEXT NOT NULL,                -- YYYY-MM-DD
                plan_id TEXT NOT NULL,
                meal_plan TEXT NOT NULL,                -- JSON
                preferences_used TEXT NOT NULL,         -- JSON
                created_at TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'active',
                PRIMARY KEY (user_id, plan_date)
            );

            CREATE TABLE IF NOT EXISTS audit_log (
                id INTEGER PRIMARY KEY,
                timestamp DATETIME DEFAULT CURRENT_TIMESTAMP,
                user_id TEXT NOT NULL,
                action TEXT NOT NULL,
                entity_type TEXT,
                entity_id TEXT,
                details TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_audit_log_user ON audit_log(user_id);
            CREATE INDEX IF NOT EXISTS idx_audit_log_timestamp ON audit_log(timestamp);
            "#,
        )?;

        info!(path = %self.db_path, "Database migrations complete");
        Ok(())
    }
}

impl Store for Database {
    fn put_receipt(&self, record: &ReceiptRecord) -> Result<()> {
        self.upsert_receipt(record)
    }

    fn get_receipt(&self, user_id: &str, receipt_id: &str) -> Result<Option<ReceiptRecord>> {
        self.find_receipt(user_id, receipt_id)
    }

    fn recent_receipts(&self, user_id: &str, limit: usize) -> Result<Vec<ReceiptRecord>> {
        self.list_receipts(user_id, limit)
    }

    fn attach_insights(
        &self,
        user_id: &str,
        receipt_id: &str,
        insights: &Insights,
        analyzed_at: DateTime<Utc>,
    ) -> Result<()> {
        self.update_receipt_insights(user_id, receipt_id, insights, analyzed_at)
    }

    fn get_preferences(&self, user_id: &str) -> Result<Option<Preferences>> {
        self.find_preferences(user_id)
    }

    fn put_preferences(&self, preferences: &Preferences) -> Result<()> {
        self.upsert_preferences(preferences)
    }

    fn get_profile(&self, user_id: &str) -> Result<Option<UserProfile>> {
        self.find_profile(user_id)
    }

    fn put_profile(&self, profile: &UserProfile) -> Result<()> {
        self.upsert_profile(profile)
    }

    fn add_spent(&self, user_id: &str, amount: Decimal) -> Result<Decimal> {
        self.increment_spent(user_id, amount)
    }

    fn put_meal_plan(&self, plan: &StoredMealPlan) -> Result<()> {
        self.upsert_meal_plan(plan)
    }

    fn get_meal_plan(&self, user_id: &str, plan_date: NaiveDate) -> Result<Option<StoredMealPlan>> {
        self.find_meal_plan(user_id, plan_date)
    }

    fn recent_meal_plans(&self, user_id: &str, limit: usize) -> Result<Vec<StoredMealPlan>> {
        self.list_meal_plans(user_id, limit)
    }

    fn log_audit(
        &self,
        user_id: &str,
        action: &str,
        entity_type: Option<&str>,
        entity_id: Option<&str>,
        details: Option<&str>,
    ) -> Result<i64> {
        self.insert_audit(user_id, action, entity_type, entity_id, details)
    }
}
