//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` - Shared utility to open the database
//! - `open_pipeline` - Database plus collaborators from the environment
//! - `cmd_init` - Initialize the database

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use savr_core::{Database, Pipeline, SavrConfig};

/// Open database with encryption by default, or unencrypted if --no-encrypt
pub fn open_db(db_path: &Path, no_encrypt: bool) -> Result<Database> {
    let path_str = db_path
        .to_str()
        .context("Database path must be valid UTF-8")?;
    if no_encrypt {
        Database::new_unencrypted(path_str).context("Failed to open database (unencrypted)")
    } else {
        Database::new(path_str).context("Failed to open database")
    }
}

/// Load config from an explicit file, or the override/embedded defaults
pub fn load_config(config_path: Option<&Path>) -> Result<SavrConfig> {
    match config_path {
        Some(path) => SavrConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => SavrConfig::load().context("Failed to load config"),
    }
}

/// Open the database and wire the model, OCR and image collaborators from the environment
pub fn open_pipeline(
    db_path: &Path,
    no_encrypt: bool,
    config_path: Option<&Path>,
) -> Result<Pipeline> {
    let db = open_db(db_path, no_encrypt)?;
    let config = load_config(config_path)?;
    Ok(Pipeline::from_env(Arc::new(db), config))
}

pub fn cmd_init(db_path: &Path, no_encrypt: bool) -> Result<()> {
    println!("🔧 Initializing database at {}...", db_path.display());

    open_db(db_path, no_encrypt)?;

    if no_encrypt {
        println!("   ⚠️  Encryption: DISABLED (--no-encrypt)");
    } else {
        println!("   🔒 Encryption: ENABLED");
    }

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Point SAVR_OCR_URL or SAVR_OCR_DIR at your OCR results");
    println!("  2. Set OLLAMA_HOST (or AI_BACKEND) for AI insights");
    println!("  3. Start web UI: savr serve");

    Ok(())
}
