//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Savr - Turn grocery receipts into insights and meal plans
#[derive(Parser)]
#[command(name = "savr")]
#[command(about = "Self-hosted grocery receipt analyzer and meal planner", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "savr.db", global = true)]
    pub db: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable database encryption (not recommended for production)
    ///
    /// By default, the database is encrypted using SQLCipher.
    /// Set SAVR_DB_KEY environment variable with your passphrase.
    /// Use --no-encrypt only for development or testing.
    #[arg(long, global = true)]
    pub no_encrypt: bool,

    /// Config file (defaults to the user override, then built-in defaults)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Start the web server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Directory of static UI files to serve
        #[arg(long)]
        static_dir: Option<PathBuf>,
    },

    /// Extract line items from a saved expense analysis JSON file
    Extract {
        /// Expense analysis JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Storage key the result belongs to; prints the receipt record it would produce
        #[arg(short, long)]
        key: Option<String>,

        /// Print items as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run OCR on a stored receipt image and save its items
    Process {
        /// Storage key (receipts/{user}/{file})
        #[arg(short, long)]
        key: String,
    },

    /// Generate insights for a receipt or a list of items
    Analyze {
        /// User ID (derived from --key when omitted)
        #[arg(short, long)]
        user: Option<String>,

        /// Storage key of a processed receipt
        #[arg(short, long)]
        key: Option<String>,

        /// Item as NAME:PRICE[:QUANTITY] (repeatable)
        #[arg(short, long = "item")]
        items: Vec<String>,

        /// Budget for this analysis
        #[arg(long)]
        budget: Option<String>,

        /// Print insights as JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate a weekly meal plan
    Plan {
        /// User ID
        #[arg(short, long)]
        user: Option<String>,

        /// Ingredients on hand (comma-separated; defaults to grocery history)
        #[arg(long, value_delimiter = ',')]
        pantry: Vec<String>,

        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },

    /// List saved meal plans
    Plans {
        /// User ID
        #[arg(short, long)]
        user: Option<String>,

        /// Show the plan for one date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,

        /// Number of plans to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// List recent receipts
    Receipts {
        /// User ID
        #[arg(short, long)]
        user: Option<String>,

        /// Number of receipts to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Show or update preferences
    Prefs {
        #[command(subcommand)]
        action: Option<PrefsAction>,
    },

    /// Show the audit log
    Audit {
        /// Number of entries to show
        #[arg(short, long, default_value = "20")]
        limit: i64,
    },

    /// Manage AI prompts
    Prompts {
        #[command(subcommand)]
        action: Option<PromptsAction>,
    },
}

#[derive(Subcommand)]
pub enum PrefsAction {
    /// Show resolved preferences
    Show {
        /// User ID
        #[arg(short, long)]
        user: Option<String>,
    },

    /// Merge values into stored preferences
    Set {
        /// User ID
        #[arg(short, long)]
        user: Option<String>,

        /// Weekly grocery budget
        #[arg(long)]
        budget: Option<String>,

        /// Dietary restrictions (free text)
        #[arg(long)]
        restrictions: Option<String>,

        /// Nutrition goal (e.g. maintenance, weight_loss)
        #[arg(long)]
        goal: Option<String>,

        /// Daily calorie target
        #[arg(long)]
        calories: Option<u32>,

        /// Daily protein target (g)
        #[arg(long)]
        protein: Option<u32>,

        /// Daily carbohydrate target (g)
        #[arg(long)]
        carbs: Option<u32>,

        /// Daily fat target (g)
        #[arg(long)]
        fat: Option<u32>,
    },
}

#[derive(Subcommand)]
pub enum PromptsAction {
    /// List all available prompts and their override status
    List,

    /// Show the content of a specific prompt
    Show {
        /// Prompt ID (analyze_receipt, generate_meal_plan)
        prompt_id: String,
    },

    /// Show the path where prompt overrides should be placed
    Path,
}
