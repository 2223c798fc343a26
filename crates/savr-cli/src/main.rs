//! Savr CLI - Grocery receipt insights and meal planning
//!
//! Usage:
//!   savr init                          Initialize database
//!   savr process --key receipts/u/r    OCR a stored receipt
//!   savr analyze --item Milk:3.50      Generate insights
//!   savr plan --user u                 Generate a weekly meal plan
//!   savr serve --port 3000             Start web server

mod cli;
mod commands;


use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let db = || commands::open_db(&cli.db, cli.no_encrypt);
    let pipeline = || commands::open_pipeline(&cli.db, cli.no_encrypt, cli.config.as_deref());

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db, cli.no_encrypt),
        Commands::Serve {
            port,
            ref host,
            ref static_dir,
        } => commands::cmd_serve(pipeline()?, host, port, static_dir.as_deref()).await,
        Commands::Extract {
            ref file,
            ref key,
            json,
        } => commands::cmd_extract(file, key.as_deref(), json),
        Commands::Process { ref key } => commands::cmd_process(&pipeline()?, key).await,
        Commands::Analyze {
            ref user,
            ref key,
            ref items,
            ref budget,
            json,
        } => {
            let request =
                commands::analyze_request(user.as_deref(), key.as_deref(), items, budget.as_deref())?;
            commands::cmd_analyze(&pipeline()?, request, json).await
        }
        Commands::Plan {
            ref user,
            ref pantry,
            json,
        } => commands::cmd_plan(&pipeline()?, user.as_deref(), pantry, json).await,
        Commands::Plans {
            ref user,
            ref date,
            limit,
        } => commands::cmd_plans(&pipeline()?, user.as_deref(), date.as_deref(), limit),
        Commands::Receipts { ref user, limit } => {
            commands::cmd_receipts(&pipeline()?, user.as_deref(), limit)
        }
        Commands::Prefs { ref action } => {
            let pipeline = pipeline()?;
            match action {
                None => commands::cmd_prefs_show(&pipeline, None),
                Some(PrefsAction::Show { user }) => {
                    commands::cmd_prefs_show(&pipeline, user.as_deref())
                }
                Some(PrefsAction::Set {
                    user,
                    budget,
                    restrictions,
                    goal,
                    calories,
                    protein,
                    carbs,
                    fat,
                }) => {
                    let overrides = commands::preference_overrides(
                        budget.as_deref(),
                        restrictions.clone(),
                        goal.clone(),
                        [*calories, *protein, *carbs, *fat],
                    )?;
                    commands::cmd_prefs_set(&pipeline, user.as_deref(), &overrides)
                }
            }
        }
        Commands::Audit { limit } => commands::cmd_audit(&db()?, limit),
        Commands::Prompts { ref action } => match action {
            None | Some(PromptsAction::List) => commands::cmd_prompts_list(),
            Some(PromptsAction::Show { prompt_id }) => commands::cmd_prompts_show(prompt_id),
            Some(PromptsAction::Path) => commands::cmd_prompts_path(),
        },
    }
}
