//! Prompt library commands

use std::collections::BTreeSet;

use anyhow::{anyhow, Result};
use savr_core::prompts::{default_prompts_dir, PromptId, PromptLibrary};

/// `{{name}}` placeholders in a prompt body, sorted and deduplicated
pub fn template_variables(content: &str) -> Vec<String> {
    let mut found = BTreeSet::new();
    let mut rest = content;
    while let Some(start) = rest.find("{{") {
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let name = after[..end].trim();
                if !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_') {
                    found.insert(name.to_string());
                }
                rest = &after[end + 2..];
            }
            None => break,
        }
    }
    found.into_iter().collect()
}

fn overrides_location() -> String {
    default_prompts_dir()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(no data directory on this system)".to_string())
}

/// List the analysis and meal plan prompts with their source
pub fn cmd_prompts_list() -> Result<()> {
    let mut library = PromptLibrary::new();

    println!("📝 Prompts\n");
    for info in library.list() {
        let source = match &info.override_path {
            Some(path) if info.has_override => format!("override ({})", path.display()),
            _ => "built-in".to_string(),
        };
        println!("   {} v{}  [{}]", info.id, info.version, source);
        if !info.description.is_empty() {
            println!("      {}", info.description);
        }
    }

    println!();
    println!("Overrides are read from {}", overrides_location());
    println!("Copy a prompt there as <id>.md and keep the variables it uses.");

    Ok(())
}

/// Print one prompt with its template variables
pub fn cmd_prompts_show(prompt_id: &str) -> Result<()> {
    let id: PromptId = prompt_id.parse().map_err(|_| {
        let known: Vec<&str> = PromptId::all().iter().map(PromptId::as_str).collect();
        anyhow!(
            "Unknown prompt ID: {} (available: {})",
            prompt_id,
            known.join(", ")
        )
    })?;

    let mut library = PromptLibrary::new();
    let prompt = library.get(id)?;

    println!("{} v{}", prompt.metadata.id, prompt.metadata.version);
    match &prompt.override_path {
        Some(path) if prompt.is_override => println!("Source: {}", path.display()),
        _ => println!("Source: built-in"),
    }
    println!(
        "Variables: {}",
        template_variables(&prompt.content).join(", ")
    );
    println!();
    println!("{}", prompt.content);

    Ok(())
}

/// Print the override directory
pub fn cmd_prompts_path() -> Result<()> {
    let Some(path) = default_prompts_dir() else {
        eprintln!("Could not determine prompts directory.");
        return Ok(());
    };

    println!("{}", path.display());
    if !path.exists() {
        eprintln!("(does not exist yet; create it to add overrides)");
    }
    Ok(())
}
