//! Prompt library and prompt builders
//!
//! Prompts are loaded with a two-layer resolution:
//! 1. Check for override in data dir (~/.local/share/savr/prompts/overrides/)
//! 2. Fall back to embedded defaults (compiled into binary)
//!
//! Builders are pure: the same items and preferences always render the same
//! prompt text.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::models::{LineItem, Preferences};

/// Embedded default prompts (compiled into binary)
mod defaults {
    pub const ANALYZE_RECEIPT: &str = include_str!("../../../prompts/analyze_receipt.md");
    pub const GENERATE_MEAL_PLAN: &str = include_str!("../../../prompts/generate_meal_plan.md");
}

/// Known prompt IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptId {
    AnalyzeReceipt,
    GenerateMealPlan,
}

impl PromptId {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AnalyzeReceipt => "analyze_receipt",
            Self::GenerateMealPlan => "generate_meal_plan",
        }
    }

    pub fn all() -> &'static [PromptId] {
        &[Self::AnalyzeReceipt, Self::GenerateMealPlan]
    }

    fn default_content(&self) -> &'static str {
        match self {
            Self::AnalyzeReceipt => defaults::ANALYZE_RECEIPT,
            Self::GenerateMealPlan => defaults::GENERATE_MEAL_PLAN,
        }
    }
}

impl std::str::FromStr for PromptId {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| format!("Unknown prompt: {}", s))
    }
}

/// Prompt frontmatter metadata
#[derive(Debug, Clone, Deserialize)]
pub struct PromptMetadata {
    pub id: String,
    pub version: u32,
    #[serde(default)]
    pub description: String,
}

/// A loaded prompt with metadata and content
#[derive(Debug, Clone)]
pub struct Prompt {
    pub metadata: PromptMetadata,
    /// The prompt body (system + user sections)
    pub content: String,
    pub is_override: bool,
    pub override_path: Option<PathBuf>,
}

/// Prompt text ready to send: an optional system part and the user message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPrompt {
    pub system: Option<String>,
    pub user: String,
}

impl RenderedPrompt {
    /// System and user parts joined, for single-prompt backends
    pub fn combined(&self) -> String {
        match &self.system {
            Some(system) => format!("{}\n\n{}", system, self.user),
            None => self.user.clone(),
        }
    }
}

impl Prompt {
    pub fn system_section(&self) -> Option<&str> {
        extract_section(&self.content, "# System")
    }

    pub fn user_section(&self) -> Option<&str> {
        extract_section(&self.content, "# User")
    }

    /// Render the whole body with template variables replaced
    pub fn render(&self, vars: &HashMap<&str, &str>) -> String {
        substitute(&self.content, vars)
    }

    /// Render system and user sections separately
    ///
    /// A prompt without a `# User` section is sent whole as the user message.
    pub fn render_parts(&self, vars: &HashMap<&str, &str>) -> RenderedPrompt {
        match self.user_section() {
            Some(user) => RenderedPrompt {
                system: self
                    .system_section()
                    .map(|s| substitute(s, vars))
                    .filter(|s| !s.is_empty()),
                user: substitute(user, vars),
            },
            None => RenderedPrompt {
                system: None,
                user: self.render(vars),
            },
        }
    }
}

fn substitute(template: &str, vars: &HashMap<&str, &str>) -> String {
    let mut result = template.to_string();
    for (key, value) in vars {
        let pattern = format!("{{{{{}}}}}", key);
        result = result.replace(&pattern, value);
    }
    remove_unmatched_conditionals(&result, vars)
}

/// Prompt library for loading and caching prompts
pub struct PromptLibrary {
    override_dir: Option<PathBuf>,
    cache: HashMap<PromptId, Prompt>,
}

impl PromptLibrary {
    /// Create a prompt library with the default override directory
    pub fn new() -> Self {
        Self {
            override_dir: default_prompts_dir(),
            cache: HashMap::new(),
        }
    }

    pub fn with_override_dir(path: PathBuf) -> Self {
        Self {
            override_dir: Some(path),
            cache: HashMap::new(),
        }
    }

    /// Create a prompt library with no override directory (embedded only)
    pub fn embedded_only() -> Self {
        Self {
            override_dir: None,
            cache: HashMap::new(),
        }
    }

    /// Get a prompt by ID, loading from override or default
    pub fn get(&mut self, id: PromptId) -> Result<&Prompt> {
        if !self.cache.contains_key(&id) {
            let prompt = self.load(id)?;
            self.cache.insert(id, prompt);
        }
        self.cache
            .get(&id)
            .ok_or_else(|| Error::NotFound(format!("prompt {}", id.as_str())))
    }

    fn load(&self, id: PromptId) -> Result<Prompt> {
        if let Some(path) = self.override_path(id).filter(|p| p.exists()) {
            let content = fs::read_to_string(&path).map_err(|e| {
                Error::InvalidData(format!("Failed to read prompt override: {}", e))
            })?;
            let (metadata, body) = parse_prompt(&content)?;
            return Ok(Prompt {
                metadata,
                content: body,
                is_override: true,
                override_path: Some(path),
            });
        }

        let (metadata, body) = parse_prompt(id.default_content())?;
        Ok(Prompt {
            metadata,
            content: body,
            is_override: false,
            override_path: None,
        })
    }

    fn override_path(&self, id: PromptId) -> Option<PathBuf> {
        self.override_dir
            .as_ref()
            .map(|d| d.join(format!("{}.md", id.as_str())))
    }

    /// List all prompts with their override status
    pub fn list(&mut self) -> Vec<PromptInfo> {
        PromptId::all()
            .iter()
            .map(|&id| {
                let override_path = self.override_path(id).filter(|p| p.exists());
                let prompt = self.get(id).ok();
                PromptInfo {
                    id: id.as_str().to_string(),
                    version: prompt.map(|p| p.metadata.version).unwrap_or(0),
                    description: prompt
                        .map(|p| p.metadata.description.clone())
                        .unwrap_or_default(),
                    has_override: override_path.is_some(),
                    override_path,
                }
            })
            .collect()
    }

    pub fn override_dir(&self) -> Option<&PathBuf> {
        self.override_dir.as_ref()
    }

    /// Clear the cache (useful after editing override files)
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }
}

impl Default for PromptLibrary {
    fn default() -> Self {
        Self::new()
    }
}

/// Information about a prompt for listing
#[derive(Debug, Clone)]
pub struct PromptInfo {
    pub id: String,
    pub version: u32,
    pub description: String,
    pub has_override: bool,
    pub override_path: Option<PathBuf>,
}

/// Default prompts override directory
pub fn default_prompts_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("savr").join("prompts").join("overrides"))
}

/// Parse a prompt file into metadata and body
fn parse_prompt(content: &str) -> Result<(PromptMetadata, String)> {
    let content = content.trim();

    if !content.starts_with("---") {
        return Err(Error::InvalidData(
            "Prompt must start with YAML frontmatter (---)".into(),
        ));
    }

    let rest = &content[3..];
    let end = rest.find("---").ok_or_else(|| {
        Error::InvalidData("Prompt frontmatter not closed (missing second ---)".into())
    })?;

    let frontmatter = rest[..end].trim();
    let body = rest[end + 3..].trim();

    let metadata: PromptMetadata = serde_yaml::from_str(frontmatter)
        .map_err(|e| Error::InvalidData(format!("Invalid prompt frontmatter: {}", e)))?;

    Ok((metadata, body.to_string()))
}

/// Text between `header` and the next top-level header
fn extract_section<'a>(content: &'a str, header: &str) -> Option<&'a str> {
    let start = content.find(header)?;
    let after_header = &content[start + header.len()..];
    let end = after_header.find("\n# ").unwrap_or(after_header.len());
    Some(after_header[..end].trim())
}

/// Keep `{{#if var}}...{{/if}}` blocks whose variable is non-empty, drop the rest
fn remove_unmatched_conditionals(content: &str, vars: &HashMap<&str, &str>) -> String {
    let mut result = content.to_string();

    while let Some(if_start) = result.find("{{#if ") {
        let var_start = if_start + 6;
        let Some(var_end) = result[var_start..].find("}}") else {
            break;
        };
        let var_name = &result[var_start..var_start + var_end];
        let block_start = var_start + var_end + 2;
        let Some(endif_pos) = result[block_start..].find("{{/if}}") else {
            break;
        };
        let block_content = &result[block_start..block_start + endif_pos];
        let full_end = block_start + endif_pos + 7;

        let keep = vars.get(var_name).is_some_and(|v| !v.is_empty());
        result = if keep {
            format!("{}{}{}", &result[..if_start], block_content, &result[full_end..])
        } else {
            format!("{}{}", &result[..if_start], &result[full_end..])
        };
    }

    result
}

/// `- Milk: $3.50 (Qty: 1)` per item, or a placeholder for an empty list
pub fn format_item_list(items: &[LineItem]) -> String {
    if items.is_empty() {
        return "No items found".to_string();
    }
    items
        .iter()
        .map(|item| format!("- {}: ${:.2} (Qty: {})", item.name, item.price, item.quantity))
        .collect::<Vec<_>>()
        .join("\n")
}

/// `- name` per grocery, capped at `limit`, or a placeholder when there are none
pub fn format_grocery_list(names: &[String], limit: usize) -> String {
    let lines: Vec<String> = names
        .iter()
        .map(|n| n.trim())
        .filter(|n| !n.is_empty())
        .take(limit)
        .map(|n| format!("- {}", n))
        .collect();
    if lines.is_empty() {
        "No recent grocery data available".to_string()
    } else {
        lines.join("\n")
    }
}

/// Shopper context carried into a receipt analysis prompt
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisContext {
    pub budget: Option<Decimal>,
    pub dietary_restrictions: Option<String>,
}

/// Render the receipt analysis prompt
pub fn build_analysis_prompt(
    library: &mut PromptLibrary,
    items: &[LineItem],
    context: &AnalysisContext,
) -> Result<RenderedPrompt> {
    let item_list = format_item_list(items);
    let budget = context
        .budget
        .map(|b| format!("${}", b.normalize()))
        .unwrap_or_else(|| "Not specified".to_string());
    let restrictions = context
        .dietary_restrictions
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("None");

    let mut vars = HashMap::new();
    vars.insert("items", item_list.as_str());
    vars.insert("budget", budget.as_str());
    vars.insert("dietary_restrictions", restrictions);

    Ok(library.get(PromptId::AnalyzeReceipt)?.render_parts(&vars))
}

/// Render the meal plan prompt from resolved preferences and grocery names
pub fn build_meal_plan_prompt(
    library: &mut PromptLibrary,
    preferences: &Preferences,
    grocery_names: &[String],
    grocery_limit: usize,
) -> Result<RenderedPrompt> {
    let budget = preferences.budget.normalize().to_string();
    let restrictions = if preferences.dietary_restrictions.trim().is_empty() {
        "None specified"
    } else {
        preferences.dietary_restrictions.trim()
    };
    let caloric = preferences.caloric_target.to_string();
    let protein = preferences.protein_target.to_string();
    let carbs = preferences.carb_target.to_string();
    let fat = preferences.fat_target.to_string();
    let groceries = format_grocery_list(grocery_names, grocery_limit);

    let mut vars = HashMap::new();
    vars.insert("budget", budget.as_str());
    vars.insert("dietary_restrictions", restrictions);
    vars.insert("nutrition_goal", preferences.nutrition_goal.as_str());
    vars.insert("caloric_target", caloric.as_str());
    vars.insert("protein_target", protein.as_str());
    vars.insert("carb_target", carbs.as_str());
    vars.insert("fat_target", fat.as_str());
    vars.insert("groceries", groceries.as_str());

    Ok(library.get(PromptId::GenerateMealPlan)?.render_parts(&vars))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preferences::PreferenceResolver;
    use tempfile::TempDir;

    #[test]
    fn test_parse_prompt() {
        let content = r#"---
id: test_prompt
version: 2
description: Test
---

# System

Be brief.

# User

Hello {{name}}
"#;
        let (metadata, body) = parse_prompt(content).unwrap();
        assert_eq!(metadata.id, "test_prompt");
        assert_eq!(metadata.version, 2);
        assert!(body.starts_with("# System"));
        assert_eq!(extract_section(&body, "# System"), Some("Be brief."));
        assert_eq!(extract_section(&body, "# User"), Some("Hello {{name}}"));
    }

    #[test]
    fn test_parse_prompt_requires_frontmatter() {
        assert!(parse_prompt("# User\nhi").is_err());
        assert!(parse_prompt("---\nid: x\n").is_err());
    }

    #[test]
    fn test_conditionals() {
        let mut vars = HashMap::new();
        vars.insert("a", "yes");
        vars.insert("b", "");
        let out = remove_unmatched_conditionals("x{{#if a}}A{{/if}}y{{#if b}}B{{/if}}z", &vars);
        assert_eq!(out, "xAyz");
    }

    #[test]
    fn test_all_defaults_parse() {
        let mut library = PromptLibrary::embedded_only();
        for id in PromptId::all() {
            let prompt = library.get(*id).unwrap();
            assert_eq!(prompt.metadata.id, id.as_str());
            assert!(prompt.system_section().is_some());
            assert!(prompt.user_section().is_some());
        }
    }

    #[test]
    fn test_override_dir_wins() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("analyze_receipt.md"),
            "---\nid: analyze_receipt\nversion: 9\n---\n\n# User\n\nCustom {{items}}\n",
        )
        .unwrap();

        let mut library = PromptLibrary::with_override_dir(dir.path().to_path_buf());
        let prompt = build_analysis_prompt(
            &mut library,
            &[LineItem::new("Milk", Decimal::new(350, 2), 1)],
            &AnalysisContext::default(),
        )
        .unwrap();
        assert_eq!(prompt.system, None);
        assert_eq!(prompt.user, "Custom - Milk: $3.50 (Qty: 1)");

        let infos = library.list();
        let info = infos.iter().find(|i| i.id == "analyze_receipt").unwrap();
        assert!(info.has_override);
        assert_eq!(info.version, 9);
    }

    #[test]
    fn test_item_list_format() {
        let items = vec![
            LineItem::new("Bread", Decimal::new(25, 1), 2),
            LineItem::new("Apple", Decimal::ONE, 1),
        ];
        assert_eq!(
            format_item_list(&items),
            "- Bread: $2.50 (Qty: 2)\n- Apple: $1.00 (Qty: 1)"
        );
        assert_eq!(format_item_list(&[]), "No items found");
    }

    #[test]
    fn test_grocery_list_caps_at_limit() {
        let names: Vec<String> = (0..30).map(|i| format!("item{}", i)).collect();
        let list = format_grocery_list(&names, 20);
        assert_eq!(list.lines().count(), 20);
        assert!(list.ends_with("- item19"));
        assert_eq!(format_grocery_list(&[], 20), "No recent grocery data available");
    }

    #[test]
    fn test_analysis_prompt_is_deterministic() {
        let items = vec![LineItem::new("Milk", Decimal::new(350, 2), 1)];
        let context = AnalysisContext {
            budget: Some(Decimal::from(80)),
            dietary_restrictions: None,
        };
        let mut library = PromptLibrary::embedded_only();
        let first = build_analysis_prompt(&mut library, &items, &context).unwrap();
        let second = build_analysis_prompt(&mut library, &items, &context).unwrap();
        assert_eq!(first, second);
        assert!(first.user.contains("- Milk: $3.50 (Qty: 1)"));
        assert!(first.user.contains("Weekly budget: $80"));
        assert!(first.user.contains("allergies: None"));
        assert!(first.user.contains("\"nutritionalAssessment\""));
        assert!(!first.user.contains("{{"));
    }

    #[test]
    fn test_meal_plan_prompt() {
        let prefs = PreferenceResolver::defaults("u1");
        let mut library = PromptLibrary::embedded_only();
        let prompt = build_meal_plan_prompt(&mut library, &prefs, &[], 20).unwrap();
        assert!(prompt.user.contains("Weekly budget: $100"));
        assert!(prompt.user.contains("allergies: None specified"));
        assert!(prompt.user.contains("Daily calories: 2000 kcal"));
        assert!(prompt.user.contains("No recent grocery data available"));
        assert!(prompt.system.is_some());
    }
}
