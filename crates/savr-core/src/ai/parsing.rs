//! Response parsing for model output
//!
//! Models wrap their JSON in prose, code fences, or both. Parsing locates one
//! object span, decodes it strictly into a draft, and completes the draft
//! with the caller's own data. Any failure is an `Error::InvalidData` the
//! pipeline turns into its deterministic fallback.

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::insights::{assemble_insights, Insights, InsightsDraft};
use crate::models::LineItem;
use crate::plan::{assemble_plan, MealPlan, MealPlanDraft};

/// How a JSON object span is located in free-form text
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum JsonExtraction {
    /// First `{` through last `}`; over-captures when several objects appear
    #[default]
    Outermost,
    /// First `{` through the `}` that closes it, skipping braces inside strings
    Balanced,
}

impl JsonExtraction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Outermost => "outermost",
            Self::Balanced => "balanced",
        }
    }
}

impl std::str::FromStr for JsonExtraction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "outermost" => Ok(Self::Outermost),
            "balanced" => Ok(Self::Balanced),
            _ => Err(format!(
                "Unknown json_extraction mode '{}' (expected outermost or balanced)",
                s
            )),
        }
    }
}

fn balanced_span(text: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(start + i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Locate the JSON object candidate in model text
pub fn extract_json_object(text: &str, mode: JsonExtraction) -> Option<&str> {
    let start = text.find('{')?;
    let end = match mode {
        JsonExtraction::Outermost => text.rfind('}')?,
        JsonExtraction::Balanced => balanced_span(text, start)?,
    };
    if start < end {
        Some(&text[start..=end])
    } else {
        None
    }
}

fn decode<T: serde::de::DeserializeOwned>(text: &str, mode: JsonExtraction) -> Result<T> {
    let json = extract_json_object(text.trim(), mode)
        .ok_or_else(|| Error::InvalidData("No JSON object in model response".into()))?;
    serde_json::from_str(json)
        .map_err(|e| Error::InvalidData(format!("Failed to decode model JSON: {}", e)))
}

/// Parse receipt insights from model text
pub fn parse_insights_response(
    text: &str,
    items: &[LineItem],
    analyzed_at: DateTime<Utc>,
    mode: JsonExtraction,
) -> Result<Insights> {
    let draft: InsightsDraft = decode(text, mode)?;
    Ok(assemble_insights(draft, items, analyzed_at))
}

/// Parse a weekly meal plan from model text
pub fn parse_meal_plan_response(text: &str, mode: JsonExtraction) -> Result<MealPlan> {
    let draft: MealPlanDraft = decode(text, mode)?;
    Ok(assemble_plan(draft))
}
