//! Pipeline configuration
//!
//! Config is loaded with a two-layer resolution:
//! 1. Explicit path, or the override in data dir (~/.local/share/savr/config/savr.toml)
//! 2. Fall back to embedded defaults (compiled into binary)
//!
//! Keys missing from an override keep their embedded defaults.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::ai::parsing::JsonExtraction;
use crate::ai::GenerationOptions;
use crate::error::{Error, Result};

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../config/savr.toml");

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryConfig {
    /// Most recent receipts read for grocery history
    pub receipt_limit: usize,
    /// Cap on items gathered across those receipts
    pub item_limit: usize,
    /// Grocery names embedded in the meal plan prompt
    pub prompt_item_limit: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SavrConfig {
    pub analysis: GenerationOptions,
    pub meal_plan: GenerationOptions,
    pub history: HistoryConfig,
    pub image_timeout: Duration,
    pub json_extraction: JsonExtraction,
}

impl Default for SavrConfig {
    fn default() -> Self {
        Self {
            analysis: GenerationOptions::new(3000, 0.5),
            meal_plan: GenerationOptions::new(4000, 0.7),
            history: HistoryConfig {
                receipt_limit: 10,
                item_limit: 50,
                prompt_item_limit: 20,
            },
            image_timeout: Duration::from_secs(5),
            json_extraction: JsonExtraction::Outermost,
        }
    }
}

impl SavrConfig {
    /// Load from the default override location, else the embedded defaults
    pub fn load() -> Result<Self> {
        match default_config_path().filter(|p| p.exists()) {
            Some(path) => Self::from_file(&path),
            None => parse_config(DEFAULT_CONFIG),
        }
    }

    /// Load from an explicit file, which must exist
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        parse_config(&content)
    }

    /// Embedded defaults only
    pub fn embedded() -> Result<Self> {
        parse_config(DEFAULT_CONFIG)
    }
}

/// Default config override path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("savr").join("config").join("savr.toml"))
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    analysis: Option<RawGeneration>,
    meal_plan: Option<RawGeneration>,
    history: Option<RawHistory>,
    images: Option<RawImages>,
    parsing: Option<RawParsing>,
}

#[derive(Debug, Deserialize)]
struct RawGeneration {
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawHistory {
    receipt_limit: Option<usize>,
    item_limit: Option<usize>,
    prompt_item_limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct RawImages {
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawParsing {
    json_extraction: Option<String>,
}

fn apply_generation(target: &mut GenerationOptions, raw: Option<RawGeneration>) -> Result<()> {
    let Some(raw) = raw else {
        return Ok(());
    };
    if let Some(max_tokens) = raw.max_tokens {
        if max_tokens == 0 {
            return Err(Error::Config("max_tokens must be positive".into()));
        }
        target.max_tokens = max_tokens;
    }
    if let Some(temperature) = raw.temperature {
        if !(0.0..=2.0).contains(&temperature) {
            return Err(Error::Config(format!(
                "temperature {} out of range 0.0-2.0",
                temperature
            )));
        }
        target.temperature = temperature;
    }
    if let Some(secs) = raw.timeout_secs {
        target.timeout = Duration::from_secs(secs.max(1));
    }
    Ok(())
}

fn parse_config(content: &str) -> Result<SavrConfig> {
    let raw: RawConfig = toml::from_str(content)
        .map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))?;

    let mut config = SavrConfig::default();
    apply_generation(&mut config.analysis, raw.analysis)?;
    apply_generation(&mut config.meal_plan, raw.meal_plan)?;

    if let Some(history) = raw.history {
        if let Some(n) = history.receipt_limit {
            config.history.receipt_limit = n;
        }
        if let Some(n) = history.item_limit {
            config.history.item_limit = n;
        }
        if let Some(n) = history.prompt_item_limit {
            config.history.prompt_item_limit = n;
        }
    }

    if let Some(secs) = raw.images.and_then(|i| i.timeout_secs) {
        config.image_timeout = Duration::from_secs(secs.max(1));
    }

    if let Some(mode) = raw.parsing.and_then(|p| p.json_extraction) {
        config.json_extraction = mode.parse().map_err(Error::Config)?;
    }

    Ok(config)
}
