//! AI backend request types
//!
//! These types are backend-agnostic and used across all AI implementations.

use std::time::Duration;

use serde::Serialize;

/// Default per-request timeout for model calls
pub const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(120);

/// Fixed sampling parameters for one kind of generation
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOptions {
    /// Upper bound on generated tokens
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
}

impl GenerationOptions {
    pub fn new(max_tokens: u32, temperature: f32) -> Self {
        Self {
            max_tokens,
            temperature,
            timeout: DEFAULT_GENERATION_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self::new(1024, 0.5)
    }
}

/// Backend description for health output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendInfo {
    pub backend: String,
    pub host: String,
    pub model: String,
}
