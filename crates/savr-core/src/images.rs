//! Meal image lookup
//!
//! # Configuration
//!
//! Environment variables:
//! - `PEXELS_API_KEY`: Pexels API key (optional; without it every meal gets
//!   its meal-type default image)

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::plan::MealType;

const PEXELS_HOST: &str = "https://api.pexels.com";

const BREAKFAST_IMAGE: &str =
    "https://images.pexels.com/photos/376464/pexels-photo-376464.jpeg?auto=compress&cs=tinysrgb&w=800";
const LUNCH_IMAGE: &str =
    "https://images.pexels.com/photos/1640777/pexels-photo-1640777.jpeg?auto=compress&cs=tinysrgb&w=800";
const DINNER_IMAGE: &str =
    "https://images.pexels.com/photos/262959/pexels-photo-262959.jpeg?auto=compress&cs=tinysrgb&w=800";

/// Fixed image for a meal type; snacks share the lunch image
pub fn default_image_url(meal_type: MealType) -> &'static str {
    match meal_type {
        MealType::Breakfast => BREAKFAST_IMAGE,
        MealType::Dinner => DINNER_IMAGE,
        MealType::Lunch | MealType::Snack => LUNCH_IMAGE,
    }
}

/// Name-based image search
#[async_trait]
pub trait ImageSearch: Send + Sync {
    /// Find one image for a meal name; `None` when nothing matched
    async fn find_image(&self, meal_name: &str) -> Result<Option<String>>;

    /// Whether lookups can return anything at all
    fn is_enabled(&self) -> bool {
        true
    }
}

/// Image search that never finds anything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoImageSearch;

#[async_trait]
impl ImageSearch for NoImageSearch {
    async fn find_image(&self, _meal_name: &str) -> Result<Option<String>> {
        Ok(None)
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    photos: Vec<Photo>,
}

#[derive(Debug, Deserialize)]
struct Photo {
    src: PhotoSources,
}

#[derive(Debug, Deserialize)]
struct PhotoSources {
    large: Option<String>,
}

/// Pexels photo search client
#[derive(Clone)]
pub struct PexelsClient {
    http_client: Client,
    base_url: String,
    api_key: String,
}

impl PexelsClient {
    /// Create a client with a per-request timeout
    pub fn new(api_key: &str, timeout: Duration) -> Result<Self> {
        Self::with_base_url(PEXELS_HOST, api_key, timeout)
    }

    /// Create a client against a different host (tests, proxies)
    pub fn with_base_url(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// Create from `PEXELS_API_KEY`; `None` when the key is unset or empty
    pub fn from_env(timeout: Duration) -> Option<Self> {
        let key = std::env::var("PEXELS_API_KEY").ok()?;
        if key.trim().is_empty() {
            return None;
        }
        Self::new(&key, timeout).ok()
    }
}

#[async_trait]
impl ImageSearch for PexelsClient {
    async fn find_image(&self, meal_name: &str) -> Result<Option<String>> {
        let query = format!("{} food", meal_name);
        debug!(query = %query, "Searching meal image");

        let response = self
            .http_client
            .get(format!("{}/v1/search", self.base_url))
            .query(&[("query", query.as_str()), ("per_page", "1")])
            .header("Authorization", &self.api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::Upstream(format!(
                "Image search returned {}",
                response.status()
            )));
        }

        let body: SearchResponse = response.json().await?;
        Ok(body
            .photos
            .into_iter()
            .next()
            .and_then(|photo| photo.src.large))
    }
}
