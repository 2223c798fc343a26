//! Test utilities for savr-core
//!
//! Mock HTTP servers for the model and image search collaborators, plus
//! in-process `Store` implementations for pipeline tests.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Json, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::oneshot;

use crate::ai::{MOCK_INSIGHTS_RESPONSE, MOCK_MEAL_PLAN_RESPONSE};
use crate::error::{Error, Result};
use crate::insights::Insights;
use crate::models::{Preferences, ReceiptRecord, StoredMealPlan, UserProfile};
use crate::store::Store;

/// Image URL returned by `MockPexelsServer` for every hit
pub const MOCK_PHOTO_URL: &str = "https://images.example.test/photo-large.jpeg";

async fn spawn_server(app: Router) -> (SocketAddr, oneshot::Sender<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                shutdown_rx.await.ok();
            })
            .await
            .unwrap();
    });

    (addr, shutdown_tx)
}

#[derive(Clone)]
enum OllamaReply {
    Canned,
    Fixed(String),
    Fail,
}

#[derive(Debug, Deserialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
}

/// Mock Ollama server for testing and development
pub struct MockOllamaServer {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl MockOllamaServer {
    /// Canned replies: a meal plan when the prompt asks for `weeklyPlan`,
    /// receipt insights otherwise
    pub async fn start() -> Self {
        Self::start_with(OllamaReply::Canned).await
    }

    /// Always answer `/api/generate` with `text`
    pub async fn start_with_response(text: &str) -> Self {
        Self::start_with(OllamaReply::Fixed(text.to_string())).await
    }

    /// Healthy `/api/tags`, but every generation returns 500
    pub async fn start_failing() -> Self {
        Self::start_with(OllamaReply::Fail).await
    }

    async fn start_with(reply: OllamaReply) -> Self {
        let prompts = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .route("/api/tags", get(handle_tags))
            .route("/api/generate", post(handle_generate))
            .with_state((reply, prompts.clone()));

        let (addr, shutdown_tx) = spawn_server(app).await;
        Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
            prompts,
        }
    }

    /// Get the base URL for this mock server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// User prompts received so far
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockOllamaServer {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn handle_tags() -> Json<serde_json::Value> {
    Json(json!({
        "models": [{"name": "llama3.2:latest", "modified_at": "2025-01-01T00:00:00Z", "size": 2_000_000_000u64}]
    }))
}

async fn handle_generate(
    State((reply, prompts)): State<(OllamaReply, Arc<Mutex<Vec<String>>>)>,
    Json(request): Json<GenerateRequest>,
) -> Response {
    prompts.lock().unwrap().push(request.prompt.clone());

    let text = match reply {
        OllamaReply::Fail => {
            return (StatusCode::INTERNAL_SERVER_ERROR, "model crashed").into_response()
        }
        OllamaReply::Fixed(text) => text,
        OllamaReply::Canned if request.prompt.contains("weeklyPlan") => {
            MOCK_MEAL_PLAN_RESPONSE.to_string()
        }
        OllamaReply::Canned => MOCK_INSIGHTS_RESPONSE.to_string(),
    };

    Json(json!({"model": request.model, "response": text, "done": true})).into_response()
}

#[derive(Clone, Copy)]
enum PexelsReply {
    Photo,
    Empty,
    Fail,
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    query: String,
}

/// Mock Pexels search server
pub struct MockPexelsServer {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    queries: Arc<Mutex<Vec<String>>>,
}

impl MockPexelsServer {
    /// Every search finds `MOCK_PHOTO_URL`
    pub async fn start() -> Self {
        Self::start_with(PexelsReply::Photo).await
    }

    /// Every search succeeds with no photos
    pub async fn start_empty() -> Self {
        Self::start_with(PexelsReply::Empty).await
    }

    /// Every search returns 500
    pub async fn start_failing() -> Self {
        Self::start_with(PexelsReply::Fail).await
    }

    async fn start_with(reply: PexelsReply) -> Self {
        let queries = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .route("/v1/search", get(handle_search))
            .with_state((reply, queries.clone()));

        let (addr, shutdown_tx) = spawn_server(app).await;
        Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
            queries,
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Search queries received so far
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }

    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockPexelsServer {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn handle_search(
    State((reply, queries)): State<(PexelsReply, Arc<Mutex<Vec<String>>>)>,
    headers: HeaderMap,
    Query(query): Query<SearchQuery>,
) -> Response {
    if headers.get("authorization").is_none() {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    queries.lock().unwrap().push(query.query);

    match reply {
        PexelsReply::Photo => {
            Json(json!({"photos": [{"src": {"large": MOCK_PHOTO_URL}}]})).into_response()
        }
        PexelsReply::Empty => Json(json!({"photos": []})).into_response(),
        PexelsReply::Fail => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

/// In-process store backed by hash maps
#[derive(Default)]
pub struct MemoryStore {
    receipts: Mutex<HashMap<(String, String), ReceiptRecord>>,
    preferences: Mutex<HashMap<String, Preferences>>,
    profiles: Mutex<HashMap<String, UserProfile>>,
    meal_plans: Mutex<HashMap<(String, NaiveDate), StoredMealPlan>>,
    audit: Mutex<Vec<(String, String)>>,
    unreadable_preferences: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store whose preference reads fail while every write still lands
    pub fn with_unreadable_preferences() -> Self {
        Self {
            unreadable_preferences: true,
            ..Self::default()
        }
    }

    /// Stored preferences, bypassing any read fault
    pub fn stored_preferences(&self, user_id: &str) -> Option<Preferences> {
        self.preferences.lock().unwrap().get(user_id).cloned()
    }

    /// `(user_id, action)` pairs in insertion order
    pub fn audit_entries(&self) -> Vec<(String, String)> {
        self.audit.lock().unwrap().clone()
    }
}

impl Store for MemoryStore {
    fn put_receipt(&self, record: &ReceiptRecord) -> Result<()> {
        self.receipts.lock().unwrap().insert(
            (record.user_id.clone(), record.receipt_id.clone()),
            record.clone(),
        );
        Ok(())
    }

    fn get_receipt(&self, user_id: &str, receipt_id: &str) -> Result<Option<ReceiptRecord>> {
        Ok(self
            .receipts
            .lock()
            .unwrap()
            .get(&(user_id.to_string(), receipt_id.to_string()))
            .cloned())
    }

    fn recent_receipts(&self, user_id: &str, limit: usize) -> Result<Vec<ReceiptRecord>> {
        let mut records: Vec<ReceiptRecord> = self
            .receipts
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| {
            b.processed_at
                .cmp(&a.processed_at)
                .then_with(|| b.receipt_id.cmp(&a.receipt_id))
        });
        records.truncate(limit);
        Ok(records)
    }

    fn attach_insights(
        &self,
        user_id: &str,
        receipt_id: &str,
        insights: &Insights,
        analyzed_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut receipts = self.receipts.lock().unwrap();
        let record = receipts
            .get_mut(&(user_id.to_string(), receipt_id.to_string()))
            .ok_or_else(|| Error::NotFound(format!("receipt {} for user {}", receipt_id, user_id)))?;
        record.insights = Some(insights.clone());
        record.analyzed_at = Some(analyzed_at);
        Ok(())
    }

    fn get_preferences(&self, user_id: &str) -> Result<Option<Preferences>> {
        if self.unreadable_preferences {
            return unavailable();
        }
        Ok(self.stored_preferences(user_id))
    }

    fn put_preferences(&self, preferences: &Preferences) -> Result<()> {
        self.preferences
            .lock()
            .unwrap()
            .insert(preferences.user_id.clone(), preferences.clone());
        Ok(())
    }

    fn get_profile(&self, user_id: &str) -> Result<Option<UserProfile>> {
        Ok(self.profiles.lock().unwrap().get(user_id).cloned())
    }

    fn put_profile(&self, profile: &UserProfile) -> Result<()> {
        self.profiles
            .lock()
            .unwrap()
            .insert(profile.user_id.clone(), profile.clone());
        Ok(())
    }

    fn add_spent(&self, user_id: &str, amount: Decimal) -> Result<Decimal> {
        let mut profiles = self.profiles.lock().unwrap();
        let profile = profiles
            .entry(user_id.to_string())
            .or_insert_with(|| UserProfile::empty(user_id));
        profile.spent = profile.spent.saturating_add(amount);
        profile.last_updated = Some(Utc::now());
        Ok(profile.spent)
    }

    fn put_meal_plan(&self, plan: &StoredMealPlan) -> Result<()> {
        self.meal_plans
            .lock()
            .unwrap()
            .insert((plan.user_id.clone(), plan.plan_date), plan.clone());
        Ok(())
    }

    fn get_meal_plan(&self, user_id: &str, plan_date: NaiveDate) -> Result<Option<StoredMealPlan>> {
        Ok(self
            .meal_plans
            .lock()
            .unwrap()
            .get(&(user_id.to_string(), plan_date))
            .cloned())
    }

    fn recent_meal_plans(&self, user_id: &str, limit: usize) -> Result<Vec<StoredMealPlan>> {
        let mut plans: Vec<StoredMealPlan> = self
            .meal_plans
            .lock()
            .unwrap()
            .values()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        plans.sort_by(|a, b| b.plan_date.cmp(&a.plan_date));
        plans.truncate(limit);
        Ok(plans)
    }

    fn log_audit(
        &self,
        user_id: &str,
        action: &str,
        _entity_type: Option<&str>,
        _entity_id: Option<&str>,
        _details: Option<&str>,
    ) -> Result<i64> {
        let mut audit = self.audit.lock().unwrap();
        audit.push((user_id.to_string(), action.to_string()));
        Ok(audit.len() as i64)
    }
}

/// Store whose every operation fails, for fault injection
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingStore;

fn unavailable<T>() -> Result<T> {
    Err(Error::Io(std::io::Error::new(
        std::io::ErrorKind::ConnectionRefused,
        "store unavailable",
    )))
}

impl Store for FailingStore {
    fn put_receipt(&self, _record: &ReceiptRecord) -> Result<()> {
        unavailable()
    }

    fn get_receipt(&self, _user_id: &str, _receipt_id: &str) -> Result<Option<ReceiptRecord>> {
        unavailable()
    }

    fn recent_receipts(&self, _user_id: &str, _limit: usize) -> Result<Vec<ReceiptRecord>> {
        unavailable()
    }

    fn attach_insights(
        &self,
        _user_id: &str,
        _receipt_id: &str,
        _insights: &Insights,
        _analyzed_at: DateTime<Utc>,
    ) -> Result<()> {
        unavailable()
    }

    fn get_preferences(&self, _user_id: &str) -> Result<Option<Preferences>> {
        unavailable()
    }

    fn put_preferences(&self, _preferences: &Preferences) -> Result<()> {
        unavailable()
    }

    fn get_profile(&self, _user_id: &str) -> Result<Option<UserProfile>> {
        unavailable()
    }

    fn put_profile(&self, _profile: &UserProfile) -> Result<()> {
        unavailable()
    }

    fn add_spent(&self, _user_id: &str, _amount: Decimal) -> Result<Decimal> {
        unavailable()
    }

    fn put_meal_plan(&self, _plan: &StoredMealPlan) -> Result<()> {
        unavailable()
    }

    fn get_meal_plan(
        &self,
        _user_id: &str,
        _plan_date: NaiveDate,
    ) -> Result<Option<StoredMealPlan>> {
        unavailable()
    }

    fn recent_meal_plans(&self, _user_id: &str, _limit: usize) -> Result<Vec<StoredMealPlan>> {
        unavailable()
    }

    fn log_audit(
        &self,
        _user_id: &str,
        _action: &str,
        _entity_type: Option<&str>,
        _entity_id: Option<&str>,
        _details: Option<&str>,
    ) -> Result<i64> {
        unavailable()
    }
}
