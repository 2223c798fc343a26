//! Savr Web Server
//!
//! Axum-based REST API over the savr-core pipeline.
//!
//! - Restrictive CORS policy and security headers
//! - Input validation with `{success: false, error, details}` bodies
//! - Audit logging for every API call (best-effort)
//! - Status codes: 400 for missing or malformed input, 500 only for
//!   configuration faults and failed explicit saves

use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;
use tower_http::{
    cors::CorsLayer, services::ServeDir, set_header::SetResponseHeaderLayer, trace::TraceLayer,
};
use tracing::{error, info, warn};

use savr_core::{AIBackend, Pipeline};

mod handlers;

/// Maximum page size for list endpoints
pub const MAX_PAGE_LIMIT: usize = 100;

/// Default page size for list endpoints
pub const DEFAULT_PAGE_LIMIT: usize = 10;

/// Server configuration
#[derive(Clone, Default)]
pub struct ServerConfig {
    /// Allowed CORS origins (empty = same-origin only)
    pub allowed_origins: Vec<String>,
}

impl ServerConfig {
    /// Create config from environment variables
    ///
    /// - `SAVR_CORS_ORIGINS`: Comma-separated list of allowed origins
    pub fn from_env() -> Self {
        let allowed_origins = std::env::var("SAVR_CORS_ORIGINS")
            .map(|s| s.split(',').map(|o| o.trim().to_string()).collect())
            .unwrap_or_default();

        Self { allowed_origins }
    }
}

/// Shared application state
pub struct AppState {
    pub pipeline: Pipeline,
    pub config: ServerConfig,
}

/// Build the router (useful for testing)
pub fn create_router(pipeline: Pipeline, static_dir: Option<&str>, config: ServerConfig) -> Router {
    let cors = build_cors(&config);
    let state = Arc::new(AppState { pipeline, config });

    let api_routes = Router::new()
        .route("/health", get(handlers::health))
        // Receipts
        .route("/receipts", get(handlers::list_receipts))
        .route("/receipts/process", post(handlers::process_receipt))
        .route("/receipts/analyze", post(handlers::analyze_receipt))
        // Meal plans
        .route("/meal-plans", get(handlers::get_meal_plans))
        .route("/meal-plans/generate", post(handlers::generate_meal_plan))
        // Preferences and profile
        .route(
            "/preferences",
            get(handlers::get_preferences).post(handlers::save_preferences),
        )
        .route(
            "/profile",
            get(handlers::get_profile).post(handlers::save_profile),
        );

    let mut app = Router::new()
        .nest("/api", api_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // Security headers
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::CONTENT_SECURITY_POLICY,
            HeaderValue::from_static(
                "default-src 'self'; img-src 'self' https://images.pexels.com data:; frame-ancestors 'none'",
            ),
        ));

    if let Some(dir) = static_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }

    app
}

fn build_cors(config: &ServerConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    if config.allowed_origins.is_empty() {
        // Same-origin only
        cors
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        cors.allow_origin(origins)
    }
}

/// Start the server
pub async fn serve(
    pipeline: Pipeline,
    host: &str,
    port: u16,
    static_dir: Option<&str>,
    config: ServerConfig,
) -> anyhow::Result<()> {
    check_collaborators(&pipeline).await;

    let app = create_router(pipeline, static_dir, config);
    let addr = format!("{}:{}", host, port);

    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Log which external collaborators are wired up
async fn check_collaborators(pipeline: &Pipeline) {
    match pipeline.ai() {
        Some(client) if client.health_check().await => {
            info!(backend = client.backend_name(), host = client.host(), model = client.model(), "AI backend connected");
        }
        Some(client) => {
            warn!(backend = client.backend_name(), host = client.host(), "AI backend configured but not responding; fallbacks will be used");
        }
        None => {
            info!("AI backend not configured (set AI_BACKEND / OLLAMA_HOST); fallbacks will be used");
        }
    }

    let health = pipeline.health().await;
    match health.ocr {
        Some(engine) => info!(engine = %engine, "OCR engine configured"),
        None => warn!("No OCR engine configured; /api/receipts/process will fail"),
    }
    if !health.image_search {
        info!("Image search disabled (set PEXELS_API_KEY); meals use default images");
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Application error type with proper HTTP status codes
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    details: Option<String>,
    internal: Option<anyhow::Error>,
}

impl AppError {
    pub fn bad_request(msg: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.to_string(),
            details: None,
            internal: None,
        }
    }

    pub fn internal(msg: &str) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.to_string(),
            details: None,
            internal: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Map a core error: input errors are 400, everything else is 500
    pub fn from_core(err: savr_core::Error) -> Self {
        if err.is_input_error() {
            return Self::bad_request(&err.to_string());
        }
        if err.is_configuration_fault() {
            return Self::internal("Service is not configured").with_details(err.to_string());
        }
        Self::from(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Some(err) = &self.internal {
            error!(error = %err, "Internal error");
        }

        let mut body = serde_json::json!({
            "success": false,
            "error": self.message,
        });
        if let Some(details) = self.details {
            body["details"] = Value::String(details);
        }

        (self.status, Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        let err = err.into();
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            // Return generic message to client
            message: "An internal error occurred".to_string(),
            details: None,
            // Keep full error for logging
            internal: Some(err),
        }
    }
}
