//! socialgate - sign in with Google, GitHub or VK
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Routes (Axum)                           │
//! │  - /, /profile              HTML pages                       │
//! │  - /auth/:provider[/callback], /logout[/:provider]           │
//! │  - /assets/*, /src/*        static files                     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Auth Gateway                             │
//! │  - CSRF state, code exchange, logout                         │
//! │  - Provider registry (Google, GitHub, VK, custom)            │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Session Store                            │
//! │  - HMAC-signed cookie, no server-side storage                │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `api`: page and metrics handlers
//! - `auth`: providers, gateway, sessions, login routes
//! - `view`: HTML rendering
//! - `config`: Configuration management
//! - `error`: Error types

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod metrics;
pub mod view;

use std::sync::Arc;
use std::time::Duration;

/// Application state shared across all handlers
///
/// Cloned for each request; everything inside is read-only after startup.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Cookie-backed session store
    pub sessions: Arc<auth::SessionStore>,

    /// Login/logout orchestration over the provider registry
    pub gateway: Arc<auth::AuthGateway>,
}

impl AppState {
    /// Initialize application state
    ///
    /// # Steps
    /// 1. Build the HTTP client used for provider calls
    /// 2. Register every configured provider
    /// 3. Create the session store and auth gateway
    ///
    /// # Errors
    /// Returns error if any provider is misconfigured
    pub fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        let timeout = Duration::from_secs(config.auth.upstream_timeout_seconds);
        let http_client = auth::provider::build_http_client(timeout)?;
        let registry = auth::ProviderRegistry::from_config(&config, &http_client)?;

        let state = Self::with_registry(config, registry);
        tracing::info!("Application state initialized successfully");
        Ok(state)
    }

    /// Build state around an existing provider registry
    pub fn with_registry(config: config::AppConfig, registry: auth::ProviderRegistry) -> Self {
        let sessions = auth::SessionStore::from_config(&config);
        let gateway = auth::AuthGateway::new(
            Arc::new(registry),
            config.auth.session_secret.clone(),
            config.should_use_secure_cookies(),
            Duration::from_secs(config.auth.upstream_timeout_seconds),
        );

        Self {
            config: Arc::new(config),
            sessions: Arc::new(sessions),
            gateway: Arc::new(gateway),
        }
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::Router;
    use tower_http::{compression::CompressionLayer, services::ServeDir, trace::TraceLayer};

    let mut router = Router::new()
        .route("/health", axum::routing::get(health_check))
        .merge(api::pages_router())
        .merge(auth::auth_router());

    for mount in &state.config.assets.mount_paths {
        router = router.nest_service(mount, ServeDir::new(&state.config.assets.dir));
    }

    router
        .fallback(not_found)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http().make_span_with(request_span::<axum::body::Body>))
        .with_state(state)
        .merge(api::metrics_router())
}

/// Request span with the path only; callback query strings carry OAuth codes
fn request_span<B>(request: &axum::http::Request<B>) -> tracing::Span {
    tracing::debug_span!(
        "request",
        method = %request.method(),
        path = %request.uri().path(),
    )
}

async fn health_check() -> &'static str {
    "OK"
}

async fn not_found() -> error::AppError {
    error::AppError::NotFound
}
