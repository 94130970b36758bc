//! Gatehouse - A minimal sign-in gateway
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      HTTP Layer (Axum)                       │
//! │  - Home, callback, logout (auth)                            │
//! │  - Protected dashboard, metrics (api)                       │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Auth Layer                            │
//! │  - Identity provider client (Google)                        │
//! │  - HMAC-signed session tokens                               │
//! │  - Session cookie policy                                    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Sessions are stateless: the server keeps no session table, only the
//! signing secret and provider credentials loaded at startup.
//!
//! # Modules
//!
//! - `api`: Dashboard and metrics handlers
//! - `auth`: Sign-in flow, session tokens and cookies
//! - `server`: Server start/stop handle
//! - `config`: Configuration management
//! - `error`: Error types

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod metrics;
pub mod server;

use std::sync::Arc;

use auth::{CookiePolicy, GoogleProvider, IdentityProvider, SessionCodec};

/// Application state shared across all handlers
///
/// Cloned for each request. Everything in here is immutable after startup.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Session token signer/verifier
    pub codec: Arc<SessionCodec>,

    /// Identity provider client
    pub provider: Arc<dyn IdentityProvider>,

    /// Session cookie attributes
    pub cookie_policy: CookiePolicy,
}

impl AppState {
    /// Initialize application state with the Google provider
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built or a provider
    /// endpoint is not a valid URL
    pub fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        let http_client = reqwest::Client::builder()
            .user_agent(concat!("Gatehouse/", env!("CARGO_PKG_VERSION")))
            .redirect(reqwest::redirect::Policy::none())
            .timeout(std::time::Duration::from_secs(
                config.provider.timeout_seconds,
            ))
            .build()
            .map_err(|e| error::AppError::Internal(e.into()))?;

        let provider = GoogleProvider::new(
            config.provider.clone(),
            config.redirect_uri(),
            http_client,
        )
        .map_err(|e| error::AppError::Config(format!("invalid provider endpoint: {e}")))?;

        Ok(Self::with_provider(config, Arc::new(provider)))
    }

    /// Initialize application state with a given identity provider
    pub fn with_provider(config: config::AppConfig, provider: Arc<dyn IdentityProvider>) -> Self {
        Self {
            codec: Arc::new(SessionCodec::new(&config.auth.session_secret)),
            cookie_policy: CookiePolicy::from_config(&config),
            config: Arc::new(config),
            provider,
        }
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::Router;
    use tower_http::trace::TraceLayer;

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .merge(auth::auth_router())
        .merge(api::dashboard_router())
        .merge(api::metrics_router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
