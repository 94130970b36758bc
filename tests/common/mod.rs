//! Common test utilities for E2E tests

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use gatehouse::auth::{IdentityClaims, IdentityProvider, ProviderError};
use gatehouse::server::{self, ServerHandle};
use gatehouse::{AppState, config};
use serde_json::json;

/// Authorization code the stub provider accepts
pub const GOOD_CODE: &str = "good-code";

/// Identity provider that accepts exactly [`GOOD_CODE`]
pub struct StubProvider;

#[async_trait]
impl IdentityProvider for StubProvider {
    fn authorization_url(&self) -> String {
        "https://provider.test/auth?access_type=offline&scope=profile+email&client_id=test-client-id"
            .to_string()
    }

    async fn exchange_code(&self, code: &str) -> Result<IdentityClaims, ProviderError> {
        if code != GOOD_CODE {
            return Err(ProviderError::Rejected("invalid_grant".to_string()));
        }

        Ok([
            ("sub".to_string(), json!("1234567890")),
            ("name".to_string(), json!("Alice")),
            ("email".to_string(), json!("alice@example.com")),
        ]
        .into_iter()
        .collect())
    }
}

/// Configuration pointing at the given provider endpoints
pub fn test_config(provider_base: &str) -> config::AppConfig {
    config::AppConfig {
        server: config::ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0, // Let OS assign port
            protocol: "http".to_string(),
        },
        provider: config::ProviderConfig {
            client_id: "test-client-id".to_string(),
            client_secret: "test-client-secret".to_string(),
            redirect_uri: Some("http://127.0.0.1/callback".to_string()),
            auth_url: format!("{provider_base}/auth"),
            token_url: format!("{provider_base}/token"),
            tokeninfo_url: format!("{provider_base}/tokeninfo"),
            timeout_seconds: 5,
        },
        auth: config::AuthConfig {
            session_secret: "test-secret-key-32-bytes-long!!!".to_string(),
            session_max_age: 3600,
        },
        logging: config::LoggingConfig {
            level: "info".to_string(),
            format: "pretty".to_string(),
        },
    }
}

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub client: reqwest::Client,
    handle: ServerHandle,
}

impl TestServer {
    /// Start a server backed by [`StubProvider`]
    pub async fn new() -> Self {
        let config = test_config("https://provider.test");
        let state = AppState::with_provider(config, Arc::new(StubProvider));
        Self::start(state).await
    }

    /// Start a server with the given state
    pub async fn start(state: AppState) -> Self {
        let handle = server::start(&state.config.server, state.clone())
            .await
            .expect("server starts");
        let addr = format!("http://{}", handle.local_addr());

        Self {
            addr,
            state,
            client: no_redirect_client(),
            handle,
        }
    }

    /// Get base URL for requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// GET `path`, optionally sending a Cookie header
    pub async fn get(&self, path: &str, cookie: Option<&str>) -> reqwest::Response {
        let mut request = self.client.get(self.url(path));
        if let Some(cookie) = cookie {
            request = request.header("Cookie", cookie);
        }
        request.send().await.expect("request succeeds")
    }

    /// Stop the server and wait for it to drain
    pub async fn stop(self) {
        self.handle.stop().await.expect("server stops cleanly");
    }
}

pub fn no_redirect_client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .timeout(std::time::Duration::from_secs(10))
        .build()
        .expect("failed to build no-redirect client")
}

/// `Set-Cookie` values on a response
pub fn set_cookies(response: &reqwest::Response) -> Vec<String> {
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok().map(ToString::to_string))
        .collect()
}

/// The `token=...` pair from a `Set-Cookie` value, suitable for a Cookie header
pub fn session_cookie(response: &reqwest::Response) -> Option<String> {
    set_cookies(response)
        .into_iter()
        .find(|v| v.starts_with("token="))
        .and_then(|v| v.split(';').next().map(ToString::to_string))
}

pub fn location(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get("location")
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string)
}
