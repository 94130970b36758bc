//! Sign-in flow
//!
//! Implements the OAuth 2.0 authorization code flow with the identity
//! provider and the session cookie lifecycle around it.

use axum::{
    Router,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse},
    routing::get,
};
use axum_extra::extract::CookieJar;
use chrono::{Duration, Utc};
use serde::Deserialize;

use super::cookie;
use super::middleware::SessionHint;
use super::provider::ProviderError;
use crate::AppState;
use crate::error::AppError;
use crate::metrics::LOGINS_TOTAL;

/// Create authentication router
///
/// Routes:
/// - GET / - Home page with login or logout link
/// - GET /callback - OAuth callback
/// - GET /logout - Logout
pub fn auth_router() -> Router<AppState> {
    Router::new()
        .route("/", get(home))
        .route("/callback", get(callback))
        .route("/logout", get(logout))
}

/// 302 Found to `location`
pub(crate) fn found(location: &'static str) -> impl IntoResponse {
    (StatusCode::FOUND, [(header::LOCATION, location)])
}

// =============================================================================
// Home
// =============================================================================

/// GET /
///
/// Shows a logout link when a session cookie is present and a provider
/// login link otherwise. The cookie is not verified here.
async fn home(
    State(state): State<AppState>,
    SessionHint(has_session): SessionHint,
) -> Html<String> {
    let link = if has_session {
        r#"<a href="/logout">Logout</a>"#.to_string()
    } else {
        let url = state.provider.authorization_url();
        format!(
            r#"<a href="{}">Login with Google</a>"#,
            html_escape::encode_double_quoted_attribute(&url)
        )
    };

    Html(format!(
        r#"<!DOCTYPE html>
<html>
<head><title>Login with Google</title></head>
<body>
    <h1>Login with Google</h1>
    {link}
</body>
</html>
"#
    ))
}

// =============================================================================
// Callback
// =============================================================================

/// Query parameters from provider callback
#[derive(Debug, Deserialize)]
struct CallbackQuery {
    /// Authorization code
    code: Option<String>,
    /// Set instead of `code` when the user declined
    error: Option<String>,
}

/// GET /callback
///
/// Handles OAuth callback from the provider.
///
/// # Steps
/// 1. Exchange code for a verified ID token
/// 2. Embed session expiry into the identity claims
/// 3. Issue session token and set cookie
/// 4. Redirect to dashboard
///
/// Nothing is written to the cookie jar unless every step succeeds.
async fn callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    let result = complete_login(&state, query).await;
    LOGINS_TOTAL
        .with_label_values(&[if result.is_ok() { "success" } else { "failure" }])
        .inc();

    let token = result.inspect_err(|error| {
        tracing::warn!(%error, "Login callback failed");
    })?;

    let jar = cookie::attach(jar, token, &state.cookie_policy);
    Ok((jar, found("/dashboard")))
}

async fn complete_login(state: &AppState, query: CallbackQuery) -> Result<String, AppError> {
    if let Some(error) = query.error {
        return Err(ProviderError::Denied(error).into());
    }

    let code = query
        .code
        .filter(|code| !code.is_empty())
        .ok_or_else(|| AppError::Validation("missing authorization code".to_string()))?;

    // 1. Exchange code and verify the ID token
    let claims = state.provider.exchange_code(&code).await?;

    // 2. Embed expiry
    let now = Utc::now();
    let expires_at = now + Duration::seconds(state.config.auth.session_max_age);
    let claims = claims.with_expiry(now, expires_at);

    // 3. Sign
    let token = state.codec.issue(&claims)?;

    tracing::info!(
        user = claims.name().unwrap_or_default(),
        subject = claims.subject().unwrap_or_default(),
        "User logged in"
    );

    Ok(token)
}

// =============================================================================
// Logout
// =============================================================================

/// GET /logout
///
/// Clears session cookie and redirects home. Works without a session.
async fn logout(jar: CookieJar) -> impl IntoResponse {
    (cookie::clear(jar), found("/"))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{Body, to_bytes};
    use axum::http::{Request, Response};
    use serde_json::json;
    use tower::ServiceExt;

    use super::*;
    use crate::auth::IdentityClaims;
    use crate::auth::provider::MockIdentityProvider;
    use crate::config::{AppConfig, AuthConfig, LoggingConfig, ProviderConfig, ServerConfig};

    fn test_config() -> AppConfig {
        AppConfig {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
                protocol: "http".to_string(),
            },
            provider: ProviderConfig {
                client_id: "test-client-id".to_string(),
                client_secret: "test-client-secret".to_string(),
                redirect_uri: None,
                auth_url: "https://provider.test/auth".to_string(),
                token_url: "https://provider.test/token".to_string(),
                tokeninfo_url: "https://provider.test/tokeninfo".to_string(),
                timeout_seconds: 5,
            },
            auth: AuthConfig {
                session_secret: "test-secret-key-32-bytes-long!!!".to_string(),
                session_max_age: 3600,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }

    fn app(provider: MockIdentityProvider) -> (AppState, Router) {
        let state = AppState::with_provider(test_config(), Arc::new(provider));
        let router = auth_router().with_state(state.clone());
        (state, router)
    }

    async fn send_get(router: Router, uri: &str, cookie: Option<&str>) -> Response<Body> {
        let mut request = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }
        router
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn body_text(response: Response<Body>) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn home_links_to_provider_without_cookie() {
        let mut provider = MockIdentityProvider::new();
        provider
            .expect_authorization_url()
            .return_const("https://provider.test/auth?client_id=abc&scope=profile+email".to_string());
        let (_, router) = app(provider);

        let response = send_get(router, "/", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert!(body.contains("Login with Google"));
        assert!(body.contains("https://provider.test/auth?client_id=abc&amp;scope=profile+email"));
        assert!(!body.contains("/logout"));
    }

    // UI hint, not a security boundary: any cookie value flips the link.
    #[tokio::test]
    async fn home_shows_logout_for_any_cookie_value() {
        let mut provider = MockIdentityProvider::new();
        provider.expect_authorization_url().never();
        let (_, router) = app(provider);

        let response = send_get(router, "/", Some("token=not-a-real-token")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains(r#"<a href="/logout">Logout</a>"#));
    }

    #[tokio::test]
    async fn callback_sets_cookie_and_redirects() {
        let mut provider = MockIdentityProvider::new();
        provider
            .expect_exchange_code()
            .times(1)
            .returning(|code| {
                assert_eq!(code, "good-code");
                Ok([
                    ("sub".to_string(), json!("42")),
                    ("name".to_string(), json!("Alice")),
                ]
                .into_iter()
                .collect::<IdentityClaims>())
            });
        let (state, router) = app(provider);

        let response = send_get(router, "/callback?code=good-code", None).await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[header::LOCATION], "/dashboard");

        let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
        assert!(set_cookie.contains("HttpOnly"));
        let token = set_cookie
            .strip_prefix("token=")
            .and_then(|rest| rest.split(';').next())
            .unwrap();

        let claims = state.codec.verify(token).unwrap();
        assert_eq!(claims.name(), Some("Alice"));
        let expires_in = claims.expires_at().unwrap() - Utc::now();
        assert!(expires_in > Duration::seconds(3500) && expires_in <= Duration::seconds(3600));
    }

    #[tokio::test]
    async fn rejected_code_fails_without_cookie() {
        let mut provider = MockIdentityProvider::new();
        provider.expect_exchange_code().returning(|_| {
            Err(ProviderError::Rejected("invalid_grant".to_string()))
        });
        let (_, router) = app(provider);

        let response = send_get(router, "/callback?code=bad-code", None).await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert!(response.headers().get(header::SET_COOKIE).is_none());
    }

    #[tokio::test]
    async fn callback_without_code_is_bad_request() {
        let mut provider = MockIdentityProvider::new();
        provider.expect_exchange_code().never();
        let (_, router) = app(provider);

        let response = send_get(router, "/callback", None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response.headers().get(header::SET_COOKIE).is_none());
    }

    #[tokio::test]
    async fn denied_consent_fails_without_exchange() {
        let mut provider = MockIdentityProvider::new();
        provider.expect_exchange_code().never();
        let (_, router) = app(provider);

        let response = send_get(router, "/callback?error=access_denied", None).await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert!(response.headers().get(header::SET_COOKIE).is_none());
    }

    #[tokio::test]
    async fn logout_without_session_redirects_home() {
        let (_, router) = app(MockIdentityProvider::new());

        let response = send_get(router, "/logout", None).await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[header::LOCATION], "/");
        let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
        assert!(set_cookie.starts_with("token=;"));
    }
}
