//! Authentication extractors
//!
//! Protects routes that require a verified session.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::extract::CookieJar;

use super::cookie;
use super::session::{IdentityClaims, TokenError};
use crate::AppState;
use crate::error::AppError;
use crate::metrics::SESSION_VERIFICATIONS_TOTAL;

fn authenticate_token(token: &str, state: &AppState) -> Result<IdentityClaims, TokenError> {
    let result = state.codec.verify(token);

    let outcome = match &result {
        Ok(_) => "valid",
        Err(TokenError::Malformed) => "malformed",
        Err(TokenError::InvalidSignature) => "invalid_signature",
        Err(TokenError::Expired) => "expired",
        Err(TokenError::Encoding(_)) => "encoding",
    };
    SESSION_VERIFICATIONS_TOTAL
        .with_label_values(&[outcome])
        .inc();

    result
}

/// Extractor for current authenticated user
///
/// Reads the session cookie and verifies it. Any failure rejects the
/// request with a bare 401.
///
/// # Usage
/// ```ignore
/// async fn handler(
///     CurrentUser(claims): CurrentUser,
/// ) -> impl IntoResponse {
///     format!("Hello, {}", claims.name().unwrap_or_default())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentUser(pub IdentityClaims);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(claims) = parts.extensions.get::<IdentityClaims>().cloned() {
            return Ok(CurrentUser(claims));
        }

        let state = AppState::from_ref(state);
        let jar = CookieJar::from_headers(&parts.headers);
        let token = cookie::read(&jar).ok_or(AppError::Unauthorized)?;

        let claims = authenticate_token(&token, &state).map_err(|error| {
            tracing::debug!(%error, "Rejected session token");
            AppError::Unauthorized
        })?;
        parts.extensions.insert(claims.clone());

        Ok(CurrentUser(claims))
    }
}

/// Whether the request carries a session cookie at all
///
/// The token is not verified. This only picks which link the home page
/// shows and must never gate access to anything.
#[derive(Debug, Clone, Copy)]
pub struct SessionHint(pub bool);

#[async_trait]
impl<S> FromRequestParts<S> for SessionHint
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        Ok(SessionHint(cookie::read(&jar).is_some()))
    }
}
