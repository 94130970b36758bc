//! Error types for Gatehouse
//!
//! All request errors are converted to `AppError`,
//! which implements `IntoResponse` for proper HTTP error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::auth::{ProviderError, TokenError};

/// Application-wide error type
///
/// Responses carry a short plain-text body. Details stay in the logs.
#[derive(Debug, Error)]
pub enum AppError {
    /// Authentication required (401)
    #[error("Unauthorized")]
    Unauthorized,

    /// Validation error (400)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Identity provider exchange or verification failed (502)
    #[error("Identity provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Session token could not be issued (500)
    #[error("Session token error: {0}")]
    Token(#[from] TokenError),

    /// Configuration error (500)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl IntoResponse for AppError {
    /// Convert error to HTTP response
    ///
    /// Maps each error variant to appropriate HTTP status code
    /// and plain-text body.
    fn into_response(self) -> Response {
        let (status, message, error_type) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized", "unauthorized"),
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "Bad Request", "validation"),
            AppError::Provider(_) => (StatusCode::BAD_GATEWAY, "Login failed", "provider"),
            AppError::Token(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error",
                "token",
            ),
            AppError::Config(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error",
                "config",
            ),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error",
                "internal",
            ),
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, "Request rejected");
        }

        // Record error metric
        use crate::metrics::ERRORS_TOTAL;
        ERRORS_TOTAL.with_label_values(&[error_type]).inc();

        (status, message).into_response()
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn render(error: AppError) -> (StatusCode, String) {
        let response = error.into_response();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn unauthorized_is_plain_401() {
        let (status, body) = render(AppError::Unauthorized).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, "Unauthorized");
    }

    #[tokio::test]
    async fn provider_error_hides_details() {
        let error = AppError::Provider(ProviderError::Rejected(
            "invalid_grant: secret detail".to_string(),
        ));
        let (status, body) = render(error).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(!body.contains("secret detail"));
    }

    #[tokio::test]
    async fn internal_error_hides_details() {
        let (status, body) = render(AppError::Internal(anyhow::anyhow!("disk on fire"))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "Internal server error");
    }
}
