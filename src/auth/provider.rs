//! Identity provider client
//!
//! Runs the OAuth 2.0 authorization code exchange against Google with the
//! `oauth2` client and verifies the returned ID token through the tokeninfo
//! endpoint.

use async_trait::async_trait;
use oauth2::basic::{
    BasicErrorResponse, BasicRevocationErrorResponse, BasicTokenIntrospectionResponse,
    BasicTokenType,
};
use oauth2::{
    AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet,
    EndpointSet, ExtraTokenFields, HttpClientError, RedirectUrl, RequestTokenError, Scope,
    StandardRevocableToken, StandardTokenResponse, TokenUrl,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use super::session::IdentityClaims;
use crate::config::ProviderConfig;

/// Issuers Google signs ID tokens as
const GOOGLE_ISSUERS: [&str; 2] = ["accounts.google.com", "https://accounts.google.com"];

/// Claims describing the ID token itself rather than the user
const TOKEN_METADATA_CLAIMS: [&str; 10] = [
    "aud", "azp", "iss", "exp", "iat", "nbf", "at_hash", "alg", "kid", "typ",
];

/// Identity provider failures
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The user declined or the provider aborted before issuing a code
    #[error("Sign-in denied by provider: {0}")]
    Denied(String),

    /// The token endpoint refused the authorization code
    #[error("Authorization code rejected: {0}")]
    Rejected(String),

    /// The token endpoint answered with something that is not a token response
    #[error("Unreadable token response: {0}")]
    InvalidTokenResponse(String),

    /// The token response carried no ID token
    #[error("Token response did not include an ID token")]
    MissingIdToken,

    /// The tokeninfo endpoint refused the ID token
    #[error("ID token rejected: {0}")]
    InvalidIdToken(String),

    #[error("ID token audience {0:?} does not match client id")]
    AudienceMismatch(Option<String>),

    #[error("ID token issuer {0:?} is not trusted")]
    IssuerMismatch(Option<String>),

    /// Network failure or timeout talking to the provider
    #[error("Provider request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl From<RequestTokenError<HttpClientError<reqwest::Error>, BasicErrorResponse>>
    for ProviderError
{
    fn from(error: RequestTokenError<HttpClientError<reqwest::Error>, BasicErrorResponse>) -> Self {
        match error {
            RequestTokenError::ServerResponse(response) => Self::Rejected(response.to_string()),
            RequestTokenError::Request(HttpClientError::Reqwest(error)) => Self::Transport(*error),
            other => Self::InvalidTokenResponse(other.to_string()),
        }
    }
}

/// An external identity provider
///
/// Performs the authorization-code exchange and ID token verification.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// URL the user is sent to in order to sign in
    fn authorization_url(&self) -> String;

    /// Exchange an authorization code for verified identity claims
    async fn exchange_code(&self, code: &str) -> Result<IdentityClaims, ProviderError>;
}

/// Google-specific token response fields
#[derive(Debug, Clone, Deserialize, Serialize)]
struct GoogleTokenFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id_token: Option<String>,
}

impl ExtraTokenFields for GoogleTokenFields {}

type GoogleTokenResponse = StandardTokenResponse<GoogleTokenFields, BasicTokenType>;

/// OAuth client type with auth URL and token URL set.
type ConfiguredClient = oauth2::Client<
    BasicErrorResponse,
    GoogleTokenResponse,
    BasicTokenIntrospectionResponse,
    StandardRevocableToken,
    BasicRevocationErrorResponse,
    EndpointSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointSet,
>;

/// Google OAuth client
pub struct GoogleProvider {
    client: ConfiguredClient,
    client_id: String,
    tokeninfo_url: String,
    http_client: reqwest::Client,
}

impl GoogleProvider {
    /// # Arguments
    /// * `config` - Provider credentials and endpoints
    /// * `redirect_uri` - Callback URL registered with Google
    /// * `http_client` - Client used for the exchange; carries the timeout
    ///   and must not follow redirects
    ///
    /// # Errors
    /// Returns error if an endpoint or the redirect URI is not a valid URL
    pub fn new(
        config: ProviderConfig,
        redirect_uri: String,
        http_client: reqwest::Client,
    ) -> Result<Self, url::ParseError> {
        let client_id = ClientId::new(config.client_id.clone());
        let client: ConfiguredClient = oauth2::Client::new(client_id)
            .set_client_secret(ClientSecret::new(config.client_secret))
            .set_auth_uri(AuthUrl::new(config.auth_url)?)
            .set_token_uri(TokenUrl::new(config.token_url)?)
            .set_redirect_uri(RedirectUrl::new(redirect_uri)?)
            .set_auth_type(AuthType::RequestBody);

        Ok(Self {
            client,
            client_id: config.client_id,
            tokeninfo_url: config.tokeninfo_url,
            http_client,
        })
    }

    /// Verify an ID token and return its payload
    ///
    /// # Steps
    /// 1. Ask the tokeninfo endpoint to check the signature and expiry
    /// 2. Check the audience is our client id
    /// 3. Check the issuer is Google
    async fn verify_id_token(&self, id_token: &str) -> Result<Map<String, Value>, ProviderError> {
        let response = self
            .http_client
            .get(&self.tokeninfo_url)
            .query(&[("id_token", id_token)])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::InvalidIdToken(format!("{status}: {body}")));
        }

        let payload: Map<String, Value> = response.json().await?;

        let audience = payload.get("aud").and_then(Value::as_str);
        if audience != Some(self.client_id.as_str()) {
            return Err(ProviderError::AudienceMismatch(audience.map(str::to_owned)));
        }

        let issuer = payload.get("iss").and_then(Value::as_str);
        if !issuer.is_some_and(|iss| GOOGLE_ISSUERS.contains(&iss)) {
            return Err(ProviderError::IssuerMismatch(issuer.map(str::to_owned)));
        }

        Ok(payload)
    }
}

#[async_trait]
impl IdentityProvider for GoogleProvider {
    fn authorization_url(&self) -> String {
        let (url, _state) = self
            .client
            .authorize_url(CsrfToken::new_random)
            .add_scope(Scope::new("profile".to_string()))
            .add_scope(Scope::new("email".to_string()))
            .add_extra_param("access_type", "offline")
            .url();
        url.into()
    }

    async fn exchange_code(&self, code: &str) -> Result<IdentityClaims, ProviderError> {
        // 1. Exchange code for tokens
        let tokens = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(&self.http_client)
            .await?;

        let id_token = tokens
            .extra_fields()
            .id_token
            .as_deref()
            .ok_or(ProviderError::MissingIdToken)?;

        // 2. Verify the ID token
        let payload = self.verify_id_token(id_token).await?;

        // 3. Keep only claims about the user
        Ok(payload
            .into_iter()
            .filter(|(claim, _)| !TOKEN_METADATA_CLAIMS.contains(&claim.as_str()))
            .collect())
    }
}
