//! Session management
//!
//! Uses HMAC-signed tokens stored in cookies.
//! No server-side session storage needed: a token is trusted if and only if
//! its signature verifies under the current secret and it has not expired.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Length of an HMAC-SHA256 tag in bytes
const SIGNATURE_LEN: usize = 32;

/// Reasons a session token can be rejected
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    /// The token is not `payload.signature`, or a segment does not decode
    #[error("Malformed session token")]
    Malformed,

    /// The signature does not match the current secret
    #[error("Invalid session token signature")]
    InvalidSignature,

    /// The embedded `exp` claim has passed
    #[error("Session token expired")]
    Expired,

    /// Claims could not be serialized or the key was rejected
    #[error("Session token encoding failed: {0}")]
    Encoding(String),
}

/// Identity claims asserted by the identity provider
///
/// Immutable once built. The only way to derive a different set of claims
/// is [`IdentityClaims::with_expiry`], which consumes `self`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityClaims(Map<String, Value>);

impl IdentityClaims {
    /// Claim holding the expiry, in seconds since the Unix epoch
    pub const EXPIRES_AT: &'static str = "exp";
    /// Claim holding the issue time, in seconds since the Unix epoch
    pub const ISSUED_AT: &'static str = "iat";

    pub fn new(claims: Map<String, Value>) -> Self {
        Self(claims)
    }

    pub fn get(&self, claim: &str) -> Option<&Value> {
        self.0.get(claim)
    }

    fn get_str(&self, claim: &str) -> Option<&str> {
        self.0.get(claim).and_then(Value::as_str)
    }

    /// Display name (`name`)
    pub fn name(&self) -> Option<&str> {
        self.get_str("name")
    }

    /// Subject identifier (`sub`)
    pub fn subject(&self) -> Option<&str> {
        self.get_str("sub")
    }

    pub fn email(&self) -> Option<&str> {
        self.get_str("email")
    }

    /// Expiry, if an `exp` claim is present and is an integer timestamp
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.get(Self::EXPIRES_AT)
            .and_then(Value::as_i64)
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
    }

    /// Return these claims with `iat` and `exp` set
    pub fn with_expiry(mut self, issued_at: DateTime<Utc>, expires_at: DateTime<Utc>) -> Self {
        self.0.insert(Self::ISSUED_AT.into(), issued_at.timestamp().into());
        self.0.insert(Self::EXPIRES_AT.into(), expires_at.timestamp().into());
        self
    }
}

impl FromIterator<(String, Value)> for IdentityClaims {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Signs and verifies session tokens
///
/// Token format: base64(payload).base64(hmac_sha256(base64(payload)))
///
/// The codec embeds nothing on its own; expiry is only enforced when the
/// issuer put an `exp` claim into the claims.
#[derive(Clone)]
pub struct SessionCodec {
    secret: Vec<u8>,
}

impl std::fmt::Debug for SessionCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCodec")
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl SessionCodec {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    fn mac(&self, payload_b64: &str) -> Result<HmacSha256, TokenError> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| TokenError::Encoding(e.to_string()))?;
        mac.update(payload_b64.as_bytes());
        Ok(mac)
    }

    /// Create a signed session token
    ///
    /// # Returns
    /// Signed token string
    pub fn issue(&self, claims: &IdentityClaims) -> Result<String, TokenError> {
        // 1. Serialize claims to JSON
        let payload =
            serde_json::to_vec(claims).map_err(|e| TokenError::Encoding(e.to_string()))?;

        // 2. Base64 encode the payload
        let payload_b64 = URL_SAFE_NO_PAD.encode(payload);

        // 3. Create HMAC-SHA256 signature
        let signature = self.mac(&payload_b64)?.finalize().into_bytes();
        let signature_b64 = URL_SAFE_NO_PAD.encode(signature);

        // 4. Return "{payload}.{signature}"
        Ok(format!("{}.{}", payload_b64, signature_b64))
    }

    /// Verify and decode a session token
    ///
    /// # Errors
    /// - `Malformed` if the token does not parse
    /// - `InvalidSignature` if it was not signed with this secret
    /// - `Expired` if its `exp` claim has passed
    pub fn verify(&self, token: &str) -> Result<IdentityClaims, TokenError> {
        self.verify_at(token, Utc::now())
    }

    /// Same as [`SessionCodec::verify`] with an explicit clock
    pub fn verify_at(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<IdentityClaims, TokenError> {
        // 1. Split token into payload and signature
        let (payload_b64, signature_b64) = token.split_once('.').ok_or(TokenError::Malformed)?;
        if payload_b64.is_empty() || signature_b64.is_empty() || signature_b64.contains('.') {
            return Err(TokenError::Malformed);
        }

        let payload_bytes = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| TokenError::Malformed)?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| TokenError::Malformed)?;
        if signature.len() != SIGNATURE_LEN {
            return Err(TokenError::Malformed);
        }

        // 2. Verify HMAC signature
        self.mac(payload_b64)?
            .verify_slice(&signature)
            .map_err(|_| TokenError::InvalidSignature)?;

        // 3. Deserialize payload
        let claims = match serde_json::from_slice::<Value>(&payload_bytes) {
            Ok(Value::Object(map)) => IdentityClaims(map),
            _ => return Err(TokenError::Malformed),
        };

        // 4. Check expiry
        if let Some(exp) = claims.get(IdentityClaims::EXPIRES_AT) {
            let exp = exp.as_i64().ok_or(TokenError::Malformed)?;
            if exp <= now.timestamp() {
                return Err(TokenError::Expired);
            }
        }

        Ok(claims)
    }
}
