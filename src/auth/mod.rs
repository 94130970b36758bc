//! Authentication
//!
//! Handles:
//! - Identity provider (Google) code exchange
//! - Signed session tokens
//! - Session cookie lifecycle
//! - Authentication extractors

pub mod cookie;
mod middleware;
mod oauth;
pub mod provider;
pub mod session;

pub use cookie::{CookiePolicy, SESSION_COOKIE};
pub use middleware::{CurrentUser, SessionHint};
pub use oauth::auth_router;
pub use provider::{GoogleProvider, IdentityProvider, ProviderError};
pub use session::{IdentityClaims, SessionCodec, TokenError};
