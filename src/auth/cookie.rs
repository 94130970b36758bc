//! Session cookie policy
//!
//! The bearer token lives in a single HTTP-only cookie. Nothing is stored
//! server-side.

use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "token";

/// Attributes applied to the session cookie
#[derive(Debug, Clone, Copy)]
pub struct CookiePolicy {
    /// Set the `Secure` attribute (served over HTTPS)
    pub secure: bool,
    /// `Max-Age` in seconds
    pub max_age: i64,
}

impl CookiePolicy {
    pub fn from_config(config: &crate::config::AppConfig) -> Self {
        Self {
            secure: config.should_use_secure_cookies(),
            max_age: config.auth.session_max_age,
        }
    }
}

/// Attach a session token to the response cookies
pub fn attach(jar: CookieJar, token: String, policy: &CookiePolicy) -> CookieJar {
    let cookie = Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(policy.secure)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(policy.max_age));

    jar.add(cookie)
}

/// Read the session token, if one was sent
pub fn read(jar: &CookieJar) -> Option<String> {
    jar.get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_owned())
        .filter(|value| !value.is_empty())
}

/// Remove the session cookie
///
/// Emits an empty cookie with an expiry in the past, whether or not the
/// request carried one.
pub fn clear(jar: CookieJar) -> CookieJar {
    let mut cookie = Cookie::build((SESSION_COOKIE, "")).path("/").build();
    cookie.make_removal();

    jar.add(cookie)
}
