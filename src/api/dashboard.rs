//! Protected dashboard page
//!
//! Only reachable with a verified session cookie.

use axum::{Router, response::Html, routing::get};

use crate::AppState;
use crate::auth::CurrentUser;

/// Create dashboard router
///
/// Routes:
/// - GET /dashboard - Greeting for the signed-in user
pub fn dashboard_router() -> Router<AppState> {
    Router::new().route("/dashboard", get(dashboard))
}

/// GET /dashboard
///
/// Greets the user by the display name in their session. Rejected with a
/// bare 401 by [`CurrentUser`] when the session is missing or invalid.
async fn dashboard(CurrentUser(claims): CurrentUser) -> Html<String> {
    let display_name = claims
        .name()
        .or_else(|| claims.email())
        .unwrap_or("User");
    let display_name = html_escape::encode_text(display_name);

    Html(format!(
        r#"<!DOCTYPE html>
<html>
<head><title>Dashboard</title></head>
<body>
    <h1>Dashboard</h1>
    <p>Welcome, {display_name}!</p>
    <p>This page is available only for authorized users</p>
    <a href="/logout">Logout</a>
</body>
</html>
"#
    ))
}
