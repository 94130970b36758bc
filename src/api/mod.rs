//! API layer
//!
//! HTTP handlers for:
//! - The protected dashboard
//! - Metrics (Prometheus)
//!
//! Sign-in routes live in [`crate::auth`].

mod dashboard;
pub mod metrics;

pub use dashboard::dashboard_router;
pub use metrics::metrics_router;
