//! Gatehouse binary entry point

use gatehouse::{AppState, config, server};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber
///
/// `RUST_LOG` overrides the configured level.
fn init_tracing(logging: &config::LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| logging.filter_directive().into());

    if logging.is_json() {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }
}

/// Application entry point
///
/// # Setup
/// 1. Load configuration from file and environment
/// 2. Initialize tracing/logging from the `logging` section
/// 3. Initialize AppState
/// 4. Start HTTP server
/// 5. Stop gracefully on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration
    let loaded = config::AppConfig::load();

    // 2. Initialize tracing/logging; defaults apply when loading failed
    match &loaded {
        Ok(config) => init_tracing(&config.logging),
        Err(_) => init_tracing(&config::LoggingConfig::default()),
    }

    tracing::info!("Starting Gatehouse...");

    gatehouse::metrics::init_metrics();

    // Never bind without provider credentials
    let config = match loaded {
        Ok(config) => config,
        Err(error) => {
            tracing::error!(
                %error,
                "Set GATEHOUSE__PROVIDER__CLIENT_ID, GATEHOUSE__PROVIDER__CLIENT_SECRET and GATEHOUSE__AUTH__SESSION_SECRET"
            );
            std::process::exit(1);
        }
    };
    tracing::info!(
        base_url = %config.server.base_url(),
        redirect_uri = %config.redirect_uri(),
        log_level = %config.logging.level,
        "Configuration loaded"
    );

    if !config.should_use_secure_cookies() {
        tracing::warn!(
            protocol = %config.server.protocol,
            "Using insecure session cookies; serve over https in production"
        );
    }

    // 3. Initialize application state
    let state = AppState::new(config.clone())?;

    // 4. Start HTTP server
    let handle = server::start(&config.server, state).await?;

    // 5. Wait for a termination signal
    server::shutdown_signal().await;
    handle.stop().await?;

    Ok(())
}
