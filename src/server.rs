//! HTTP server lifecycle
//!
//! [`start`] binds the listener and serves in the background, returning a
//! [`ServerHandle`]. [`ServerHandle::stop`] stops accepting connections and
//! waits for in-flight requests to finish.

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::AppState;
use crate::config::ServerConfig;
use crate::error::AppError;

/// A running server
#[derive(Debug)]
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<std::io::Result<()>>,
}

impl ServerHandle {
    /// Address the listener is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting connections and wait for in-flight requests
    ///
    /// # Errors
    /// Returns error if the server task failed or panicked
    pub async fn stop(self) -> Result<(), AppError> {
        tracing::info!("Stopping server gracefully...");

        // The receiver is gone only if the server already exited
        let _ = self.shutdown.send(());

        self.task
            .await
            .map_err(|e| AppError::Internal(e.into()))?
            .map_err(|e| AppError::Internal(e.into()))?;

        tracing::info!("Server stopped.");
        Ok(())
    }
}

/// Bind and start serving
///
/// # Errors
/// Returns error if the address cannot be bound
pub async fn start(server: &ServerConfig, state: AppState) -> Result<ServerHandle, AppError> {
    let addr = server.bind_address();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("failed to bind {addr}: {e}")))?;
    let local_addr = listener
        .local_addr()
        .map_err(|e| AppError::Internal(e.into()))?;

    let app = crate::build_router(state);
    let (shutdown, shutdown_rx) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await
    });

    tracing::info!("App listening at http://{}", local_addr);

    Ok(ServerHandle {
        local_addr,
        shutdown,
        task,
    })
}

/// Resolve on Ctrl+C or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let terminate = async {
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
            } else {
                tracing::error!("Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        };

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await;
    }
}
