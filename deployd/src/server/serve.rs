//! HTTP server setup

use std::future::Future;
use std::sync::Arc;

use axum::{extract::DefaultBodyLimit, routing::get, Router};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::app::options::ServerOptions;
use crate::errors::DeploydError;
use crate::server::handlers::{
    health_handler, status_detail_handler, status_handler, trigger_handler, version_handler,
};
use crate::server::state::ServerState;

/// Build the router
pub fn router(options: &ServerOptions, state: Arc<ServerState>) -> Router {
    Router::new()
        // Webhook and status
        .route("/", get(status_handler).post(trigger_handler))
        .route("/status", get(status_detail_handler))
        // Health and version
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        // State and middleware
        .with_state(state)
        .layer(DefaultBodyLimit::max(options.max_body_bytes))
        .layer(TraceLayer::new_for_http())
}

/// Start the HTTP server
///
/// Binding errors are returned directly. Errors while serving are forwarded on
/// `fatal_tx` so the supervisor can shut the daemon down.
pub async fn serve(
    options: &ServerOptions,
    state: Arc<ServerState>,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
    fatal_tx: mpsc::Sender<DeploydError>,
) -> Result<JoinHandle<()>, DeploydError> {
    let app = router(options, state);

    info!("Starting HTTP server on {}", options.address);

    let listener = TcpListener::bind(&options.address)
        .await
        .map_err(|e| DeploydError::ServerError(format!("failed to bind {}: {}", options.address, e)))?;

    let handle = tokio::spawn(async move {
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await;
        match result {
            Ok(()) => info!("HTTP server stopped"),
            Err(e) => {
                error!("HTTP server failed: {}", e);
                let _ = fatal_tx.send(DeploydError::ServerError(e.to_string())).await;
            }
        }
    });

    Ok(handle)
}
