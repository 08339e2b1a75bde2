//! Axum HTTP server for the mock API.
//!
//! This module provides the `serve()` function that runs the server on a
//! pre-bound `TcpListener` until the cancellation token fires.

use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use mokku_core::Telemetry;

use crate::config::{API_PREFIX, ServerConfig};
use crate::handlers::{
    chat_completions, completions, create_embeddings, health_check, list_models, retrieve_model,
};
use crate::intercept::{CHAT_COMPLETIONS_ROUTE, COMPLETIONS_ROUTE, intercept};

/// Shared application state for the server.
#[derive(Clone)]
pub struct AppState {
    /// Sink for request spans, shared by all requests.
    pub telemetry: Arc<dyn Telemetry>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(telemetry: Arc<dyn Telemetry>, config: ServerConfig) -> Self {
        Self {
            telemetry,
            config: Arc::new(config),
        }
    }
}

/// Build the full application: interceptor in front of the OpenAI routes.
pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/models", get(list_models))
        .route("/models/{model}", get(retrieve_model))
        .route(CHAT_COMPLETIONS_ROUTE, post(chat_completions))
        .route(COMPLETIONS_ROUTE, post(completions))
        .route("/embeddings", post(create_embeddings));

    let max_body_bytes = state.config.max_body_bytes;

    Router::new()
        .route("/health", get(health_check))
        .nest(API_PREFIX, api)
        .layer(middleware::from_fn_with_state(state.clone(), intercept))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the server with a pre-bound listener.
///
/// Runs until `cancel` is triggered, then stops accepting connections and
/// waits up to `config.shutdown_grace` for in-flight requests. Connections
/// still open after that are dropped.
///
/// # Returns
///
/// Returns `Ok(())` on clean shutdown, or an error if the server fails.
pub async fn serve(
    listener: TcpListener,
    config: ServerConfig,
    telemetry: Arc<dyn Telemetry>,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    let grace = config.shutdown_grace;
    let app = create_router(AppState::new(telemetry, config));

    info!("Mock server listening on {addr}");
    info!("Point OpenAI clients at: http://{addr}{API_PREFIX}");

    let server = axum::serve(listener, app)
        .with_graceful_shutdown(cancel.clone().cancelled_owned())
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => result?,
        () = cancel.cancelled() => {
            info!(grace_secs = grace.as_secs_f64(), "Shutdown requested, draining connections");
            match tokio::time::timeout(grace, &mut server).await {
                Ok(result) => result?,
                Err(_) => warn!("Shutdown grace period elapsed, dropping open connections"),
            }
        }
    }

    info!("Mock server shut down");
    Ok(())
}
