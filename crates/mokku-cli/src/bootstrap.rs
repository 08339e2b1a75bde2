//! Composition root: logging, span export, listener and signal handling.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use mokku_core::{NoopTelemetry, Telemetry};
use mokku_proxy::{OtelTelemetry, TracerGuard, init_tracer_provider, serve};

use crate::error::CliError;
use crate::parser::Cli;

/// Install the stderr log subscriber. `RUST_LOG` wins over `verbose`.
pub fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Pick the span sink. Export failures downgrade to a no-op sink.
pub fn init_telemetry(cli: &Cli) -> (Arc<dyn Telemetry>, Option<TracerGuard>) {
    if cli.no_telemetry {
        info!("Span export disabled");
        return (Arc::new(NoopTelemetry::new()), None);
    }

    match init_tracer_provider(&cli.otlp_endpoint) {
        Ok(guard) => (Arc::new(OtelTelemetry::new()), Some(guard)),
        Err(e) => {
            warn!(error = %e, "Failed to initialize span export, continuing without it");
            (Arc::new(NoopTelemetry::new()), None)
        }
    }
}

/// Run the server until SIGINT/SIGTERM, then flush spans.
pub async fn run(cli: Cli) -> Result<(), CliError> {
    let config = cli.server_config()?;
    let (telemetry, guard) = init_telemetry(&cli);

    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| CliError::Bind {
            addr: addr.clone(),
            reason: e.to_string(),
        })?;

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_cancel.cancel();
    });

    let result = serve(listener, config, telemetry, cancel)
        .await
        .map_err(|e| CliError::Server(e.to_string()));

    if let Some(guard) = guard {
        // Flushing waits on the exporter thread.
        if let Err(e) = tokio::task::spawn_blocking(move || guard.shutdown()).await {
            warn!(error = %e, "Telemetry flush task failed");
        }
    }

    result
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C"),
        () = terminate => info!("Received SIGTERM"),
    }
}
