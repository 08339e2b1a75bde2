//! Command-line flags.
//!
//! Every flag except `--no-telemetry` and `--verbose` falls back to an
//! environment variable, so the server can be configured entirely from a
//! container environment or a `.env` file.

use std::time::Duration;

use clap::Parser;

use mokku_proxy::{DEFAULT_MAX_BODY_BYTES, DEFAULT_OTLP_ENDPOINT, ServerConfig};

use crate::error::CliError;

/// Mock OpenAI-compatible API server.
#[derive(Debug, Parser)]
#[command(name = "mokku")]
#[command(about = "Serve a mock OpenAI-compatible chat/completions API")]
#[command(version)]
pub struct Cli {
    /// Address to bind
    #[arg(long, env = "MOKKU_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "MOKKU_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Largest request body buffered for inspection; larger bodies get 413
    #[arg(long, env = "MOKKU_MAX_BODY_BYTES", default_value_t = DEFAULT_MAX_BODY_BYTES)]
    pub max_body_bytes: usize,

    /// Seconds allowed for in-flight requests to finish after a shutdown signal
    #[arg(long, env = "MOKKU_SHUTDOWN_GRACE_SECS", default_value_t = 10)]
    pub shutdown_grace_secs: u64,

    /// OTLP/gRPC collector receiving request spans
    #[arg(long, env = "OTEL_EXPORTER_OTLP_ENDPOINT", default_value = DEFAULT_OTLP_ENDPOINT)]
    pub otlp_endpoint: String,

    /// Do not export spans
    #[arg(long)]
    pub no_telemetry: bool,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

impl Cli {
    /// Server settings described by these flags.
    pub fn server_config(&self) -> Result<ServerConfig, CliError> {
        if self.max_body_bytes == 0 {
            return Err(CliError::Config(
                "--max-body-bytes must be greater than zero".to_string(),
            ));
        }

        Ok(ServerConfig {
            host: self.host.clone(),
            port: self.port,
            ..ServerConfig::default()
        }
        .with_max_body_bytes(self.max_body_bytes)
        .with_shutdown_grace(Duration::from_secs(self.shutdown_grace_secs)))
    }
}
