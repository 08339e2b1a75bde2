//! CLI entry point - the composition root.

use std::process::ExitCode;

use clap::Parser;
use tracing::error;

use mokku_cli::{Cli, init_logging, run};

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment variables before parsing so `.env` feeds the env fallbacks
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::from(e.exit_code())
        }
    }
}
