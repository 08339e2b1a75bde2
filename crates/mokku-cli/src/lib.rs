//! Launcher for the openai-mokku mock server.
//!
//! Parses flags (with environment fallbacks), installs logging and span
//! export, binds the listener and runs the server until SIGINT or SIGTERM.

#![deny(unsafe_code)]

pub mod bootstrap;
pub mod error;
pub mod parser;

pub use bootstrap::{init_logging, init_telemetry, run};
pub use error::CliError;
pub use parser::Cli;
