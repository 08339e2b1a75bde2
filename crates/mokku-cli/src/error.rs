//! CLI-specific error types and exit codes.

use thiserror::Error;

/// CLI-specific error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Flags or environment produced an unusable configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The listen address could not be bound.
    #[error("Failed to bind {addr}: {reason}")]
    Bind { addr: String, reason: String },

    /// The server stopped with an error.
    #[error("Server error: {0}")]
    Server(String),
}

impl CliError {
    /// Map error to appropriate exit code.
    ///
    /// Exit codes follow sysexits.h where one fits.
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => 78,   // EX_CONFIG
            Self::Bind { .. } => 69, // EX_UNAVAILABLE
            Self::Server(_) => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(CliError::Config("x".into()).exit_code(), 78);
        assert_eq!(
            CliError::Bind {
                addr: "0.0.0.0:1".into(),
                reason: "in use".into()
            }
            .exit_code(),
            69
        );
        assert_eq!(CliError::Server("boom".into()).exit_code(), 1);
    }

    #[test]
    fn test_bind_message() {
        let err = CliError::Bind {
            addr: "127.0.0.1:8080".into(),
            reason: "Address already in use".into(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to bind 127.0.0.1:8080: Address already in use"
        );
    }
}
