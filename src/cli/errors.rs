//! CLI-specific error types
//!
//! Every CLI error is fatal: `main` prints it and exits non-zero.

use std::io;

use thiserror::Error;

use crate::rest_api::ApiError;
use crate::store::StoreError;

/// CLI error
#[derive(Debug, Error)]
pub enum CliError {
    /// Unusable configuration or input file
    #[error("{0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A seeded document was rejected
    #[error("{0}")]
    Import(#[from] ApiError),

    /// Server could not start or stopped with an error
    #[error("{0}")]
    BootFailed(String),
}

impl CliError {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "TOURBOOK_CLI_CONFIG_ERROR",
            Self::Io(_) | Self::Json(_) => "TOURBOOK_CLI_IO_ERROR",
            Self::Store(_) => "TOURBOOK_CLI_STORE_ERROR",
            Self::Import(_) => "TOURBOOK_CLI_IMPORT_ERROR",
            Self::BootFailed(_) => "TOURBOOK_CLI_BOOT_FAILED",
        }
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(
            CliError::Config("missing".into()).code(),
            "TOURBOOK_CLI_CONFIG_ERROR"
        );
        let io = CliError::from(io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert_eq!(io.code(), "TOURBOOK_CLI_IO_ERROR");
        assert_eq!(io.to_string(), "I/O error: gone");
    }
}
