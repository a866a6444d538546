//! Custom error types for the relay watcher.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SSH error: {0}")]
    Ssh(#[from] ssh2::Error),

    #[error("Transfer to {target} failed: {reason}")]
    TransferFailed { target: String, reason: String },

    #[error("Source file vanished: {0}")]
    SourceVanished(std::path::PathBuf),

    #[error("Retries exhausted for {target} after {attempts} attempts")]
    RetryExhausted { target: String, attempts: u32 },

    #[error("State error: {0}")]
    State(String),
}

pub type Result<T> = std::result::Result<T, RelayError>;
