use super::types::KeyCommand;
use std::path::PathBuf;
use thiserror::Error;

/// A specialized `Result` type for command-link operations.
pub type LinkResult<T> = Result<T, LinkError>;

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("Failed to open serial device {path:?}: {source}")]
    OpenFailed {
        path: PathBuf,
        source: tokio_serial::Error,
    },

    #[error("Failed to list serial ports: {0}")]
    Enumerate(#[source] tokio_serial::Error),

    #[error("Serial I/O failed while sending '{command}': {source}")]
    Io {
        command: KeyCommand,
        source: std::io::Error,
    },

    #[error("Device rejected command '{command}'")]
    Rejected { command: KeyCommand },

    #[error("Unexpected response to '{command}': {response:?}")]
    UnexpectedResponse {
        command: KeyCommand,
        response: String,
    },

    #[error("No acknowledgement for '{command}' within {timeout:?}")]
    AckTimeout {
        command: KeyCommand,
        timeout: std::time::Duration,
    },

    #[error("Serial device closed the connection")]
    Closed,
}
