use crate::capture::CaptureError;
use crate::config::ConfigError;
use crate::link::LinkError;
use crate::template_matching::TemplateError;
use std::path::PathBuf;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

/// Errors that end the program. Anything recoverable is handled below this.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Keyboard bridge error: {0}")]
    Link(#[from] LinkError),

    #[error("Failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("JSON output failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV output failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("No screen capture backend compiled in; pass --replay <DIR> or build with --features screen-capture")]
    NoCaptureBackend,
}
