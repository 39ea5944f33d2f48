use super::types::Region;
use std::path::PathBuf;
use thiserror::Error;

/// A specialized `Result` type for capture operations.
pub type CaptureResult<T> = Result<T, CaptureError>;

/// Transient capture failures; callers retry and then downgrade them.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Region {region} exceeds frame bounds ({frame_width}x{frame_height})")]
    OutOfBounds {
        region: Region,
        frame_width: u32,
        frame_height: u32,
    },

    #[error("Failed to decode frame {path:?}: {source}")]
    Decode {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("No replay frames found in {path:?}")]
    NoFrames { path: PathBuf },

    #[error("Failed to read replay directory {path:?}: {source}")]
    ReplayDirectory {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("No monitor available at index {index}")]
    MonitorNotFound { index: usize },

    #[error("Screen capture failed: {description}")]
    Backend { description: String },
}
