use super::types::RegionType;
use std::path::PathBuf;
use thiserror::Error;

pub type TemplateResult<T> = Result<T, TemplateError>;

/// Template loading failures. All of these are configuration errors.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Template directory not found: {path:?}")]
    DirectoryNotFound { path: PathBuf },

    #[error("Failed to read template directory {path:?}: {source}")]
    DirectoryUnreadable {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("No decodable template images for '{label}' in {path:?}")]
    EmptyLabel { label: String, path: PathBuf },

    #[error("Canonical size for region '{region}' is zero ({width}x{height})")]
    ZeroGeometry {
        region: RegionType,
        width: u32,
        height: u32,
    },
}

/// Classification precondition failures
#[derive(Debug, Error, PartialEq)]
pub enum ClassifyError {
    #[error("No templates loaded for region '{0}'")]
    NoTemplates(RegionType),

    #[error("Input image for region '{0}' is empty")]
    EmptyImage(RegionType),
}
