/// Template matching module for fixed-geometry region classification
///
/// This module provides:
/// - Per-region template loading with one-time resize and statistics
/// - Optional binarization shared by templates and inputs
/// - A correlation classifier behind the `Classifier` capability
pub mod error;
pub mod matcher;
pub mod preprocess;
pub mod store;
pub mod types;


pub use error::{ClassifyError, TemplateError, TemplateResult};
pub use matcher::{Classifier, CorrelationClassifier, MIN_CORRELATION, floor_confidence};
pub use preprocess::Preprocess;
pub use store::{RegionSpec, TemplateStore};
pub use types::{Classification, NO_MATCH, RegionType, Template};
