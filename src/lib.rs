pub mod args;
pub mod automation;
pub mod batch;
pub mod capture;
pub mod config;
pub mod error;
pub mod input;
pub mod link;
pub mod notify;
pub mod prediction_log;
pub mod template_matching;

pub use error::{AppError, AppResult};
