// Capture module - acquisition of fixed-geometry screen regions.
// The live backend (xcap) sits behind the `screen-capture` feature; the
// replay backend crops regions out of recorded frames.

pub mod backend;
pub mod error;
pub mod replay;
#[cfg(feature = "screen-capture")]
pub mod screen;
pub mod types;

pub use backend::CaptureBackend;
pub use error::{CaptureError, CaptureResult};
pub use replay::ReplayCapture;
#[cfg(feature = "screen-capture")]
pub use screen::ScreenCapture;
pub use types::{CaptureProvider, Region, crop_frame, grab_off_runtime};
