use super::error::CaptureResult;
use super::replay::ReplayCapture;
#[cfg(feature = "screen-capture")]
use super::screen::ScreenCapture;
use super::types::{CaptureProvider, Region};
use image::DynamicImage;
use std::path::Path;

/// Concrete capture backends selectable at startup
pub enum CaptureBackend {
    #[cfg(feature = "screen-capture")]
    Screen(ScreenCapture),
    Replay(ReplayCapture),
}

impl CaptureBackend {
    pub fn replay(path: &Path) -> CaptureResult<Self> {
        Ok(CaptureBackend::Replay(ReplayCapture::open(path)?))
    }

    #[cfg(feature = "screen-capture")]
    pub fn screen(monitor_index: Option<usize>) -> Self {
        CaptureBackend::Screen(ScreenCapture::new(monitor_index))
    }

    pub fn name(&self) -> &'static str {
        match self {
            #[cfg(feature = "screen-capture")]
            CaptureBackend::Screen(_) => "screen",
            CaptureBackend::Replay(_) => "replay",
        }
    }
}

impl CaptureProvider for CaptureBackend {
    async fn capture_region(&mut self, region: &Region) -> CaptureResult<DynamicImage> {
        match self {
            #[cfg(feature = "screen-capture")]
            CaptureBackend::Screen(s) => s.capture_region(region).await,
            CaptureBackend::Replay(r) => r.capture_region(region).await,
        }
    }
}
