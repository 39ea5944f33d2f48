//! Live monitor capture through xcap

use super::error::{CaptureError, CaptureResult};
use super::types::{CaptureProvider, Region, crop_frame, grab_off_runtime};
use image::{DynamicImage, RgbaImage};
use xcap::Monitor;

/// Captures from one monitor; `None` selects the primary monitor
pub struct ScreenCapture {
    monitor_index: Option<usize>,
}

impl ScreenCapture {
    pub fn new(monitor_index: Option<usize>) -> Self {
        Self { monitor_index }
    }
}

fn select_monitor(monitor_index: Option<usize>) -> CaptureResult<Monitor> {
    let monitors = Monitor::all().map_err(|e| CaptureError::Backend {
        description: format!("failed to list monitors: {e}"),
    })?;

    match monitor_index {
        Some(index) => monitors
            .into_iter()
            .nth(index)
            .ok_or(CaptureError::MonitorNotFound { index }),
        None => {
            let mut fallback = None;
            for monitor in monitors {
                if monitor.is_primary().unwrap_or(false) {
                    return Ok(monitor);
                }
                if fallback.is_none() {
                    fallback = Some(monitor);
                }
            }
            fallback.ok_or(CaptureError::MonitorNotFound { index: 0 })
        }
    }
}

/// Monitor enumeration and the frame grab both block in the platform API
fn grab_frame(monitor_index: Option<usize>) -> CaptureResult<RgbaImage> {
    let monitor = select_monitor(monitor_index)?;
    monitor.capture_image().map_err(|e| CaptureError::Backend {
        description: format!("monitor capture failed: {e}"),
    })
}

impl CaptureProvider for ScreenCapture {
    async fn capture_region(&mut self, region: &Region) -> CaptureResult<DynamicImage> {
        let monitor_index = self.monitor_index;
        let image = grab_off_runtime(move || grab_frame(monitor_index)).await?;
        log::trace!("📸 Captured {}x{} frame", image.width(), image.height());
        crop_frame(&DynamicImage::ImageRgba8(image), region)
    }
}
