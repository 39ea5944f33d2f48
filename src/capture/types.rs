// Capture provider types and trait
use super::error::CaptureResult;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Screen rectangle in capture coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Whether the region lies completely inside a frame of the given size
    pub fn fits_within(&self, frame_width: u32, frame_height: u32) -> bool {
        let right = self.x.checked_add(self.width);
        let bottom = self.y.checked_add(self.height);
        matches!((right, bottom), (Some(r), Some(b)) if r <= frame_width && b <= frame_height)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{},{},{}]", self.x, self.y, self.width, self.height)
    }
}

/// Acquires a screen region. Implementations are owned by the calling task;
/// one handle is never shared across threads.
#[allow(async_fn_in_trait)]
pub trait CaptureProvider {
    async fn capture_region(&mut self, region: &Region) -> CaptureResult<DynamicImage>;
}

/// Run a blocking frame grab on tokio's blocking pool
pub async fn grab_off_runtime<T, F>(grab: F) -> CaptureResult<T>
where
    F: FnOnce() -> CaptureResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(grab)
        .await
        .map_err(|e| super::error::CaptureError::Backend {
            description: format!("capture task failed: {e}"),
        })?
}

/// Crop `region` out of a full frame, rejecting out-of-bounds geometry
pub fn crop_frame(frame: &DynamicImage, region: &Region) -> CaptureResult<DynamicImage> {
    if region.is_empty() || !region.fits_within(frame.width(), frame.height()) {
        return Err(super::error::CaptureError::OutOfBounds {
            region: *region,
            frame_width: frame.width(),
            frame_height: frame.height(),
        });
    }
    Ok(frame.crop_imm(region.x, region.y, region.width, region.height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::CaptureError;
    use image::{GrayImage, Luma};

    #[tokio::test]
    async fn test_blocking_grab_leaves_runtime_free() {
        let started = std::time::Instant::now();
        let grab = grab_off_runtime(|| {
            std::thread::sleep(std::time::Duration::from_millis(200));
            Ok(DynamicImage::ImageLuma8(GrayImage::new(4, 4)))
        });
        let timer = async {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            started.elapsed()
        };

        // Single-threaded test runtime: the timer only fires on time if the
        // grab is not holding the runtime thread
        let (frame, timer_elapsed) = tokio::join!(grab, timer);
        assert_eq!(frame.unwrap().width(), 4);
        assert!(timer_elapsed < std::time::Duration::from_millis(150), "{timer_elapsed:?}");
    }

    #[tokio::test]
    async fn test_blocking_grab_panic_is_a_backend_error() {
        let result: CaptureResult<()> = grab_off_runtime(|| panic!("driver crashed")).await;
        assert!(matches!(result, Err(CaptureError::Backend { .. })));
    }

    #[test]
    fn test_region_fits_within() {
        assert!(Region::new(39, 943, 26, 26).fits_within(1920, 1080));
        assert!(Region::new(1894, 1054, 26, 26).fits_within(1920, 1080));
        assert!(!Region::new(1895, 1054, 26, 26).fits_within(1920, 1080));
        assert!(!Region::new(u32::MAX, 0, 2, 2).fits_within(1920, 1080));
    }

    #[test]
    fn test_crop_frame_extracts_pixels() {
        let frame = DynamicImage::ImageLuma8(GrayImage::from_fn(10, 10, |x, y| {
            Luma([(y * 10 + x) as u8])
        }));
        let crop = crop_frame(&frame, &Region::new(2, 3, 4, 2)).unwrap().to_luma8();
        assert_eq!(crop.dimensions(), (4, 2));
        assert_eq!(crop.get_pixel(0, 0)[0], 32);
        assert_eq!(crop.get_pixel(3, 1)[0], 45);
    }

    #[test]
    fn test_crop_frame_out_of_bounds() {
        let frame = DynamicImage::ImageLuma8(GrayImage::new(10, 10));
        let err = crop_frame(&frame, &Region::new(8, 8, 4, 4)).unwrap_err();
        assert!(matches!(err, CaptureError::OutOfBounds { .. }));
        assert!(crop_frame(&frame, &Region::new(0, 0, 0, 4)).is_err());
    }
}
