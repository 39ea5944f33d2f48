//! Replay capture: crops regions out of recorded full-screen frames.
//!
//! Frames are taken from a single image file or every PNG in a directory
//! (sorted by name). Each capture call consumes the next frame, wrapping
//! around at the end, so a directory recorded at one frame per capture
//! replays a session deterministically.

use super::error::{CaptureError, CaptureResult};
use super::types::{CaptureProvider, Region, crop_frame};
use image::DynamicImage;
use std::path::{Path, PathBuf};

pub struct ReplayCapture {
    frames: Vec<PathBuf>,
    cache: Vec<Option<DynamicImage>>,
    cursor: usize,
}

impl ReplayCapture {
    pub fn open(path: &Path) -> CaptureResult<Self> {
        let frames = if path.is_dir() {
            let entries = std::fs::read_dir(path).map_err(|e| CaptureError::ReplayDirectory {
                path: path.to_path_buf(),
                source: e,
            })?;
            let mut frames: Vec<PathBuf> = entries
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.path())
                .filter(|p| {
                    p.is_file()
                        && p.extension()
                            .and_then(|ext| ext.to_str())
                            .is_some_and(|ext| ext.eq_ignore_ascii_case("png"))
                })
                .collect();
            frames.sort();
            frames
        } else if path.is_file() {
            vec![path.to_path_buf()]
        } else {
            Vec::new()
        };

        if frames.is_empty() {
            return Err(CaptureError::NoFrames {
                path: path.to_path_buf(),
            });
        }

        log::info!("🎞️ Replay capture with {} frame(s) from {:?}", frames.len(), path);
        Ok(Self {
            cache: vec![None; frames.len()],
            frames,
            cursor: 0,
        })
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    fn next_frame(&mut self) -> CaptureResult<&DynamicImage> {
        let index = self.cursor;
        self.cursor = (self.cursor + 1) % self.frames.len();

        if self.cache[index].is_none() {
            let path = &self.frames[index];
            let frame = image::open(path).map_err(|e| CaptureError::Decode {
                path: path.clone(),
                source: e,
            })?;
            self.cache[index] = Some(frame);
        }

        self.cache[index]
            .as_ref()
            .ok_or_else(|| CaptureError::Backend {
                description: "replay frame cache miss".to_string(),
            })
    }
}

impl CaptureProvider for ReplayCapture {
    async fn capture_region(&mut self, region: &Region) -> CaptureResult<DynamicImage> {
        let frame = self.next_frame()?;
        crop_frame(frame, region)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};
    use tempfile::TempDir;

    fn frame(value: u8) -> GrayImage {
        GrayImage::from_pixel(32, 32, Luma([value]))
    }

    #[tokio::test]
    async fn test_replay_cycles_sorted_frames() {
        let tmp = TempDir::new().unwrap();
        frame(10).save(tmp.path().join("001.png")).unwrap();
        frame(20).save(tmp.path().join("002.png")).unwrap();

        let mut replay = ReplayCapture::open(tmp.path()).unwrap();
        assert_eq!(replay.frame_count(), 2);

        let region = Region::new(4, 4, 8, 8);
        let mut seen = Vec::new();
        for _ in 0..3 {
            let crop = replay.capture_region(&region).await.unwrap().to_luma8();
            assert_eq!(crop.dimensions(), (8, 8));
            seen.push(crop.get_pixel(0, 0)[0]);
        }
        assert_eq!(seen, vec![10, 20, 10]);
    }

    #[tokio::test]
    async fn test_replay_rejects_region_outside_frame() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("only.png");
        frame(0).save(&file).unwrap();

        let mut replay = ReplayCapture::open(&file).unwrap();
        let err = replay
            .capture_region(&Region::new(30, 30, 8, 8))
            .await
            .unwrap_err();
        assert!(matches!(err, CaptureError::OutOfBounds { .. }));
    }

    #[test]
    fn test_replay_requires_frames() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(
            ReplayCapture::open(tmp.path()),
            Err(CaptureError::NoFrames { .. })
        ));
    }
}
