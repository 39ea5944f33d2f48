//! Optional binarization applied identically to templates and inputs
//!
//! Gaussian blur, Otsu threshold, then a morphological opening with the
//! 4-neighbour (L1, radius 1) kernel to remove speckle.

use image::{GrayImage, Luma};
use imageproc::contrast::otsu_level;
use imageproc::distance_transform::Norm;
use imageproc::filter::gaussian_blur_f32;
use imageproc::morphology::open;
use serde::{Deserialize, Serialize};

const BLUR_SIGMA: f32 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preprocess {
    /// Raw luma pixels
    #[default]
    None,
    /// Blur + Otsu + opening
    Binarize,
}

impl Preprocess {
    pub fn apply(&self, image: &GrayImage) -> GrayImage {
        match self {
            Preprocess::None => image.clone(),
            Preprocess::Binarize => binarize(image),
        }
    }
}

pub fn binarize(image: &GrayImage) -> GrayImage {
    if image.width() == 0 || image.height() == 0 {
        return image.clone();
    }

    let blurred = gaussian_blur_f32(image, BLUR_SIGMA);
    let level = otsu_level(&blurred);

    let mut binary = GrayImage::new(blurred.width(), blurred.height());
    for (x, y, pixel) in blurred.enumerate_pixels() {
        let value = if pixel[0] > level { 255 } else { 0 };
        binary.put_pixel(x, y, Luma([value]));
    }

    open(&binary, Norm::L1, 1)
}
