/// Template correlation classifier
///
/// Zero-mean normalized cross-correlation against precomputed template
/// statistics: one dot product per template, no per-call reduction over
/// template data.
use super::error::ClassifyError;
use super::store::{TemplateStore, prepare};
use super::types::{Classification, PixelStats, RegionType};
use image::GrayImage;
use std::sync::Arc;

/// Correlations at or below this floor are reported as `no_match`
pub const MIN_CORRELATION: f32 = 0.0;

/// Confidence that corresponds to [`MIN_CORRELATION`]; every acceptance
/// threshold must sit strictly above it.
pub fn floor_confidence() -> f32 {
    rescale(MIN_CORRELATION)
}

/// Anything that can turn a region crop into a labeled prediction
pub trait Classifier: Send + Sync {
    fn classify(
        &self,
        region_type: RegionType,
        image: &GrayImage,
    ) -> Result<Classification, ClassifyError>;
}

/// Correlation matcher over a shared, immutable template store
#[derive(Clone)]
pub struct CorrelationClassifier {
    store: Arc<TemplateStore>,
}

impl CorrelationClassifier {
    pub fn new(store: Arc<TemplateStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &TemplateStore {
        &self.store
    }
}

impl Classifier for CorrelationClassifier {
    fn classify(
        &self,
        region_type: RegionType,
        image: &GrayImage,
    ) -> Result<Classification, ClassifyError> {
        let spec = self
            .store
            .spec(region_type)
            .ok_or(ClassifyError::NoTemplates(region_type))?;
        let templates = self.store.templates(region_type);
        if templates.is_empty() {
            return Err(ClassifyError::NoTemplates(region_type));
        }
        if image.width() == 0 || image.height() == 0 {
            return Err(ClassifyError::EmptyImage(region_type));
        }

        if image.dimensions() != (spec.width, spec.height) {
            log::debug!(
                "📐 Resizing {} input {}x{} -> {}x{}",
                region_type,
                image.width(),
                image.height(),
                spec.width,
                spec.height
            );
        }
        let prepared = prepare(image, spec);
        let input = PixelStats::from_luma(prepared.as_raw());

        let mut best: Option<(&str, f32)> = None;
        for template in templates {
            let Some(r) = correlation(&input, &template.stats) else {
                continue;
            };
            log::trace!("  {} r={:.4}", template.display_name(), r);
            if best.is_none_or(|(_, best_r)| r > best_r) {
                best = Some((template.label.as_str(), r));
            }
        }

        let result = match best {
            Some((label, r)) if r > MIN_CORRELATION => Classification::new(label, rescale(r)),
            _ => Classification::no_match(),
        };
        log::debug!("🔍 {} -> {}", region_type, result);
        Ok(result)
    }
}

/// Pearson correlation of two centered vectors, clamped to [-1, 1].
///
/// `None` when either side is degenerate (zero norm) or the lengths differ.
pub fn correlation(a: &PixelStats, b: &PixelStats) -> Option<f32> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    let denom = a.norm * b.norm;
    if denom <= f32::EPSILON {
        return None;
    }
    let dot: f32 = a
        .centered
        .iter()
        .zip(b.centered.iter())
        .map(|(x, y)| x * y)
        .sum();
    Some((dot / denom).clamp(-1.0, 1.0))
}

/// Map a correlation in [-1, 1] onto a confidence in [0, 1]
pub fn rescale(r: f32) -> f32 {
    ((r.clamp(-1.0, 1.0) + 1.0) / 2.0).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correlation_identical_vectors() {
        let a = PixelStats::from_luma(&[0, 50, 100, 150, 200, 250]);
        let r = correlation(&a, &a.clone()).unwrap();
        assert!((r - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_correlation_inverted_vectors() {
        let a = PixelStats::from_luma(&[0, 255, 0, 255]);
        let b = PixelStats::from_luma(&[255, 0, 255, 0]);
        let r = correlation(&a, &b).unwrap();
        assert!((r + 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_correlation_is_brightness_invariant() {
        let a = PixelStats::from_luma(&[10, 20, 30, 40]);
        let b = PixelStats::from_luma(&[110, 120, 130, 140]);
        let r = correlation(&a, &b).unwrap();
        assert!(r > 0.999);
    }

    #[test]
    fn test_correlation_degenerate_and_mismatched() {
        let flat = PixelStats::from_luma(&[7; 16]);
        let other = PixelStats::from_luma(&(0..16).map(|v| v * 10).collect::<Vec<u8>>());
        assert_eq!(correlation(&flat, &other), None);
        assert_eq!(correlation(&other, &PixelStats::from_luma(&[1, 2, 3])), None);
    }

    #[test]
    fn test_rescale_bounds() {
        assert_eq!(rescale(-1.0), 0.0);
        assert_eq!(rescale(1.0), 1.0);
        assert_eq!(rescale(0.0), 0.5);
        assert_eq!(rescale(3.0), 1.0);
        assert_eq!(floor_confidence(), 0.5);
    }
}
