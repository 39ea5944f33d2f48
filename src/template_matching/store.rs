//! Template loading and per-region organisation

use super::error::{TemplateError, TemplateResult};
use super::preprocess::Preprocess;
use super::types::{PixelStats, RegionType, Template};
use image::GrayImage;
use image::imageops::FilterType;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Canonical geometry and preprocessing for one region type
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionSpec {
    pub width: u32,
    pub height: u32,
    pub preprocess: Preprocess,
}

impl RegionSpec {
    pub fn new(width: u32, height: u32, preprocess: Preprocess) -> Self {
        Self {
            width,
            height,
            preprocess,
        }
    }
}

#[derive(Debug, Clone)]
struct RegionTemplates {
    spec: RegionSpec,
    templates: Vec<Template>,
}

/// Read-only after load; share it behind an `Arc`.
#[derive(Debug, Default, Clone)]
pub struct TemplateStore {
    regions: HashMap<RegionType, RegionTemplates>,
}

impl TemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every label of `region_type` from `directory/<label>/*.png`.
    ///
    /// Each template is resized to the region's canonical size and
    /// preprocessed exactly once, here. A missing label directory or one
    /// without a single decodable image is an error.
    pub fn load_region(
        &mut self,
        region_type: RegionType,
        directory: &Path,
        spec: RegionSpec,
    ) -> TemplateResult<usize> {
        if spec.width == 0 || spec.height == 0 {
            return Err(TemplateError::ZeroGeometry {
                region: region_type,
                width: spec.width,
                height: spec.height,
            });
        }

        if !directory.is_dir() {
            return Err(TemplateError::DirectoryNotFound {
                path: directory.to_path_buf(),
            });
        }

        let mut templates = Vec::new();
        for label in region_type.labels() {
            let label_dir = directory.join(label);
            let loaded = load_label_dir(region_type, label, &label_dir, spec)?;
            log::info!(
                "📂 Loaded {} '{}' templates for region '{}' from {:?}",
                loaded.len(),
                label,
                region_type,
                label_dir
            );
            templates.extend(loaded);
        }

        let count = templates.len();
        self.regions
            .insert(region_type, RegionTemplates { spec, templates });
        Ok(count)
    }

    /// Load several region types from one templates root. Stops at the first
    /// failing region.
    pub fn load_all(root: &Path, specs: &[(RegionType, RegionSpec)]) -> TemplateResult<Self> {
        let mut store = Self::new();
        for (region_type, spec) in specs {
            store.load_region(*region_type, root, *spec)?;
        }
        log::info!(
            "📂 Template store ready: {} templates across {} region types",
            store.count(),
            store.regions.len()
        );
        Ok(store)
    }

    /// Templates eligible for `region_type`; empty when the region was never loaded
    pub fn templates(&self, region_type: RegionType) -> &[Template] {
        self.regions
            .get(&region_type)
            .map(|r| r.templates.as_slice())
            .unwrap_or(&[])
    }

    pub fn spec(&self, region_type: RegionType) -> Option<RegionSpec> {
        self.regions.get(&region_type).map(|r| r.spec)
    }

    pub fn is_loaded(&self, region_type: RegionType) -> bool {
        !self.templates(region_type).is_empty()
    }

    pub fn count(&self) -> usize {
        self.regions.values().map(|r| r.templates.len()).sum()
    }
}

fn load_label_dir(
    region_type: RegionType,
    label: &str,
    label_dir: &Path,
    spec: RegionSpec,
) -> TemplateResult<Vec<Template>> {
    if !label_dir.is_dir() {
        return Err(TemplateError::DirectoryNotFound {
            path: label_dir.to_path_buf(),
        });
    }

    let entries = std::fs::read_dir(label_dir).map_err(|e| TemplateError::DirectoryUnreadable {
        path: label_dir.to_path_buf(),
        source: e,
    })?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_png(path))
        .collect();
    // Sort for consistent ordering
    paths.sort();

    let mut templates = Vec::with_capacity(paths.len());
    for path in paths {
        match image::open(&path) {
            Ok(img) => {
                let gray = img.to_luma8();
                let prepared = prepare(&gray, spec);
                templates.push(Template {
                    label: label.to_string(),
                    region_type,
                    width: prepared.width(),
                    height: prepared.height(),
                    stats: PixelStats::from_luma(prepared.as_raw()),
                    source: path,
                });
            }
            Err(e) => {
                log::warn!("⚠️ Skipping undecodable template {:?}: {}", path, e);
            }
        }
    }

    if templates.is_empty() {
        return Err(TemplateError::EmptyLabel {
            label: label.to_string(),
            path: label_dir.to_path_buf(),
        });
    }

    Ok(templates)
}

fn is_png(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("png"))
}

/// Resize to the canonical size when needed, then preprocess
pub(crate) fn prepare(image: &GrayImage, spec: RegionSpec) -> GrayImage {
    let sized = if image.dimensions() != (spec.width, spec.height) {
        image::imageops::resize(image, spec.width, spec.height, FilterType::Lanczos3)
    } else {
        image.clone()
    };
    spec.preprocess.apply(&sized)
}
