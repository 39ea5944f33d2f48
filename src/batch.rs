//! Offline classification of saved crops, for tuning thresholds and checking
//! a template set against real captures.

use crate::error::{AppError, AppResult};
use crate::prediction_log::{PredictionLog, PredictionRecord};
use crate::template_matching::{Classification, Classifier, RegionType};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize)]
pub struct FileResult {
    pub path: PathBuf,
    #[serde(flatten)]
    pub classification: Option<Classification>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip)]
    pub classified_at: DateTime<Local>,
}

/// Label written for files that could not be classified
pub const ERROR_LABEL: &str = "ERROR";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LabelSummary {
    pub count: usize,
    pub average_confidence: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub region: RegionType,
    pub results: Vec<FileResult>,
    pub summary: BTreeMap<String, LabelSummary>,
    pub failures: usize,
}

/// Expand directories into their PNG files, sorted; plain files pass through
pub fn collect_images(paths: &[PathBuf]) -> AppResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            let entries = std::fs::read_dir(path).map_err(|e| AppError::Io {
                path: path.clone(),
                source: e,
            })?;
            let mut pngs: Vec<PathBuf> = entries
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.path())
                .filter(|p| p.is_file() && is_png(p))
                .collect();
            pngs.sort();
            files.extend(pngs);
        } else {
            files.push(path.clone());
        }
    }
    Ok(files)
}

fn is_png(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("png"))
}

fn classify_file(classifier: &dyn Classifier, region: RegionType, path: &Path) -> FileResult {
    let outcome = image::open(path)
        .map_err(|e| e.to_string())
        .and_then(|img| {
            classifier
                .classify(region, &img.to_luma8())
                .map_err(|e| e.to_string())
        });
    let classified_at = Local::now();
    match outcome {
        Ok(classification) => FileResult {
            path: path.to_path_buf(),
            classification: Some(classification),
            error: None,
            classified_at,
        },
        Err(e) => {
            log::warn!("⚠️ {:?}: {}", path, e);
            FileResult {
                path: path.to_path_buf(),
                classification: None,
                error: Some(e),
                classified_at,
            }
        }
    }
}

pub fn classify_files(
    classifier: &dyn Classifier,
    region: RegionType,
    files: &[PathBuf],
) -> BatchReport {
    let results: Vec<FileResult> = files
        .iter()
        .map(|path| classify_file(classifier, region, path))
        .collect();

    let mut totals: BTreeMap<String, (usize, f32)> = BTreeMap::new();
    for c in results.iter().filter_map(|r| r.classification.as_ref()) {
        let entry = totals.entry(c.label.clone()).or_default();
        entry.0 += 1;
        entry.1 += c.confidence;
    }
    let summary = totals
        .into_iter()
        .map(|(label, (count, sum))| {
            (
                label,
                LabelSummary {
                    count,
                    average_confidence: sum / count as f32,
                },
            )
        })
        .collect();

    BatchReport {
        region,
        failures: results.iter().filter(|r| r.error.is_some()).count(),
        results,
        summary,
    }
}

impl BatchReport {
    /// Append one row per file to `path`; failures get the `ERROR` label
    pub fn write_csv(&self, path: &Path) -> AppResult<()> {
        let failed = Classification::new(ERROR_LABEL, 0.0);
        let records: Vec<PredictionRecord> = self
            .results
            .iter()
            .map(|r| {
                PredictionRecord::new(
                    &r.path,
                    None,
                    self.region,
                    r.classification.as_ref().unwrap_or(&failed),
                    r.classified_at,
                )
            })
            .collect();
        PredictionLog::new(path).append(&records)?;
        Ok(())
    }

    pub fn to_table(&self) -> String {
        let mut out = String::new();
        for result in &self.results {
            let name = result.path.display();
            match (&result.classification, &result.error) {
                (Some(c), _) => out.push_str(&format!("{name}: {} ({:.3})\n", c.label, c.confidence)),
                (None, Some(e)) => out.push_str(&format!("{name}: error: {e}\n")),
                (None, None) => {}
            }
        }
        out.push_str(&format!(
            "\nSummary for region '{}' ({} files, {} failed):\n",
            self.region,
            self.results.len(),
            self.failures
        ));
        for (label, s) in &self.summary {
            out.push_str(&format!(
                "  {label:<10} {:>4}  avg {:.3}\n",
                s.count, s.average_confidence
            ));
        }
        out
    }
}
