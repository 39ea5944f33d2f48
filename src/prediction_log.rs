//! Append-only CSV of classifications, for reviewing what the matcher saw.

use crate::template_matching::{Classification, RegionType};
use chrono::{DateTime, Local, SecondsFormat};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

pub const RESULTS_FILE_NAME: &str = "results.csv";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub file: String,
    /// Glyph position within the sequence; empty for batch files
    pub position: Option<usize>,
    pub region: RegionType,
    pub label: String,
    pub confidence: f32,
    pub timestamp: String,
}

impl PredictionRecord {
    pub fn new(
        file: &Path,
        position: Option<usize>,
        region: RegionType,
        classification: &Classification,
        at: DateTime<Local>,
    ) -> Self {
        Self {
            file: file.display().to_string(),
            position,
            region,
            label: classification.label.clone(),
            confidence: classification.confidence,
            timestamp: at.to_rfc3339_opts(SecondsFormat::Millis, false),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PredictionLog {
    path: PathBuf,
}

impl PredictionLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `results.csv` inside `dir`
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(RESULTS_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append rows, writing the header first when the file is new or empty
    pub fn append(&self, records: &[PredictionRecord]) -> csv::Result<()> {
        let needs_header = std::fs::metadata(&self.path).map_or(true, |m| m.len() == 0);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);
        for record in records {
            writer.serialize(record)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn read_all(&self) -> csv::Result<Vec<PredictionRecord>> {
        let mut reader = csv::Reader::from_path(&self.path)?;
        reader.deserialize().collect()
    }
}
