/// Template matching data types
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Label returned when no template correlates above the floor
pub const NO_MATCH: &str = "no_match";

/// Fixed-geometry screen crop category, each with its own template subset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionType {
    End,
    Status,
    Pm,
    Glyph,
}

impl RegionType {
    pub const ALL: [RegionType; 4] = [
        RegionType::End,
        RegionType::Status,
        RegionType::Pm,
        RegionType::Glyph,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RegionType::End => "end",
            RegionType::Status => "status",
            RegionType::Pm => "pm",
            RegionType::Glyph => "glyph",
        }
    }

    /// Closed label set for this region; each label is also the name of its
    /// template sub-directory.
    pub fn labels(&self) -> &'static [&'static str] {
        match self {
            RegionType::End => &["end"],
            RegionType::Status => &["alt", "wait"],
            RegionType::Pm => &["pm"],
            RegionType::Glyph => &["q", "e"],
        }
    }

    pub fn is_known_label(&self, label: &str) -> bool {
        self.labels().contains(&label)
    }
}

impl fmt::Display for RegionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RegionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "end" => Ok(RegionType::End),
            "status" => Ok(RegionType::Status),
            "pm" => Ok(RegionType::Pm),
            "glyph" => Ok(RegionType::Glyph),
            other => Err(format!(
                "unknown region type '{other}', expected one of end, status, pm, glyph"
            )),
        }
    }
}

/// Result of one classification call. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    /// Template label, or [`NO_MATCH`]
    pub label: String,
    /// Rescaled correlation in [0, 1]
    pub confidence: f32,
}

impl Classification {
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    pub fn no_match() -> Self {
        Self {
            label: NO_MATCH.to_string(),
            confidence: 0.0,
        }
    }

    pub fn is_no_match(&self) -> bool {
        self.label == NO_MATCH
    }

    /// True when the label is `label` and the confidence clears `threshold`
    pub fn accepts(&self, label: &str, threshold: f32) -> bool {
        self.label == label && self.confidence >= threshold
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:.3})", self.label, self.confidence)
    }
}

/// Flattened, mean-centered pixel statistics used by the correlation.
#[derive(Clone, Debug)]
pub struct PixelStats {
    pub centered: Vec<f32>,
    pub mean: f32,
    pub norm: f32,
}

impl PixelStats {
    pub fn from_luma(pixels: &[u8]) -> Self {
        if pixels.is_empty() {
            return Self {
                centered: Vec::new(),
                mean: 0.0,
                norm: 0.0,
            };
        }

        let mean = pixels.iter().map(|&p| p as f32).sum::<f32>() / pixels.len() as f32;
        let centered: Vec<f32> = pixels.iter().map(|&p| p as f32 - mean).collect();
        let norm = centered.iter().map(|v| v * v).sum::<f32>().sqrt();

        Self {
            centered,
            mean,
            norm,
        }
    }

    pub fn len(&self) -> usize {
        self.centered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.centered.is_empty()
    }
}

/// Labeled reference image, immutable after load
#[derive(Clone, Debug)]
pub struct Template {
    /// Category label (e.g. "q", "wait")
    pub label: String,
    pub region_type: RegionType,
    /// File the template was decoded from
    pub source: PathBuf,
    pub width: u32,
    pub height: u32,
    pub stats: PixelStats,
}

impl Template {
    pub fn display_name(&self) -> String {
        let file = self
            .source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unnamed".to_string());
        format!(
            "{}/{}-[{}x{}] ({})",
            self.region_type, self.label, self.width, self.height, file
        )
    }
}
