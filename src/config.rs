//! Configuration store: geometry per resolution, thresholds, timing and
//! safety ceilings, loaded from a JSON file with defaults for every field.

use crate::capture::Region;
use crate::template_matching::{Preprocess, RegionSpec, RegionType, floor_confidence};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "glyph-relay.json";

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Unknown resolution profile '{0}'")]
    UnknownResolution(String),

    #[error("Invalid configuration:\n  - {}", .0.join("\n  - "))]
    Invalid(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: u32,
    pub y: u32,
}

/// Inclusive millisecond range a delay is drawn from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayRange {
    pub const fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    pub const fn fixed(ms: u64) -> Self {
        Self::new(ms, ms)
    }

    pub fn sample(&self) -> Duration {
        let ms = if self.min_ms >= self.max_ms {
            self.min_ms
        } else {
            rand::thread_rng().gen_range(self.min_ms..=self.max_ms)
        };
        Duration::from_millis(ms)
    }

    pub fn max(&self) -> Duration {
        Duration::from_millis(self.max_ms.max(self.min_ms))
    }
}

/// Crop geometry for one screen resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionProfile {
    /// Top-left corners of the sequential glyph crops
    pub glyph_positions: Vec<Point>,
    /// Glyph crops are square
    pub glyph_size: u32,
    pub status: Region,
    pub end: Region,
    /// Zero-sized disables PM detection
    pub pm: Region,
}

impl ResolutionProfile {
    fn full_hd() -> Self {
        Self {
            glyph_positions: vec![
                Point { x: 39, y: 943 },
                Point { x: 97, y: 943 },
                Point { x: 155, y: 943 },
            ],
            glyph_size: 26,
            status: Region::new(761, 72, 397, 16),
            end: Region::new(842, 33, 15, 11),
            pm: Region::new(28, 23, 14, 143),
        }
    }

    fn hd_plus() -> Self {
        Self {
            glyph_positions: vec![
                Point { x: 38, y: 762 },
                Point { x: 96, y: 762 },
                Point { x: 154, y: 762 },
            ],
            glyph_size: 26,
            status: Region::new(634, 60, 331, 14),
            end: Region::new(702, 28, 13, 9),
            pm: Region::new(0, 0, 0, 0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub glyph: f32,
    pub end: f32,
    pub status: f32,
    pub pm: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            glyph: 0.6,
            end: 0.8,
            status: 0.8,
            pm: 0.8,
        }
    }
}

impl Thresholds {
    pub fn for_region(&self, region_type: RegionType) -> f32 {
        match region_type {
            RegionType::Glyph => self.glyph,
            RegionType::End => self.end,
            RegionType::Status => self.status,
            RegionType::Pm => self.pm,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    pub glyph: Preprocess,
    pub end: Preprocess,
    pub status: Preprocess,
    pub pm: Preprocess,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            glyph: Preprocess::Binarize,
            end: Preprocess::None,
            status: Preprocess::None,
            pm: Preprocess::None,
        }
    }
}

impl PreprocessConfig {
    pub fn for_region(&self, region_type: RegionType) -> Preprocess {
        match region_type {
            RegionType::Glyph => self.glyph,
            RegionType::End => self.end,
            RegionType::Status => self.status,
            RegionType::Pm => self.pm,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Wait after the trigger before the first glyph capture
    pub initial_delay_ms: u64,
    /// One range per glyph position, slept before that capture
    pub capture_delays: Vec<DelayRange>,
    /// Slept before each key command
    pub command_delay: DelayRange,
    /// Wait after the last glyph before monitoring starts
    pub status_initial_wait_ms: u64,
    /// Slept between monitoring iterations
    pub status_poll: DelayRange,
    pub trigger_debounce_ms: u64,
    /// How long `running` stays false after an emergency stop
    pub stop_grace_ms: u64,
    /// Fixed backoff between capture/command retries
    pub io_backoff_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 400,
            capture_delays: vec![
                DelayRange::new(200, 400),
                DelayRange::new(400, 600),
                DelayRange::new(400, 600),
            ],
            command_delay: DelayRange::new(50, 200),
            status_initial_wait_ms: 200,
            status_poll: DelayRange::new(2300, 4400),
            trigger_debounce_ms: 500,
            stop_grace_ms: 1000,
            io_backoff_ms: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    pub max_iterations: u32,
    pub max_retries: u32,
    /// Attempts per capture or command before the step is abandoned
    pub io_attempts: u32,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            max_retries: 5,
            io_attempts: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Serial device of the keyboard bridge; `None` searches for one
    pub port: Option<PathBuf>,
    pub baud_rate: u32,
    /// Pick a known USB-serial bridge when `port` is unset
    pub auto_detect: bool,
    pub ack_timeout_ms: u64,
    pub init_delay_ms: u64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: crate::link::serial::DEFAULT_BAUD_RATE,
            auto_detect: true,
            ack_timeout_ms: 1000,
            init_delay_ms: 2000,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    pub enabled: bool,
    /// Falls back to TELEGRAM_BOT_TOKEN
    pub bot_token: Option<String>,
    /// Falls back to TELEGRAM_CHAT_ID
    pub chat_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// `None` selects the primary monitor
    pub monitor_index: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Root holding one sub-directory per label
    pub templates_path: PathBuf,
    pub active_resolution: String,
    pub resolutions: BTreeMap<String, ResolutionProfile>,
    pub thresholds: Thresholds,
    pub preprocess: PreprocessConfig,
    pub timing: TimingConfig,
    pub limits: Limits,
    pub link: LinkConfig,
    pub notify: NotifyConfig,
    pub capture: CaptureConfig,
    /// Send ALT through the link when a trigger arrives
    pub press_trigger_key: bool,
    /// Save every glyph crop here when set
    pub debug_crops_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let mut resolutions = BTreeMap::new();
        resolutions.insert("1920x1080".to_string(), ResolutionProfile::full_hd());
        resolutions.insert("1600x900".to_string(), ResolutionProfile::hd_plus());

        Self {
            templates_path: PathBuf::from("templates"),
            active_resolution: "1920x1080".to_string(),
            resolutions,
            thresholds: Thresholds::default(),
            preprocess: PreprocessConfig::default(),
            timing: TimingConfig::default(),
            limits: Limits::default(),
            link: LinkConfig::default(),
            notify: NotifyConfig::default(),
            capture: CaptureConfig::default(),
            press_trigger_key: true,
            debug_crops_dir: None,
        }
    }
}

impl AppConfig {
    /// Read and validate `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let config = if path.exists() {
            let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
                path: path.to_path_buf(),
                source: e,
            })?;
            Self::from_json(&text).map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                source: e,
            })?
        } else {
            log::warn!("⚠️ Config {:?} not found, using built-in defaults", path);
            Self::default()
        };

        config.validate()?;
        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn profile(&self) -> ConfigResult<&ResolutionProfile> {
        self.resolutions
            .get(&self.active_resolution)
            .ok_or_else(|| ConfigError::UnknownResolution(self.active_resolution.clone()))
    }

    /// Every problem at once, or `Ok`
    pub fn validate(&self) -> ConfigResult<()> {
        let mut errors = Vec::new();
        let floor = floor_confidence();

        for (name, value) in [
            ("glyph", self.thresholds.glyph),
            ("end", self.thresholds.end),
            ("status", self.thresholds.status),
            ("pm", self.thresholds.pm),
        ] {
            if !(0.0..=1.0).contains(&value) {
                errors.push(format!("thresholds.{name} must be between 0 and 1"));
            } else if value <= floor {
                errors.push(format!(
                    "thresholds.{name} must be above the no-match floor confidence {floor}"
                ));
            }
        }

        let t = &self.timing;
        for (name, range) in [
            ("command_delay", t.command_delay),
            ("status_poll", t.status_poll),
        ] {
            if range.min_ms > range.max_ms {
                errors.push(format!("timing.{name} min must not exceed max"));
            }
        }
        for (i, range) in t.capture_delays.iter().enumerate() {
            if range.min_ms > range.max_ms {
                errors.push(format!("timing.capture_delays[{i}] min must not exceed max"));
            }
        }

        if self.limits.max_retries < 1 {
            errors.push("limits.max_retries must be at least 1".to_string());
        }
        if self.limits.max_iterations < 1 {
            errors.push("limits.max_iterations must be at least 1".to_string());
        }
        if self.limits.io_attempts < 1 {
            errors.push("limits.io_attempts must be at least 1".to_string());
        }
        if self.link.baud_rate == 0 {
            errors.push("link.baud_rate must be positive".to_string());
        }

        match self.profile() {
            Ok(profile) => {
                if profile.glyph_positions.is_empty() {
                    errors.push("glyph_positions must not be empty".to_string());
                }
                if profile.glyph_size == 0 {
                    errors.push("glyph_size must be positive".to_string());
                }
                if t.capture_delays.len() != profile.glyph_positions.len() {
                    errors.push(format!(
                        "timing.capture_delays has {} entries but there are {} glyph positions",
                        t.capture_delays.len(),
                        profile.glyph_positions.len()
                    ));
                }
                if profile.status.is_empty() {
                    errors.push("status region must have a non-zero size".to_string());
                }
                if profile.end.is_empty() {
                    errors.push("end region must have a non-zero size".to_string());
                }
            }
            Err(e) => errors.push(e.to_string()),
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }

    /// Canonical template geometry for each region type in use
    pub fn region_specs(&self) -> ConfigResult<Vec<(RegionType, RegionSpec)>> {
        let profile = self.profile()?;
        let pre = &self.preprocess;

        let mut specs = vec![
            (
                RegionType::Glyph,
                RegionSpec::new(profile.glyph_size, profile.glyph_size, pre.glyph),
            ),
            (
                RegionType::End,
                RegionSpec::new(profile.end.width, profile.end.height, pre.end),
            ),
            (
                RegionType::Status,
                RegionSpec::new(profile.status.width, profile.status.height, pre.status),
            ),
        ];
        if !profile.pm.is_empty() {
            specs.push((
                RegionType::Pm,
                RegionSpec::new(profile.pm.width, profile.pm.height, pre.pm),
            ));
        }
        Ok(specs)
    }

    pub fn summary(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("Active resolution: {}\n", self.active_resolution));
        out.push_str(&format!("Templates path:    {:?}\n", self.templates_path));
        if let Ok(profile) = self.profile() {
            let positions: Vec<String> = profile
                .glyph_positions
                .iter()
                .map(|p| format!("({},{})", p.x, p.y))
                .collect();
            out.push_str(&format!(
                "Glyph crops:       {}x{} at {}\n",
                profile.glyph_size,
                profile.glyph_size,
                positions.join(" ")
            ));
            out.push_str(&format!("Status region:     {}\n", profile.status));
            out.push_str(&format!("End region:        {}\n", profile.end));
            if profile.pm.is_empty() {
                out.push_str("PM region:         disabled\n");
            } else {
                out.push_str(&format!("PM region:         {}\n", profile.pm));
            }
        }
        let th = &self.thresholds;
        out.push_str(&format!(
            "Thresholds:        glyph={} end={} status={} pm={}\n",
            th.glyph, th.end, th.status, th.pm
        ));
        out.push_str(&format!(
            "Limits:            iterations={} retries={} io_attempts={}\n",
            self.limits.max_iterations, self.limits.max_retries, self.limits.io_attempts
        ));
        out.push_str(&format!(
            "Status poll:       {}-{}ms\n",
            self.timing.status_poll.min_ms, self.timing.status_poll.max_ms
        ));
        out.push_str(&format!(
            "Command delay:     {}-{}ms\n",
            self.timing.command_delay.min_ms, self.timing.command_delay.max_ms
        ));
        let bridge = match (&self.link.port, self.link.auto_detect) {
            (Some(port), _) => port.display().to_string(),
            (None, true) => "auto-detect".to_string(),
            (None, false) => "dry-run".to_string(),
        };
        out.push_str(&format!(
            "Keyboard bridge:   {} @ {} baud\n",
            bridge, self.link.baud_rate
        ));
        out.push_str(&format!(
            "Notifications:     {}\n",
            if self.notify.enabled { "telegram" } else { "off" }
        ));
        out
    }
}

/// Flat, validated values the sequence executor and monitor consume
#[derive(Debug, Clone, PartialEq)]
pub struct AutomationSettings {
    pub glyph_regions: Vec<Region>,
    pub end_region: Region,
    pub status_region: Region,
    pub pm_region: Option<Region>,
    pub thresholds: Thresholds,
    pub timing: TimingConfig,
    pub limits: Limits,
    pub press_trigger_key: bool,
    pub debug_crops_dir: Option<PathBuf>,
}

impl AutomationSettings {
    pub fn from_config(config: &AppConfig) -> ConfigResult<Self> {
        config.validate()?;
        let profile = config.profile()?;
        let size = profile.glyph_size;

        Ok(Self {
            glyph_regions: profile
                .glyph_positions
                .iter()
                .map(|p| Region::new(p.x, p.y, size, size))
                .collect(),
            end_region: profile.end,
            status_region: profile.status,
            pm_region: (!profile.pm.is_empty()).then_some(profile.pm),
            thresholds: config.thresholds,
            timing: config.timing.clone(),
            limits: config.limits,
            press_trigger_key: config.press_trigger_key,
            debug_crops_dir: config.debug_crops_dir.clone(),
        })
    }

    pub fn capture_delay(&self, position: usize) -> DelayRange {
        self.timing
            .capture_delays
            .get(position)
            .copied()
            .unwrap_or(DelayRange::fixed(0))
    }

    pub fn io_backoff(&self) -> Duration {
        Duration::from_millis(self.timing.io_backoff_ms)
    }
}
