// Glyph sequence: capture -> classify -> command, once per position
use super::flags::ControlFlags;
use super::types::{SequenceReport, StepOutcome};
use crate::capture::{CaptureProvider, CaptureResult, Region};
use crate::config::AutomationSettings;
use crate::link::{CommandLink, KeyCommand, LinkResult};
use crate::prediction_log::{PredictionLog, PredictionRecord};
use crate::template_matching::{Classification, Classifier, RegionType};
use chrono::{DateTime, Local};
use image::{DynamicImage, GrayImage};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::sleep;

/// Capture `region`, retrying up to `attempts` times with a fixed backoff
pub(crate) async fn capture_with_retry<C: CaptureProvider>(
    capture: &mut C,
    region: &Region,
    attempts: u32,
    backoff: Duration,
) -> CaptureResult<DynamicImage> {
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match capture.capture_region(region).await {
            Ok(image) => return Ok(image),
            Err(e) if attempt < attempts => {
                log::warn!(
                    "⚠️ Capture of {} failed (attempt {}/{}): {}",
                    region,
                    attempt,
                    attempts,
                    e
                );
                sleep(backoff).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Send `command`, retrying up to `attempts` times with a fixed backoff
pub(crate) async fn send_with_retry<L: CommandLink>(
    link: &mut L,
    command: KeyCommand,
    attempts: u32,
    backoff: Duration,
) -> LinkResult<()> {
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match link.send(command).await {
            Ok(()) => return Ok(()),
            Err(e) if attempt < attempts => {
                log::warn!(
                    "⚠️ Sending {} failed (attempt {}/{}): {}",
                    command,
                    attempt,
                    attempts,
                    e
                );
                sleep(backoff).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

fn save_debug_crop(
    dir: &Path,
    position: usize,
    crop: &GrayImage,
    at: DateTime<Local>,
) -> Option<PathBuf> {
    let stamp = at.format("%Y%m%d_%H%M%S_%3f");
    let path = dir.join(format!("glyph_{stamp}_{position}.png"));
    if let Err(e) = std::fs::create_dir_all(dir) {
        log::warn!("⚠️ Could not create debug crop directory {:?}: {}", dir, e);
        return None;
    }
    match crop.save(&path) {
        Ok(()) => Some(path),
        Err(e) => {
            log::warn!("⚠️ Could not save debug crop {:?}: {}", path, e);
            None
        }
    }
}

fn log_prediction(
    dir: &Path,
    crop_path: &Path,
    position: usize,
    classification: &Classification,
    at: DateTime<Local>,
) {
    let record = PredictionRecord::new(
        crop_path,
        Some(position),
        RegionType::Glyph,
        classification,
        at,
    );
    let results = PredictionLog::in_dir(dir);
    if let Err(e) = results.append(&[record]) {
        log::warn!("⚠️ Could not append to {:?}: {}", results.path(), e);
    }
}

pub struct SequenceExecutor<'a> {
    classifier: &'a dyn Classifier,
    flags: &'a ControlFlags,
    settings: &'a AutomationSettings,
}

impl<'a> SequenceExecutor<'a> {
    pub fn new(
        classifier: &'a dyn Classifier,
        flags: &'a ControlFlags,
        settings: &'a AutomationSettings,
    ) -> Self {
        Self {
            classifier,
            flags,
            settings,
        }
    }

    /// Run every glyph position in order. A failed position is logged and
    /// skipped; the cycle itself never fails.
    pub async fn run<C, L>(&self, capture: &mut C, link: &mut L, epoch: u64) -> SequenceReport
    where
        C: CaptureProvider,
        L: CommandLink,
    {
        if self.flags.stop_after_sequence_armed() {
            log::info!("⏭️ Stop-after-sequence is armed; monitoring will be skipped");
        }

        sleep(Duration::from_millis(self.settings.timing.initial_delay_ms)).await;

        let positions = self.settings.glyph_regions.len();
        let mut steps = Vec::with_capacity(positions);
        for (position, region) in self.settings.glyph_regions.iter().enumerate() {
            if !self.flags.still_running(epoch) {
                log::info!("🛑 Sequence aborted by emergency stop at position {}", position + 1);
                steps.resize(positions, StepOutcome::Aborted);
                break;
            }

            sleep(self.settings.capture_delay(position).sample()).await;
            let outcome = self.run_step(capture, link, position, region).await;
            log::debug!("🔤 Glyph {}/{}: {:?}", position + 1, positions, outcome);
            steps.push(outcome);
        }

        let skip_monitoring = self.flags.take_stop_after_sequence();
        let report = SequenceReport {
            steps,
            skip_monitoring,
        };
        log::info!(
            "✅ Sequence finished: {}/{} commands sent",
            report.sent_count(),
            positions
        );
        report
    }

    async fn run_step<C, L>(
        &self,
        capture: &mut C,
        link: &mut L,
        position: usize,
        region: &Region,
    ) -> StepOutcome
    where
        C: CaptureProvider,
        L: CommandLink,
    {
        let limits = &self.settings.limits;
        let backoff = self.settings.io_backoff();

        let crop = match capture_with_retry(capture, region, limits.io_attempts, backoff).await {
            Ok(image) => image.to_luma8(),
            Err(e) => {
                log::error!("❌ Glyph {} capture abandoned: {}", position + 1, e);
                return StepOutcome::CaptureFailed;
            }
        };

        let captured_at = Local::now();
        let crop_path = self
            .settings
            .debug_crops_dir
            .as_deref()
            .and_then(|dir| save_debug_crop(dir, position, &crop, captured_at));

        let classification: Classification =
            match self.classifier.classify(RegionType::Glyph, &crop) {
                Ok(c) => c,
                Err(e) => {
                    log::error!("❌ Glyph {} classification failed: {}", position + 1, e);
                    return StepOutcome::ClassifyFailed;
                }
            };
        if let (Some(dir), Some(path)) = (&self.settings.debug_crops_dir, &crop_path) {
            log_prediction(dir, path, position, &classification, captured_at);
        }

        let threshold = self.settings.thresholds.glyph;
        let command = match KeyCommand::from_glyph(&classification.label) {
            Some(command) if classification.confidence >= threshold => command,
            _ => {
                log::info!(
                    "🔍 Glyph {}: {} below threshold {}",
                    position + 1,
                    classification,
                    threshold
                );
                return StepOutcome::BelowThreshold(classification);
            }
        };

        sleep(self.settings.timing.command_delay.sample()).await;
        match send_with_retry(link, command, limits.io_attempts, backoff).await {
            Ok(()) => {
                log::info!("⌨️ Glyph {}: {} -> {}", position + 1, classification, command);
                StepOutcome::Sent(classification)
            }
            Err(e) => {
                log::error!("❌ Glyph {} command abandoned: {}", position + 1, e);
                StepOutcome::SendFailed(classification)
            }
        }
    }
}
