//! Priority-ordered monitoring loop.
//!
//! Every iteration checks the `end` region first, then (optionally) the `pm`
//! region, then the `status` region. `end` always wins: a persistent `alt` or
//! `wait` can never starve termination. An `alt` re-runs the glyph sequence
//! inline and monitoring resumes with the same counters, so an alt streak is
//! bounded by the iteration ceiling instead of growing the stack.

use super::flags::ControlFlags;
use super::sequence::{SequenceExecutor, capture_with_retry, send_with_retry};
use super::types::{SessionOutcome, SessionReport, SessionState};
use crate::capture::{CaptureProvider, Region};
use crate::config::AutomationSettings;
use crate::link::{CommandLink, KeyCommand};
use crate::notify::Notifier;
use crate::template_matching::{Classification, Classifier, RegionType};
use std::time::Duration;
use tokio::time::sleep;

/// Decision taken at the end of one iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Continue,
    Retrigger,
    Terminate(SessionOutcome),
}

pub struct MonitoringStateMachine<'a> {
    classifier: &'a dyn Classifier,
    flags: &'a ControlFlags,
    settings: &'a AutomationSettings,
    notifier: &'a Notifier,
    state: SessionState,
    retriggers: u32,
    pm_notified: bool,
}

impl<'a> MonitoringStateMachine<'a> {
    pub fn new(
        classifier: &'a dyn Classifier,
        flags: &'a ControlFlags,
        settings: &'a AutomationSettings,
        notifier: &'a Notifier,
    ) -> Self {
        Self {
            classifier,
            flags,
            settings,
            notifier,
            state: SessionState::default(),
            retriggers: 0,
            pm_notified: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Monitor until a terminal outcome. Always returns; the caller goes idle.
    pub async fn run<C, L>(&mut self, capture: &mut C, link: &mut L, epoch: u64) -> SessionReport
    where
        C: CaptureProvider,
        L: CommandLink,
    {
        let max_iterations = self.settings.limits.max_iterations;
        log::info!("👀 Monitoring started (max {} iterations)", max_iterations);

        let outcome = loop {
            if !self.flags.still_running(epoch) {
                log::info!("🛑 Monitoring stopped by emergency stop");
                break SessionOutcome::Stopped;
            }
            if self.state.iteration_count >= max_iterations {
                log::warn!("⚠️ Iteration ceiling {} reached", max_iterations);
                break SessionOutcome::IterationCeiling;
            }
            self.state.iteration_count += 1;

            match self.iterate(capture).await {
                Transition::Continue => {}
                Transition::Terminate(outcome) => break outcome,
                Transition::Retrigger => {
                    if self.retrigger(capture, link, epoch).await {
                        break SessionOutcome::SkippedAfterSequence;
                    }
                    sleep(Duration::from_millis(
                        self.settings.timing.status_initial_wait_ms,
                    ))
                    .await;
                    continue;
                }
            }

            sleep(self.settings.timing.status_poll.sample()).await;
        };

        match outcome {
            SessionOutcome::EndDetected | SessionOutcome::Stopped => {}
            other => self.notifier.notify(format!("⚠️ Monitoring ended: {other}")),
        }

        let report = SessionReport {
            outcome,
            iterations: self.state.iteration_count,
            retriggers: self.retriggers,
        };
        log::info!(
            "🏁 Monitoring finished: {} after {} iterations ({} re-triggers)",
            report.outcome,
            report.iterations,
            report.retriggers
        );
        report
    }

    /// One end/status check pair
    pub async fn iterate<C: CaptureProvider>(&mut self, capture: &mut C) -> Transition {
        let iteration = self.state.iteration_count;
        let thresholds = self.settings.thresholds;

        let Some(end) = self
            .check(capture, RegionType::End, self.settings.end_region)
            .await
        else {
            return self.register_no_match();
        };
        if end.accepts("end", thresholds.end) {
            log::info!("🏁 Iteration {}: end detected {}", iteration, end);
            self.notifier
                .notify(format!("🏁 End detected ({:.2})", end.confidence));
            return Transition::Terminate(SessionOutcome::EndDetected);
        }

        if let Some(pm_region) = self.settings.pm_region {
            self.check_pm(capture, pm_region).await;
        }

        let Some(status) = self
            .check(capture, RegionType::Status, self.settings.status_region)
            .await
        else {
            return self.register_no_match();
        };
        log::debug!("📊 Iteration {}: end {} / status {}", iteration, end, status);

        if status.accepts("wait", thresholds.status) {
            self.state.no_match_retry_count = 0;
            Transition::Continue
        } else if status.accepts("alt", thresholds.status) {
            self.state.no_match_retry_count = 0;
            log::info!("🔁 Iteration {}: alt detected {}", iteration, status);
            Transition::Retrigger
        } else {
            self.register_no_match()
        }
    }

    fn register_no_match(&mut self) -> Transition {
        self.state.no_match_retry_count += 1;
        let max_retries = self.settings.limits.max_retries;
        log::info!(
            "❓ No match ({}/{})",
            self.state.no_match_retry_count,
            max_retries
        );
        if self.state.no_match_retry_count >= max_retries {
            Transition::Terminate(SessionOutcome::RetryCeiling)
        } else {
            Transition::Continue
        }
    }

    /// Capture and classify; every failure becomes `None`
    async fn check<C: CaptureProvider>(
        &self,
        capture: &mut C,
        region_type: RegionType,
        region: Region,
    ) -> Option<Classification> {
        let image = match capture_with_retry(
            capture,
            &region,
            self.settings.limits.io_attempts,
            self.settings.io_backoff(),
        )
        .await
        {
            Ok(image) => image.to_luma8(),
            Err(e) => {
                log::warn!("⚠️ {} region capture failed: {}", region_type, e);
                return None;
            }
        };

        match self.classifier.classify(region_type, &image) {
            Ok(c) => Some(c),
            Err(e) => {
                log::warn!("⚠️ {} region classification failed: {}", region_type, e);
                None
            }
        }
    }

    async fn check_pm<C: CaptureProvider>(&mut self, capture: &mut C, region: Region) {
        if self.pm_notified {
            return;
        }
        let Some(pm) = self.check(capture, RegionType::Pm, region).await else {
            return;
        };
        if pm.accepts("pm", self.settings.thresholds.pm) {
            log::info!("💬 Private message detected {}", pm);
            self.notifier.notify("💬 Private message detected");
            self.pm_notified = true;
        }
    }

    /// Returns true when the re-run sequence asks to skip monitoring
    async fn retrigger<C, L>(&mut self, capture: &mut C, link: &mut L, epoch: u64) -> bool
    where
        C: CaptureProvider,
        L: CommandLink,
    {
        self.retriggers += 1;
        let limits = &self.settings.limits;
        if let Err(e) = send_with_retry(
            link,
            KeyCommand::Alt,
            limits.io_attempts,
            self.settings.io_backoff(),
        )
        .await
        {
            log::error!("❌ Re-trigger key not delivered: {}", e);
        }

        let report = SequenceExecutor::new(self.classifier, self.flags, self.settings)
            .run(capture, link, epoch)
            .await;
        report.skip_monitoring
    }
}
