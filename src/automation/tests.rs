use super::*;
use crate::capture::{CaptureError, CaptureProvider, CaptureResult, Region};
use crate::config::{AppConfig, AutomationSettings, DelayRange, TimingConfig};
use crate::link::{CommandLink, KeyCommand, LinkError, LinkResult};
use crate::notify::Notifier;
use crate::template_matching::{Classification, ClassifyError, Classifier, RegionType};
use image::{DynamicImage, GrayImage};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Scripted = Result<Classification, ClassifyError>;

/// Pops one scripted answer per call; `no_match` once a script runs dry
#[derive(Default)]
struct ScriptedClassifier {
    scripts: Mutex<HashMap<RegionType, VecDeque<Scripted>>>,
    calls: Mutex<Vec<RegionType>>,
}

impl ScriptedClassifier {
    fn new() -> Self {
        Self::default()
    }

    fn script(self, region_type: RegionType, answers: &[(&str, f32)]) -> Self {
        {
            let mut scripts = self.scripts.lock().unwrap();
            let queue = scripts.entry(region_type).or_default();
            for (label, confidence) in answers {
                queue.push_back(Ok(Classification::new(*label, *confidence)));
            }
        }
        self
    }

    fn fail(self, region_type: RegionType) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(region_type)
            .or_default()
            .push_back(Err(ClassifyError::NoTemplates(region_type)));
        self
    }

    fn calls_for(&self, region_type: RegionType) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|r| **r == region_type)
            .count()
    }
}

impl Classifier for ScriptedClassifier {
    fn classify(
        &self,
        region_type: RegionType,
        _image: &GrayImage,
    ) -> Result<Classification, ClassifyError> {
        self.calls.lock().unwrap().push(region_type);
        self.scripts
            .lock()
            .unwrap()
            .get_mut(&region_type)
            .and_then(|q| q.pop_front())
            .unwrap_or_else(|| Ok(Classification::no_match()))
    }
}

#[derive(Default)]
struct StubCapture {
    failures_left: u32,
    calls: u32,
}

impl StubCapture {
    fn failing(failures: u32) -> Self {
        Self {
            failures_left: failures,
            calls: 0,
        }
    }
}

impl CaptureProvider for StubCapture {
    async fn capture_region(&mut self, region: &Region) -> CaptureResult<DynamicImage> {
        self.calls += 1;
        if self.failures_left > 0 {
            self.failures_left -= 1;
            return Err(CaptureError::Backend {
                description: "frame grab failed".to_string(),
            });
        }
        Ok(DynamicImage::ImageLuma8(GrayImage::new(
            region.width.max(1),
            region.height.max(1),
        )))
    }
}

#[derive(Default)]
struct RecordingLink {
    sent: Vec<KeyCommand>,
    failures_left: u32,
}

impl CommandLink for RecordingLink {
    async fn send(&mut self, command: KeyCommand) -> LinkResult<()> {
        if self.failures_left > 0 {
            self.failures_left -= 1;
            return Err(LinkError::Rejected { command });
        }
        self.sent.push(command);
        Ok(())
    }
}

fn fast_settings() -> AutomationSettings {
    let mut settings = AutomationSettings::from_config(&AppConfig::default()).unwrap();
    settings.timing = TimingConfig {
        initial_delay_ms: 0,
        capture_delays: vec![DelayRange::fixed(0); 3],
        command_delay: DelayRange::fixed(0),
        status_initial_wait_ms: 0,
        status_poll: DelayRange::fixed(0),
        trigger_debounce_ms: 0,
        stop_grace_ms: 0,
        io_backoff_ms: 0,
    };
    settings.pm_region = None;
    settings
}

async fn monitor(
    classifier: &ScriptedClassifier,
    settings: &AutomationSettings,
    link: &mut RecordingLink,
) -> SessionReport {
    let flags = ControlFlags::new();
    let notifier = Notifier::disabled();
    let mut capture = StubCapture::default();
    MonitoringStateMachine::new(classifier, &flags, settings, &notifier)
        .run(&mut capture, link, flags.epoch())
        .await
}

#[tokio::test]
async fn test_sequence_sends_confident_glyphs_in_order() {
    let classifier = ScriptedClassifier::new().script(
        RegionType::Glyph,
        &[("q", 0.9), ("e", 0.8), ("q", 0.3)],
    );
    let flags = ControlFlags::new();
    let settings = fast_settings();
    let mut capture = StubCapture::default();
    let mut link = RecordingLink::default();

    let report = SequenceExecutor::new(&classifier, &flags, &settings)
        .run(&mut capture, &mut link, flags.epoch())
        .await;

    assert_eq!(link.sent, vec![KeyCommand::Q, KeyCommand::E]);
    assert_eq!(report.sent_count(), 2);
    assert!(matches!(report.steps[2], StepOutcome::BelowThreshold(_)));
    assert!(!report.skip_monitoring);
}

#[tokio::test]
async fn test_sequence_logs_every_classified_crop_next_to_debug_crops() {
    let tmp = tempfile::TempDir::new().unwrap();
    let classifier = ScriptedClassifier::new().script(
        RegionType::Glyph,
        &[("q", 0.9), ("alt", 0.85), ("e", 0.4)],
    );
    let flags = ControlFlags::new();
    let mut settings = fast_settings();
    settings.debug_crops_dir = Some(tmp.path().join("crops"));
    let mut capture = StubCapture::default();
    let mut link = RecordingLink::default();

    SequenceExecutor::new(&classifier, &flags, &settings)
        .run(&mut capture, &mut link, flags.epoch())
        .await;

    let log = crate::prediction_log::PredictionLog::in_dir(&tmp.path().join("crops"));
    let records = log.read_all().unwrap();
    let rows: Vec<(Option<usize>, &str)> = records
        .iter()
        .map(|r| (r.position, r.label.as_str()))
        .collect();
    assert_eq!(rows, vec![(Some(0), "q"), (Some(1), "alt"), (Some(2), "e")]);
    assert!((records[2].confidence - 0.4).abs() < 1e-6);
    for record in &records {
        assert_eq!(record.region, RegionType::Glyph);
        assert!(std::path::Path::new(&record.file).is_file(), "{}", record.file);
        assert!(chrono::DateTime::parse_from_rfc3339(&record.timestamp).is_ok());
    }
}

#[tokio::test]
async fn test_sequence_continues_after_abandoned_capture() {
    let classifier =
        ScriptedClassifier::new().script(RegionType::Glyph, &[("e", 0.9), ("q", 0.9)]);
    let flags = ControlFlags::new();
    let settings = fast_settings();
    let mut capture = StubCapture::failing(settings.limits.io_attempts);
    let mut link = RecordingLink::default();

    let report = SequenceExecutor::new(&classifier, &flags, &settings)
        .run(&mut capture, &mut link, flags.epoch())
        .await;

    assert_eq!(report.steps[0], StepOutcome::CaptureFailed);
    assert_eq!(link.sent, vec![KeyCommand::E, KeyCommand::Q]);
    assert_eq!(capture.calls, settings.limits.io_attempts + 2);
}

#[tokio::test]
async fn test_sequence_retries_command_link() {
    let classifier = ScriptedClassifier::new().script(RegionType::Glyph, &[("q", 0.95)]);
    let flags = ControlFlags::new();
    let mut settings = fast_settings();
    settings.glyph_regions.truncate(1);
    let mut capture = StubCapture::default();
    let mut link = RecordingLink {
        failures_left: 2,
        ..Default::default()
    };

    let report = SequenceExecutor::new(&classifier, &flags, &settings)
        .run(&mut capture, &mut link, flags.epoch())
        .await;
    assert!(report.steps[0].is_sent());
    assert_eq!(link.sent, vec![KeyCommand::Q]);

    // Exhausted retries abandon the step
    let classifier = ScriptedClassifier::new().script(RegionType::Glyph, &[("e", 0.95)]);
    let mut link = RecordingLink {
        failures_left: 10,
        ..Default::default()
    };
    let report = SequenceExecutor::new(&classifier, &flags, &settings)
        .run(&mut capture, &mut link, flags.epoch())
        .await;
    assert!(matches!(report.steps[0], StepOutcome::SendFailed(_)));
}

#[tokio::test]
async fn test_stop_after_sequence_is_consumed_once() {
    let classifier = ScriptedClassifier::new();
    let flags = ControlFlags::new();
    let settings = fast_settings();
    let mut capture = StubCapture::default();
    let mut link = RecordingLink::default();
    let executor = SequenceExecutor::new(&classifier, &flags, &settings);

    flags.request_stop_after_sequence();
    let first = executor.run(&mut capture, &mut link, flags.epoch()).await;
    let second = executor.run(&mut capture, &mut link, flags.epoch()).await;

    assert!(first.skip_monitoring);
    assert!(!second.skip_monitoring);
    assert!(!flags.stop_after_sequence_armed());
}

#[tokio::test]
async fn test_scenario_end_detected_on_third_iteration() {
    let classifier = ScriptedClassifier::new()
        .script(RegionType::End, &[("end", 0.45), ("end", 0.48), ("end", 0.89)])
        .script(RegionType::Status, &[("wait", 0.92), ("wait", 0.92)]);
    let settings = fast_settings();
    let mut link = RecordingLink::default();
    let flags = ControlFlags::new();
    let (notifier, mut rx) = Notifier::channel();
    let mut capture = StubCapture::default();

    let report = MonitoringStateMachine::new(&classifier, &flags, &settings, &notifier)
        .run(&mut capture, &mut link, flags.epoch())
        .await;

    assert_eq!(report.outcome, SessionOutcome::EndDetected);
    assert_eq!(report.iterations, 3);
    assert_eq!(report.retriggers, 0);
    assert!(link.sent.is_empty());
    assert_eq!(classifier.calls_for(RegionType::Status), 2);
    assert!(rx.try_recv().unwrap().contains("End detected"));
}

#[tokio::test]
async fn test_end_outranks_alt_in_the_same_iteration() {
    let classifier = ScriptedClassifier::new()
        .script(RegionType::End, &[("end", 0.95)])
        .script(RegionType::Status, &[("alt", 0.99)]);
    let settings = fast_settings();
    let mut link = RecordingLink::default();

    let report = monitor(&classifier, &settings, &mut link).await;

    assert_eq!(report.outcome, SessionOutcome::EndDetected);
    assert_eq!(report.retriggers, 0);
    assert_eq!(classifier.calls_for(RegionType::Status), 0);
    assert!(link.sent.is_empty());
}

#[tokio::test]
async fn test_scenario_alt_retriggers_once_then_keeps_monitoring() {
    let classifier = ScriptedClassifier::new()
        .script(
            RegionType::Status,
            &[("wait", 0.92), ("alt", 0.85), ("wait", 0.90)],
        )
        .script(RegionType::Glyph, &[("q", 0.9), ("q", 0.9), ("e", 0.9)]);
    let settings = fast_settings();
    let mut link = RecordingLink::default();

    let report = monitor(&classifier, &settings, &mut link).await;

    assert_eq!(report.retriggers, 1);
    assert_eq!(
        link.sent,
        vec![KeyCommand::Alt, KeyCommand::Q, KeyCommand::Q, KeyCommand::E]
    );
    // wait, alt, wait, then the scripted statuses run out
    assert_eq!(report.outcome, SessionOutcome::RetryCeiling);
    assert_eq!(report.iterations, 3 + settings.limits.max_retries);
}

#[tokio::test]
async fn test_scenario_retry_ceiling_before_iteration_ceiling() {
    let classifier = ScriptedClassifier::new();
    let mut settings = fast_settings();
    settings.limits.max_retries = 5;
    let mut link = RecordingLink::default();

    let report = monitor(&classifier, &settings, &mut link).await;

    assert_eq!(report.outcome, SessionOutcome::RetryCeiling);
    assert_eq!(report.iterations, 5);
}

#[tokio::test]
async fn test_retry_counter_increments_by_one_and_resets() {
    let classifier = ScriptedClassifier::new().script(
        RegionType::Status,
        &[
            ("no_match", 0.0),
            ("wait", 0.4),
            ("wait", 0.9),
            ("alt", 0.3),
            ("alt", 0.9),
        ],
    );
    let mut settings = fast_settings();
    settings.limits.max_retries = 10;
    let flags = ControlFlags::new();
    let notifier = Notifier::disabled();
    let mut capture = StubCapture::default();
    let mut machine = MonitoringStateMachine::new(&classifier, &flags, &settings, &notifier);

    let mut counts = Vec::new();
    let mut transitions = Vec::new();
    for _ in 0..5 {
        transitions.push(machine.iterate(&mut capture).await);
        counts.push(machine.state().no_match_retry_count);
    }

    // A low-confidence wait or alt is a no_match
    assert_eq!(counts, vec![1, 2, 0, 1, 0]);
    assert_eq!(transitions[4], Transition::Retrigger);
}

#[tokio::test]
async fn test_iteration_ceiling_forces_terminate() {
    let waits = vec![("wait", 0.95_f32); 20];
    let classifier = ScriptedClassifier::new().script(RegionType::Status, &waits);
    let mut settings = fast_settings();
    settings.limits.max_iterations = 4;
    let mut link = RecordingLink::default();

    let report = monitor(&classifier, &settings, &mut link).await;

    assert_eq!(report.outcome, SessionOutcome::IterationCeiling);
    assert_eq!(report.iterations, 4);
    assert_eq!(classifier.calls_for(RegionType::End), 4);
    assert_eq!(classifier.calls_for(RegionType::Status), 4);
}

#[tokio::test]
async fn test_alt_streak_is_bounded_by_iteration_ceiling() {
    let alts = vec![("alt", 0.95_f32); 100];
    let classifier = ScriptedClassifier::new().script(RegionType::Status, &alts);
    let mut settings = fast_settings();
    settings.limits.max_iterations = 6;
    let mut link = RecordingLink::default();

    let report = monitor(&classifier, &settings, &mut link).await;

    assert_eq!(report.outcome, SessionOutcome::IterationCeiling);
    assert_eq!(report.retriggers, 6);
}

#[tokio::test]
async fn test_end_failure_counts_as_no_match() {
    let classifier = ScriptedClassifier::new()
        .fail(RegionType::End)
        .script(RegionType::Status, &[("wait", 0.9)]);
    let settings = fast_settings();
    let flags = ControlFlags::new();
    let notifier = Notifier::disabled();
    let mut capture = StubCapture::default();
    let mut machine = MonitoringStateMachine::new(&classifier, &flags, &settings, &notifier);

    let transition = machine.iterate(&mut capture).await;

    assert_eq!(transition, Transition::Continue);
    assert_eq!(machine.state().no_match_retry_count, 1);
    assert_eq!(classifier.calls_for(RegionType::Status), 0);
}

#[tokio::test]
async fn test_capture_failure_counts_as_no_match() {
    let classifier = ScriptedClassifier::new();
    let settings = fast_settings();
    let flags = ControlFlags::new();
    let notifier = Notifier::disabled();
    let mut capture = StubCapture::failing(u32::MAX);
    let mut machine = MonitoringStateMachine::new(&classifier, &flags, &settings, &notifier);

    assert_eq!(machine.iterate(&mut capture).await, Transition::Continue);
    assert_eq!(machine.state().no_match_retry_count, 1);
    assert_eq!(capture.calls, settings.limits.io_attempts);
    assert_eq!(classifier.calls_for(RegionType::End), 0);
}

#[tokio::test]
async fn test_pm_notifies_once_per_session() {
    let classifier = ScriptedClassifier::new()
        .script(RegionType::Pm, &[("pm", 0.9), ("pm", 0.9), ("pm", 0.9)])
        .script(RegionType::Status, &[("wait", 0.9), ("wait", 0.9)]);
    let mut settings = fast_settings();
    settings.pm_region = Some(Region::new(28, 23, 14, 143));
    settings.limits.max_retries = 1;
    let flags = ControlFlags::new();
    let (notifier, mut rx) = Notifier::channel();
    let mut capture = StubCapture::default();
    let mut link = RecordingLink::default();

    let report = MonitoringStateMachine::new(&classifier, &flags, &settings, &notifier)
        .run(&mut capture, &mut link, flags.epoch())
        .await;

    assert_eq!(report.outcome, SessionOutcome::RetryCeiling);
    assert_eq!(report.iterations, 3);
    let mut messages = Vec::new();
    while let Ok(message) = rx.try_recv() {
        messages.push(message);
    }
    assert_eq!(
        messages.iter().filter(|m| m.contains("Private message")).count(),
        1
    );
    assert_eq!(classifier.calls_for(RegionType::Pm), 1);
}

#[tokio::test]
async fn test_stop_from_another_thread_exits_monitoring() {
    let classifier = ScriptedClassifier::new();
    let mut settings = fast_settings();
    settings.limits.max_retries = u32::MAX;
    settings.limits.max_iterations = u32::MAX;
    settings.timing.status_poll = DelayRange::fixed(10);
    let flags = ControlFlags::new();
    let notifier = Notifier::disabled();
    let mut capture = StubCapture::default();
    let mut link = RecordingLink::default();

    let remote = flags.clone();
    let stopper = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(50));
        remote.request_stop();
        std::thread::sleep(Duration::from_millis(5));
        remote.resume();
    });

    let mut machine = MonitoringStateMachine::new(&classifier, &flags, &settings, &notifier);
    let report = tokio::time::timeout(
        Duration::from_secs(5),
        machine.run(&mut capture, &mut link, flags.epoch()),
    )
    .await
    .expect("monitoring did not observe the stop");
    stopper.join().unwrap();

    assert_eq!(report.outcome, SessionOutcome::Stopped);
    assert!(flags.is_running());
}

fn automation(
    classifier: ScriptedClassifier,
    flags: ControlFlags,
) -> (
    GlyphAutomation<StubCapture, RecordingLink>,
    tokio::sync::mpsc::Sender<AutomationCommand>,
    tokio::sync::mpsc::Receiver<AutomationEvent>,
) {
    let (cmd_tx, cmd_rx, event_tx, event_rx) =
        create_automation_channels(COMMAND_CHANNEL_CAPACITY, EVENT_CHANNEL_CAPACITY);
    let automation = GlyphAutomation::new(
        StubCapture::default(),
        RecordingLink::default(),
        Arc::new(classifier),
        fast_settings(),
        flags,
        Notifier::disabled(),
        cmd_rx,
        event_tx,
    );
    (automation, cmd_tx, event_rx)
}

#[tokio::test]
async fn test_trigger_runs_full_cycle_and_drops_queued_triggers() {
    let classifier = ScriptedClassifier::new()
        .script(RegionType::Glyph, &[("q", 0.9), ("e", 0.9), ("q", 0.9)])
        .script(RegionType::End, &[("end", 0.95)]);
    let (mut automation, cmd_tx, mut event_rx) = automation(classifier, ControlFlags::new());

    cmd_tx.send(AutomationCommand::Trigger).await.unwrap();
    cmd_tx.send(AutomationCommand::Trigger).await.unwrap();
    cmd_tx.send(AutomationCommand::Shutdown).await.unwrap();
    automation.run().await;

    assert_eq!(
        automation.link().sent,
        vec![KeyCommand::Alt, KeyCommand::Q, KeyCommand::E, KeyCommand::Q]
    );
    assert_eq!(automation.state(), AutomationState::Stopped);

    let mut states = Vec::new();
    let mut session = None;
    while let Ok(event) = event_rx.try_recv() {
        match event {
            AutomationEvent::StateChanged(state) => states.push(state),
            AutomationEvent::SessionFinished(report) => session = Some(report),
            _ => {}
        }
    }
    assert_eq!(
        states,
        vec![
            AutomationState::Sequencing,
            AutomationState::Monitoring,
            AutomationState::Idle,
            AutomationState::Stopped,
        ]
    );
    assert_eq!(session.unwrap().outcome, SessionOutcome::EndDetected);
}

#[tokio::test]
async fn test_stop_after_sequence_skips_monitoring() {
    let flags = ControlFlags::new();
    flags.request_stop_after_sequence();
    let (mut automation, _cmd_tx, _event_rx) = automation(ScriptedClassifier::new(), flags);

    let report = automation.run_cycle().await;

    assert_eq!(report.outcome, SessionOutcome::SkippedAfterSequence);
    assert_eq!(report.iterations, 0);
    assert_eq!(automation.state(), AutomationState::Idle);
}

#[tokio::test]
async fn test_trigger_ignored_during_stop_grace() {
    let flags = ControlFlags::new();
    flags.request_stop();
    let (mut automation, cmd_tx, _event_rx) = automation(ScriptedClassifier::new(), flags);

    cmd_tx.send(AutomationCommand::Trigger).await.unwrap();
    cmd_tx.send(AutomationCommand::Shutdown).await.unwrap();
    automation.run().await;

    assert!(automation.link().sent.is_empty());
}

#[tokio::test]
async fn test_channel_capacities_are_honoured() {
    let (cmd_tx, mut cmd_rx, event_tx, _event_rx) = create_automation_channels(1, 0);

    cmd_tx.try_send(AutomationCommand::Trigger).unwrap();
    assert!(matches!(
        cmd_tx.try_send(AutomationCommand::Trigger),
        Err(tokio::sync::mpsc::error::TrySendError::Full(_))
    ));
    assert_eq!(cmd_rx.recv().await, Some(AutomationCommand::Trigger));

    // A zero capacity is raised to one slot
    event_tx
        .try_send(AutomationEvent::StateChanged(AutomationState::Idle))
        .unwrap();
    assert!(event_tx
        .try_send(AutomationEvent::StateChanged(AutomationState::Idle))
        .is_err());
}
