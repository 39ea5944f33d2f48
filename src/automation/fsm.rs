// Trigger-driven state machine: idle -> sequence -> monitoring -> idle
use super::flags::ControlFlags;
use super::monitor::MonitoringStateMachine;
use super::sequence::{SequenceExecutor, send_with_retry};
use super::types::{
    AutomationCommand, AutomationEvent, AutomationState, SessionOutcome, SessionReport,
};
use crate::capture::CaptureProvider;
use crate::config::AutomationSettings;
use crate::link::{CommandLink, KeyCommand};
use crate::notify::Notifier;
use crate::template_matching::Classifier;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{Duration, sleep};

/// Triggers beyond this many queued are refused by the input listener
pub const COMMAND_CHANNEL_CAPACITY: usize = 32;
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

pub type AutomationChannels = (
    mpsc::Sender<AutomationCommand>,
    mpsc::Receiver<AutomationCommand>,
    mpsc::Sender<AutomationEvent>,
    mpsc::Receiver<AutomationEvent>,
);

/// Command and event channels between the input side and [`GlyphAutomation`].
/// Event senders wait when the event queue is full, so a consumer must keep
/// draining it.
pub fn create_automation_channels(
    command_capacity: usize,
    event_capacity: usize,
) -> AutomationChannels {
    let (cmd_tx, cmd_rx) = mpsc::channel(command_capacity.max(1));
    let (event_tx, event_rx) = mpsc::channel(event_capacity.max(1));
    (cmd_tx, cmd_rx, event_tx, event_rx)
}

pub struct GlyphAutomation<C, L> {
    state: AutomationState,
    capture: C,
    link: L,
    classifier: Arc<dyn Classifier>,
    settings: AutomationSettings,
    flags: ControlFlags,
    notifier: Notifier,
    command_rx: mpsc::Receiver<AutomationCommand>,
    event_tx: mpsc::Sender<AutomationEvent>,
    should_exit: bool,
}

impl<C, L> GlyphAutomation<C, L>
where
    C: CaptureProvider,
    L: CommandLink,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        capture: C,
        link: L,
        classifier: Arc<dyn Classifier>,
        settings: AutomationSettings,
        flags: ControlFlags,
        notifier: Notifier,
        command_rx: mpsc::Receiver<AutomationCommand>,
        event_tx: mpsc::Sender<AutomationEvent>,
    ) -> Self {
        Self {
            state: AutomationState::Idle,
            capture,
            link,
            classifier,
            settings,
            flags,
            notifier,
            command_rx,
            event_tx,
            should_exit: false,
        }
    }

    pub fn state(&self) -> AutomationState {
        self.state
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    async fn change_state(&mut self, new_state: AutomationState) {
        if self.state != new_state {
            log::debug!("🎮 Automation state: {:?} -> {:?}", self.state, new_state);
            self.state = new_state;
            let _ = self
                .event_tx
                .send(AutomationEvent::StateChanged(new_state))
                .await;
        }
    }

    async fn process_command(&mut self, command: AutomationCommand) {
        log::debug!("🤖 Processing automation command: {:?}", command);
        match command {
            AutomationCommand::Trigger => {
                if !self.flags.is_running() {
                    log::info!("⏸️ Trigger ignored while an emergency stop is settling");
                    return;
                }
                self.run_cycle().await;
                self.drop_queued_triggers();
            }
            AutomationCommand::Shutdown => {
                self.should_exit = true;
                log::info!("🛑 Glyph automation shutting down");
            }
        }
    }

    /// Triggers that arrived while a cycle ran are stale
    fn drop_queued_triggers(&mut self) {
        while let Ok(command) = self.command_rx.try_recv() {
            match command {
                AutomationCommand::Trigger => {
                    log::info!("🚫 Dropping trigger received during a running cycle")
                }
                AutomationCommand::Shutdown => self.should_exit = true,
            }
        }
    }

    /// One full trigger cycle. Always ends in `Idle`.
    pub async fn run_cycle(&mut self) -> SessionReport {
        let epoch = self.flags.epoch();
        self.change_state(AutomationState::Sequencing).await;
        log::info!("🚀 Trigger received, running glyph sequence");

        if self.settings.press_trigger_key {
            if let Err(e) = send_with_retry(
                &mut self.link,
                KeyCommand::Alt,
                self.settings.limits.io_attempts,
                self.settings.io_backoff(),
            )
            .await
            {
                log::error!("❌ Trigger key not delivered: {}", e);
                let _ = self
                    .event_tx
                    .send(AutomationEvent::Error(format!("Trigger key not delivered: {e}")))
                    .await;
            }
        }

        let sequence = SequenceExecutor::new(&*self.classifier, &self.flags, &self.settings)
            .run(&mut self.capture, &mut self.link, epoch)
            .await;
        let skip = sequence.skip_monitoring;
        let _ = self
            .event_tx
            .send(AutomationEvent::SequenceFinished(sequence))
            .await;

        let session = if skip {
            log::info!("⏭️ Monitoring skipped (stop after sequence)");
            SessionReport {
                outcome: SessionOutcome::SkippedAfterSequence,
                iterations: 0,
                retriggers: 0,
            }
        } else if !self.flags.still_running(epoch) {
            SessionReport {
                outcome: SessionOutcome::Stopped,
                iterations: 0,
                retriggers: 0,
            }
        } else {
            sleep(Duration::from_millis(
                self.settings.timing.status_initial_wait_ms,
            ))
            .await;
            self.change_state(AutomationState::Monitoring).await;
            MonitoringStateMachine::new(
                &*self.classifier,
                &self.flags,
                &self.settings,
                &self.notifier,
            )
            .run(&mut self.capture, &mut self.link, epoch)
            .await
        };

        let _ = self
            .event_tx
            .send(AutomationEvent::SessionFinished(session.clone()))
            .await;
        self.change_state(AutomationState::Idle).await;
        log::info!("💤 Idle, waiting for the next trigger");
        session
    }

    pub async fn run(&mut self) {
        log::info!("🎮 Glyph automation loop started");

        while !self.should_exit {
            match self.command_rx.recv().await {
                Some(command) => self.process_command(command).await,
                None => {
                    log::debug!("🤖 Command channel closed");
                    break;
                }
            }
        }

        self.change_state(AutomationState::Stopped).await;
        log::info!("🎮 Glyph automation loop ended");
    }
}
