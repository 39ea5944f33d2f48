//! Line-based key listener.
//!
//! Reads one key per line (`t` trigger, `s` emergency stop, `x` stop after
//! the current sequence, `q` quit) and turns it into control-flag mutations
//! or automation commands. Runs on its own task, independent of the
//! automation loop.

use crate::automation::{AutomationCommand, ControlFlags};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, sleep};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKey {
    Trigger,
    EmergencyStop,
    StopAfterSequence,
    Quit,
}

pub fn parse_key(line: &str) -> Option<InputKey> {
    match line.trim().to_ascii_lowercase().as_str() {
        "t" | "trigger" => Some(InputKey::Trigger),
        "s" | "stop" => Some(InputKey::EmergencyStop),
        "x" | "stop-after" => Some(InputKey::StopAfterSequence),
        "q" | "quit" | "exit" => Some(InputKey::Quit),
        _ => None,
    }
}

pub fn help_text() -> &'static str {
    "Keys: [t] trigger  [s] emergency stop  [x] stop after sequence  [q] quit"
}

pub struct InputListener {
    flags: ControlFlags,
    cmd_tx: mpsc::Sender<AutomationCommand>,
    debounce: Duration,
    stop_grace: Duration,
    last_trigger: Option<Instant>,
}

impl InputListener {
    pub fn new(
        flags: ControlFlags,
        cmd_tx: mpsc::Sender<AutomationCommand>,
        debounce: Duration,
        stop_grace: Duration,
    ) -> Self {
        Self {
            flags,
            cmd_tx,
            debounce,
            stop_grace,
            last_trigger: None,
        }
    }

    /// Apply one key. Returns false once the listener should exit.
    pub async fn handle(&mut self, key: InputKey) -> bool {
        match key {
            InputKey::Trigger => {
                let now = Instant::now();
                if let Some(last) = self.last_trigger {
                    if now.duration_since(last) < self.debounce {
                        log::debug!("⌛ Trigger debounced");
                        return true;
                    }
                }
                self.last_trigger = Some(now);
                // A full queue means a cycle is already pending
                if let Err(e) = self.cmd_tx.try_send(AutomationCommand::Trigger) {
                    log::info!("🚫 Trigger not queued: {}", e);
                }
                true
            }
            InputKey::EmergencyStop => {
                log::warn!("🛑 Emergency stop requested");
                let epoch = self.flags.request_stop();
                let flags = self.flags.clone();
                let grace = self.stop_grace;
                tokio::spawn(async move {
                    sleep(grace).await;
                    // A later stop owns the resume
                    if flags.resume_if(epoch) {
                        log::info!("▶️ Ready for a new trigger");
                    }
                });
                true
            }
            InputKey::StopAfterSequence => {
                log::info!("⏭️ Will stop after the current sequence");
                self.flags.request_stop_after_sequence();
                true
            }
            InputKey::Quit => {
                self.flags.request_stop();
                let _ = self.cmd_tx.send(AutomationCommand::Shutdown).await;
                false
            }
        }
    }

    pub async fn run<R>(mut self, reader: R)
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = reader.lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => match parse_key(&line) {
                    Some(key) => {
                        if !self.handle(key).await {
                            break;
                        }
                    }
                    None if line.trim().is_empty() => {}
                    None => log::warn!("⚠️ Unknown key '{}'. {}", line.trim(), help_text()),
                },
                Ok(None) => {
                    log::info!("⌨️ Input closed, shutting down");
                    let _ = self.cmd_tx.send(AutomationCommand::Shutdown).await;
                    break;
                }
                Err(e) => {
                    log::error!("❌ Failed to read input: {}", e);
                    let _ = self.cmd_tx.send(AutomationCommand::Shutdown).await;
                    break;
                }
            }
        }
    }

    pub fn spawn_stdin(self) -> JoinHandle<()> {
        tokio::spawn(self.run(BufReader::new(tokio::io::stdin())))
    }
}
