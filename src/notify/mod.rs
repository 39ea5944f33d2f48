//! Outbound notifications
//!
//! `Notifier` is a cheap, cloneable handle. `notify` never blocks and never
//! fails from the caller's point of view: messages are queued for a
//! background task and dropped (with a warning) when the queue is full.

pub mod error;
pub mod telegram;

pub use error::{NotifyError, NotifyResult};
pub use telegram::TelegramClient;

use tokio::sync::mpsc;

const QUEUE_CAPACITY: usize = 16;

#[derive(Clone, Debug, Default)]
pub struct Notifier {
    tx: Option<mpsc::Sender<String>>,
}

impl Notifier {
    /// Handle that only logs
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Handle plus the receiving end, for custom dispatchers
    pub fn channel() -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        (Self { tx: Some(tx) }, rx)
    }

    /// Spawn the dispatch task on the current runtime
    pub fn spawn_telegram(client: TelegramClient) -> Self {
        let (notifier, mut rx) = Self::channel();
        tokio::spawn(async move {
            while let Some(text) = rx.recv().await {
                match client.send(&text).await {
                    Ok(()) => log::debug!("📨 Notification delivered"),
                    Err(e) => log::warn!("⚠️ Notification failed: {}", e),
                }
            }
        });
        notifier
    }

    pub fn is_enabled(&self) -> bool {
        self.tx.is_some()
    }

    pub fn notify(&self, text: impl Into<String>) {
        let text = text.into();
        match &self.tx {
            Some(tx) => {
                if let Err(e) = tx.try_send(text) {
                    log::warn!("⚠️ Notification dropped: {}", e);
                }
            }
            None => log::info!("📨 (notifications off) {}", text),
        }
    }
}
