use super::error::LinkResult;
use super::types::{CommandLink, KeyCommand};

/// Logs commands instead of transmitting them
#[derive(Debug, Default)]
pub struct DryRunLink {
    sent: Vec<KeyCommand>,
}

impl DryRunLink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> &[KeyCommand] {
        &self.sent
    }
}

impl CommandLink for DryRunLink {
    async fn send(&mut self, command: KeyCommand) -> LinkResult<()> {
        log::info!("🧪 [dry-run] would send {}", command);
        self.sent.push(command);
        Ok(())
    }
}
