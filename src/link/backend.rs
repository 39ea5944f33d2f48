use super::dry_run::DryRunLink;
use super::error::LinkResult;
use super::serial::SerialLink;
use super::types::{CommandLink, KeyCommand};
use tokio_serial::SerialStream;

pub enum LinkBackend {
    Serial(SerialLink<SerialStream>),
    DryRun(DryRunLink),
}

impl LinkBackend {
    pub fn name(&self) -> &'static str {
        match self {
            LinkBackend::Serial(_) => "serial",
            LinkBackend::DryRun(_) => "dry-run",
        }
    }
}

impl CommandLink for LinkBackend {
    async fn send(&mut self, command: KeyCommand) -> LinkResult<()> {
        match self {
            LinkBackend::Serial(s) => s.send(command).await,
            LinkBackend::DryRun(d) => d.send(command).await,
        }
    }
}
