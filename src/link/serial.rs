//! Line-oriented serial protocol to the keyboard bridge.
//!
//! Each command is one ASCII line (`Q\n`, `E\n`, `ALT\n`, `PING\n`); the
//! bridge answers with `OK` or `ERROR` on its own line.

use super::error::{LinkError, LinkResult};
use super::types::{CommandLink, KeyCommand};
use std::path::Path;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::time::{sleep, timeout};
use tokio_serial::{
    ClearBuffer, DataBits, FlowControl, Parity, SerialPort, SerialPortBuilderExt, SerialStream,
    StopBits,
};

pub const DEFAULT_BAUD_RATE: u32 = 115_200;

pub struct SerialLink<S> {
    stream: BufReader<S>,
    ack_timeout: Duration,
}

impl SerialLink<SerialStream> {
    /// Open the bridge (e.g. `/dev/ttyACM0`) in raw 8N1 mode and wait for it
    /// to answer `PING`.
    pub async fn open(
        path: &Path,
        baud_rate: u32,
        ack_timeout: Duration,
        init_delay: Duration,
    ) -> LinkResult<Self> {
        let port_name = path.to_string_lossy();
        let stream = tokio_serial::new(port_name.as_ref(), baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .open_native_async()
            .map_err(|e| LinkError::OpenFailed {
                path: path.to_path_buf(),
                source: e,
            })?;

        // The bridge resets when the port opens and prints its boot banner
        sleep(init_delay).await;
        if let Err(e) = stream.clear(ClearBuffer::Input) {
            log::warn!("⚠️ Could not discard boot output on {:?}: {}", path, e);
        }

        let mut link = SerialLink::new(stream, ack_timeout);
        link.send(KeyCommand::Ping).await?;
        log::info!("🔌 Keyboard bridge connected on {:?} at {} baud", path, baud_rate);
        Ok(link)
    }
}

impl<S> SerialLink<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, ack_timeout: Duration) -> Self {
        Self {
            stream: BufReader::new(stream),
            ack_timeout,
        }
    }

    /// Next non-blank line, trimmed. Line endings may be `\n` or `\r\n`.
    async fn next_response(&mut self, command: KeyCommand) -> LinkResult<String> {
        let mut line = String::new();
        loop {
            line.clear();
            let read = self
                .stream
                .read_line(&mut line)
                .await
                .map_err(|e| LinkError::Io { command, source: e })?;
            if read == 0 {
                return Err(LinkError::Closed);
            }
            let trimmed = line.trim();
            if !trimmed.is_empty() {
                return Ok(trimmed.to_string());
            }
        }
    }

    async fn read_ack(&mut self, command: KeyCommand) -> LinkResult<()> {
        let ack_timeout = self.ack_timeout;
        let response = timeout(ack_timeout, self.next_response(command))
            .await
            .map_err(|_| LinkError::AckTimeout {
                command,
                timeout: ack_timeout,
            })??;

        match response.as_str() {
            "OK" => Ok(()),
            "ERROR" => Err(LinkError::Rejected { command }),
            _ => Err(LinkError::UnexpectedResponse { command, response }),
        }
    }
}

impl<S> CommandLink for SerialLink<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    async fn send(&mut self, command: KeyCommand) -> LinkResult<()> {
        let line = format!("{}\n", command.as_wire());
        let writer = self.stream.get_mut();
        writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| LinkError::Io { command, source: e })?;
        writer
            .flush()
            .await
            .map_err(|e| LinkError::Io { command, source: e })?;

        self.read_ack(command).await?;
        log::debug!("⌨️ Sent {} to keyboard bridge", command);
        Ok(())
    }
}
