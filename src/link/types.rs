// Command-link types and trait
use super::error::LinkResult;
use std::fmt;

/// Key commands understood by the hardware keyboard bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCommand {
    Q,
    E,
    Alt,
    Ping,
}

impl KeyCommand {
    /// Line sent over the wire, without the terminator
    pub fn as_wire(&self) -> &'static str {
        match self {
            KeyCommand::Q => "Q",
            KeyCommand::E => "E",
            KeyCommand::Alt => "ALT",
            KeyCommand::Ping => "PING",
        }
    }

    /// Key to press for a recognized glyph label
    pub fn from_glyph(label: &str) -> Option<Self> {
        match label {
            "q" => Some(KeyCommand::Q),
            "e" => Some(KeyCommand::E),
            _ => None,
        }
    }
}

impl fmt::Display for KeyCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// Transmits key commands to the hardware bridge
#[allow(async_fn_in_trait)]
pub trait CommandLink {
    async fn send(&mut self, command: KeyCommand) -> LinkResult<()>;
}
