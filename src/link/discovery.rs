//! Finding the keyboard bridge among the serial ports.
//!
//! Known USB-serial chips are matched by VID:PID first, then by keywords in
//! the product or manufacturer strings. When nothing looks like a bridge the
//! first port is used, the same way a user would try it by hand.

use super::error::{LinkError, LinkResult};
use serde::Serialize;
use std::fmt;
use tokio_serial::{SerialPortInfo, SerialPortType};

/// (vid, pid, chip)
pub const KNOWN_BRIDGES: &[(u16, u16, &str)] = &[
    (0x303A, 0x1001, "ESP32-S3 native USB"),
    (0x10C4, 0xEA60, "CP210x"),
    (0x0403, 0x6001, "FT232"),
    (0x1A86, 0x7523, "CH340"),
    (0x067B, 0x2303, "PL2303"),
];

const DESCRIPTION_KEYWORDS: &[&str] = &["esp", "cp21", "ch340", "ft232"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PortCandidate {
    pub name: String,
    pub vid: Option<u16>,
    pub pid: Option<u16>,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
}

impl PortCandidate {
    pub fn from_info(info: &SerialPortInfo) -> Self {
        let mut candidate = Self {
            name: info.port_name.clone(),
            ..Self::default()
        };
        if let SerialPortType::UsbPort(usb) = &info.port_type {
            candidate.vid = Some(usb.vid);
            candidate.pid = Some(usb.pid);
            candidate.manufacturer = usb.manufacturer.clone();
            candidate.product = usb.product.clone();
        }
        candidate
    }

    /// Chip name when VID:PID is in [`KNOWN_BRIDGES`]
    pub fn known_chip(&self) -> Option<&'static str> {
        let (vid, pid) = (self.vid?, self.pid?);
        KNOWN_BRIDGES
            .iter()
            .find(|(v, p, _)| *v == vid && *p == pid)
            .map(|(_, _, chip)| *chip)
    }

    pub fn description(&self) -> String {
        match (&self.product, &self.manufacturer) {
            (Some(product), Some(manufacturer)) => format!("{product} ({manufacturer})"),
            (Some(text), None) | (None, Some(text)) => text.clone(),
            (None, None) => "n/a".to_string(),
        }
    }

    pub fn is_likely_bridge(&self) -> bool {
        if self.known_chip().is_some() {
            return true;
        }
        let text = self.description().to_ascii_lowercase();
        DESCRIPTION_KEYWORDS.iter().any(|k| text.contains(k))
    }
}

impl fmt::Display for PortCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<20} {}", self.name, self.description())?;
        if let (Some(vid), Some(pid)) = (self.vid, self.pid) {
            write!(f, " [{vid:04X}:{pid:04X}]")?;
        }
        if let Some(chip) = self.known_chip() {
            write!(f, " {chip}")?;
        }
        Ok(())
    }
}

pub fn available_ports() -> LinkResult<Vec<PortCandidate>> {
    let ports = tokio_serial::available_ports().map_err(LinkError::Enumerate)?;
    Ok(ports.iter().map(PortCandidate::from_info).collect())
}

/// First likely bridge, else the first port
pub fn select_bridge(ports: &[PortCandidate]) -> Option<&PortCandidate> {
    ports
        .iter()
        .find(|p| p.is_likely_bridge())
        .or_else(|| ports.first())
}

pub fn find_bridge() -> LinkResult<Option<PortCandidate>> {
    let ports = available_ports()?;
    log::debug!("🔎 {} serial port(s) found", ports.len());
    let selected = select_bridge(&ports).cloned();
    match &selected {
        Some(port) if port.is_likely_bridge() => log::info!("🔎 Keyboard bridge found: {}", port),
        Some(port) => log::warn!("⚠️ No known bridge chip, trying first port: {}", port),
        None => log::warn!("⚠️ No serial ports found"),
    }
    Ok(selected)
}
