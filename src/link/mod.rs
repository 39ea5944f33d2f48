// Command-link module - key commands to the hardware keyboard bridge
// over a newline-delimited serial protocol, bridge discovery, and a
// dry-run stand-in.

pub mod backend;
pub mod discovery;
pub mod dry_run;
pub mod error;
pub mod serial;
pub mod types;

pub use backend::LinkBackend;
pub use discovery::{PortCandidate, available_ports, find_bridge};
pub use dry_run::DryRunLink;
pub use error::{LinkError, LinkResult};
pub use serial::SerialLink;
pub use types::{CommandLink, KeyCommand};
