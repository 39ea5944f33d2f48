// Glyph automation module - trigger handling, glyph sequence and
// priority-ordered monitoring over pluggable capture and command links.
pub mod flags;
pub mod fsm;
pub mod monitor;
pub mod sequence;
pub mod types;

#[cfg(test)]
mod tests;

pub use flags::ControlFlags;
pub use fsm::{
    COMMAND_CHANNEL_CAPACITY, EVENT_CHANNEL_CAPACITY, GlyphAutomation, create_automation_channels,
};
pub use monitor::{MonitoringStateMachine, Transition};
pub use sequence::SequenceExecutor;
pub use types::{
    AutomationCommand, AutomationEvent, AutomationState, SequenceReport, SessionOutcome,
    SessionReport, SessionState, StepOutcome,
};
