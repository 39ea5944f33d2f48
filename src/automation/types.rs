// Types and enums for the glyph automation
use crate::template_matching::Classification;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutomationState {
    Idle,
    Sequencing,
    Monitoring,
    /// Shutdown finished; no further commands are processed
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutomationCommand {
    Trigger,
    Shutdown,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AutomationEvent {
    StateChanged(AutomationState),
    SequenceFinished(SequenceReport),
    SessionFinished(SessionReport),
    Error(String),
}

/// What happened at one glyph position
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Sent(Classification),
    BelowThreshold(Classification),
    CaptureFailed,
    ClassifyFailed,
    SendFailed(Classification),
    /// Emergency stop seen before the step started
    Aborted,
}

impl StepOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, StepOutcome::Sent(_))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SequenceReport {
    pub steps: Vec<StepOutcome>,
    /// `stop_after_sequence` was armed when the sequence ended
    pub skip_monitoring: bool,
}

impl SequenceReport {
    pub fn sent_count(&self) -> usize {
        self.steps.iter().filter(|s| s.is_sent()).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    EndDetected,
    RetryCeiling,
    IterationCeiling,
    Stopped,
    SkippedAfterSequence,
}

impl fmt::Display for SessionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SessionOutcome::EndDetected => "end detected",
            SessionOutcome::RetryCeiling => "retry ceiling reached",
            SessionOutcome::IterationCeiling => "iteration ceiling reached",
            SessionOutcome::Stopped => "stopped",
            SessionOutcome::SkippedAfterSequence => "monitoring skipped after sequence",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionReport {
    pub outcome: SessionOutcome,
    /// End/status check pairs performed
    pub iterations: u32,
    pub retriggers: u32,
}

/// Counters owned by one monitoring session. They survive re-triggers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionState {
    pub iteration_count: u32,
    pub no_match_retry_count: u32,
}
