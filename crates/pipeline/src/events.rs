//! Pipeline lifecycle events
//!
//! Runner tasks and source callbacks report state changes through a shared
//! channel; a monitor task logs them and applies the configured reaction
//! (e.g. stop-on-source-error).

use contracts::ComponentId;

/// Why a component task ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// All upstream providers closed; the branch is exhausted
    InputsClosed,
    /// The pipeline is stopping
    Cancelled,
    /// The component requested a fatal abort
    Fatal(String),
    /// An unrecoverable engine error ended the task
    Failed(String),
}

impl StopReason {
    pub fn as_str(&self) -> &str {
        match self {
            Self::InputsClosed => "inputs_closed",
            Self::Cancelled => "cancelled",
            Self::Fatal(_) => "fatal",
            Self::Failed(_) => "failed",
        }
    }
}

/// One lifecycle event
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// A source reported an acquisition failure
    SourceError { id: ComponentId, message: String },
    /// A component failed validation while entering and will not run
    ComponentDisabled { id: ComponentId, message: String },
    /// A component task ended
    ComponentStopped { id: ComponentId, reason: StopReason },
}
