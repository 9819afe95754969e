//! Launch lifecycle states

use std::fmt;

/// How a launch ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Success,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchState {
    Idle,
    FrequencyClaimed,
    Streaming,
    Terminated(Termination),
}

impl fmt::Display for LaunchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LaunchState::Idle => f.write_str("idle"),
            LaunchState::FrequencyClaimed => f.write_str("frequency_claimed"),
            LaunchState::Streaming => f.write_str("streaming"),
            LaunchState::Terminated(Termination::Success) => f.write_str("terminated(success)"),
            LaunchState::Terminated(Termination::Failed) => f.write_str("terminated(failed)"),
        }
    }
}

/// Summary of one finished launch
#[derive(Debug, Clone)]
pub struct LaunchReport {
    pub state: LaunchState,
    pub segments_streamed: u64,
    pub bytes_streamed: u64,
    /// Final status message
    pub message: String,
}

impl Default for LaunchReport {
    fn default() -> Self {
        Self {
            state: LaunchState::Idle,
            segments_streamed: 0,
            bytes_streamed: 0,
            message: String::new(),
        }
    }
}

impl LaunchReport {
    pub fn succeeded(&self) -> bool {
        self.state == LaunchState::Terminated(Termination::Success)
    }

    pub fn failed(&self) -> bool {
        self.state == LaunchState::Terminated(Termination::Failed)
    }
}
