//! Job lifecycle state machine.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a supervised job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobState {
    #[default]
    Idle,
    MetadataResolved,
    Launched,
    Exiting,
    Succeeded,
    Failed,
}

impl JobState {
    /// Returns true for `Succeeded` and `Failed`.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::MetadataResolved => "metadata-resolved",
            Self::Launched => "launched",
            Self::Exiting => "exiting",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Tracks the state of one job invocation.
#[derive(Debug, Clone, Default)]
pub struct JobStateMachine {
    state: JobState,
}

impl JobStateMachine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn transition(&mut self, new_state: JobState) {
        tracing::debug!(from = %self.state, to = %new_state, "Job state transition");
        self.state = new_state;
    }
}
