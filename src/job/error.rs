//! Failure of an external tool invocation, with its last diagnostic lines.

use std::fmt;
use std::process::ExitStatus;

use crate::job::SpawnError;
use crate::progress::ListenerError;

/// Diagnostic substrings that mean the input itself is unusable.
///
/// Extend this list when new fatal input conditions are identified.
pub const INVALID_INPUT_PATTERNS: &[&str] = &[
    "Invalid data found when processing input",
    "Non-monotonous DTS in output stream",
];

/// What went wrong while executing the external tool.
#[derive(thiserror::Error, Debug)]
pub enum ExecError {
    /// The process could not be started.
    #[error("failed to start {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: SpawnError,
    },
    /// The process exited unsuccessfully.
    #[error("{binary}: {status}")]
    Exit { binary: String, status: ExitStatus },
    /// Waiting for the process failed.
    #[error("wait: {0}")]
    Wait(#[source] std::io::Error),
    /// The job was cancelled and the process terminated.
    #[error("cancelled")]
    Cancelled,
    /// Reading the progress pipe failed.
    #[error("progress stream: {0}")]
    Progress(#[source] std::io::Error),
    /// The progress listener failed.
    #[error("progress listener: {0}")]
    Listener(#[source] ListenerError),
    /// A supervisor task panicked or was aborted.
    #[error("task failed: {0}")]
    Task(String),
}

/// Execution failure paired with the tool's last diagnostic lines.
#[derive(Debug)]
pub struct JobError {
    cause: ExecError,
    diagnostics: Vec<String>,
}

impl JobError {
    pub(crate) fn new(cause: ExecError, diagnostics: Vec<String>) -> Self {
        Self { cause, diagnostics }
    }

    /// The underlying execution failure.
    #[must_use]
    pub fn cause(&self) -> &ExecError {
        &self.cause
    }

    /// Captured diagnostic lines, oldest first.
    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.diagnostics
    }

    /// Returns true if any diagnostic line contains `needle`.
    #[must_use]
    pub fn contains(&self, needle: &str) -> bool {
        self.diagnostics.iter().any(|line| line.contains(needle))
    }

    /// Returns true if the diagnostics match a known fatal input condition.
    #[must_use]
    pub fn is_invalid_input(&self) -> bool {
        INVALID_INPUT_PATTERNS
            .iter()
            .any(|pattern| self.contains(pattern))
    }

    /// Returns true if the job ended because it was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self.cause, ExecError::Cancelled)
    }
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.diagnostics.is_empty() {
            return write!(f, "{}", self.cause);
        }
        write!(f, "{}:", self.cause)?;
        for line in &self.diagnostics {
            write!(f, "\n  {line}")?;
        }
        Ok(())
    }
}

impl std::error::Error for JobError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.cause)
    }
}

/// Returns true if `err` is, or is caused by, a [`JobError`] whose
/// diagnostics match a known fatal input condition.
#[must_use]
pub fn is_invalid_input(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(err) = current {
        if let Some(job) = err.downcast_ref::<JobError>() {
            return job.is_invalid_input();
        }
        current = err.source();
    }
    false
}
