//! ffprobe invocation.

use std::process::Stdio;

use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;

use super::{Probe, Summary};
use crate::diagnostics::{DiagnosticSink, DEFAULT_DIAGNOSTIC_LINES};
use crate::job::{command_line, probe_args, ExecError, JobError, ToolProcess};

/// Default ffprobe binary.
pub const DEFAULT_PROBE_BINARY: &str = "ffprobe";

/// Errors from probing an input.
#[derive(thiserror::Error, Debug)]
pub enum ProbeError {
    /// ffprobe failed to start or exited unsuccessfully.
    #[error("{0}")]
    Process(#[source] JobError),
    /// ffprobe output is not a probe document.
    #[error("decode: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Runs ffprobe and decodes its JSON output.
#[derive(Debug, Clone)]
pub struct ProbeClient {
    binary: String,
    diagnostic_lines: usize,
}

impl Default for ProbeClient {
    fn default() -> Self {
        Self::new(DEFAULT_PROBE_BINARY)
    }
}

impl ProbeClient {
    #[must_use]
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            diagnostic_lines: DEFAULT_DIAGNOSTIC_LINES,
        }
    }

    /// Set how many diagnostic lines are kept for errors.
    #[must_use]
    pub fn with_diagnostic_lines(mut self, lines: usize) -> Self {
        self.diagnostic_lines = lines;
        self
    }

    #[must_use]
    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Probe `input` and return its typed metadata.
    ///
    /// Cancelling `cancel` kills ffprobe and returns a cancelled
    /// [`JobError`].
    ///
    /// # Errors
    ///
    /// Returns `ProbeError::Process` if ffprobe cannot start, exits with a
    /// failure or is cancelled, and `ProbeError::Decode` if its output is
    /// malformed.
    pub async fn probe(&self, input: &str, cancel: &CancellationToken) -> Result<Probe, ProbeError> {
        let args = probe_args(input);
        tracing::debug!(
            binary = %self.binary,
            input,
            command = %command_line(&self.binary, &args),
            "Running ffprobe"
        );

        let mut process =
            ToolProcess::spawn(&self.binary, &args, Stdio::piped()).map_err(|source| {
                self.failed(
                    ExecError::Spawn {
                        binary: self.binary.clone(),
                        source,
                    },
                    Vec::new(),
                )
            })?;

        let stdout = process.take_stdout();
        let stderr = process.take_stderr();
        let diagnostics = DiagnosticSink::new(self.diagnostic_lines);

        let collect = async {
            let read_stdout = async move {
                let mut raw = Vec::new();
                if let Some(mut stdout) = stdout {
                    stdout.read_to_end(&mut raw).await?;
                }
                Ok::<_, std::io::Error>(raw)
            };
            let drain_stderr = async {
                if let Some(stderr) = stderr {
                    if let Err(e) = diagnostics.clone().drain(stderr).await {
                        tracing::debug!(error = %e, "Failed to read ffprobe stderr");
                    }
                }
            };

            let (raw, (), status) = tokio::join!(read_stdout, drain_stderr, process.wait());
            Ok::<_, std::io::Error>((raw?, status?))
        };

        let (raw, status) = tokio::select! {
            result = collect => {
                result.map_err(|e| self.failed(ExecError::Wait(e), diagnostics.snapshot()))?
            }
            () = cancel.cancelled() => {
                return Err(self.failed(ExecError::Cancelled, diagnostics.snapshot()));
            }
        };

        if !status.success() {
            return Err(self.failed(
                ExecError::Exit {
                    binary: self.binary.clone(),
                    status,
                },
                diagnostics.snapshot(),
            ));
        }

        let probe = Probe::from_json(raw).map_err(ProbeError::Decode)?;

        match Summary::from_probe(&probe) {
            Ok(summary) => tracing::debug!(
                streams = probe.streams.len(),
                duration_sec = summary.duration.as_secs(),
                duration = ?summary.duration,
                "Probe summary"
            ),
            Err(e) => tracing::warn!(error = %e, "Failed to summarize probe"),
        }

        Ok(probe)
    }

    fn failed(&self, cause: ExecError, diagnostics: Vec<String>) -> ProbeError {
        let err = JobError::new(cause, diagnostics);
        tracing::debug!(binary = %self.binary, error = %err, "ffprobe failed");
        ProbeError::Process(err)
    }
}
