//! Configuration types.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::diagnostics::DEFAULT_DIAGNOSTIC_LINES;
use crate::job::ProgressTransport;

/// Runner configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FfConfig {
    /// ffmpeg binary name or path.
    pub binary: String,
    /// ffprobe binary name or path.
    pub binary_probe: String,
    /// Number of stderr lines kept for error reports.
    pub diagnostic_lines: usize,
    /// Interval between progress reports, in milliseconds.
    pub progress_period_ms: u64,
    /// How ffmpeg delivers progress.
    pub transport: ProgressTransport,
    /// Grace between SIGTERM and SIGKILL on cancellation, in milliseconds.
    pub terminate_timeout_ms: u64,
}

impl Default for FfConfig {
    fn default() -> Self {
        Self {
            binary: "ffmpeg".to_string(),
            binary_probe: "ffprobe".to_string(),
            diagnostic_lines: DEFAULT_DIAGNOSTIC_LINES,
            progress_period_ms: 1000,
            transport: ProgressTransport::Pipe,
            terminate_timeout_ms: 2000,
        }
    }
}

impl FfConfig {
    #[must_use]
    pub fn progress_period(&self) -> Duration {
        Duration::from_millis(self.progress_period_ms)
    }

    #[must_use]
    pub fn terminate_timeout(&self) -> Duration {
        Duration::from_millis(self.terminate_timeout_ms)
    }
}
