//! Options of a single supervised job.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::probe::{Probe, Summary};
use crate::progress::Progress;

/// Progress sampling period used when none is set.
pub const DEFAULT_PROGRESS_PERIOD: Duration = Duration::from_secs(1);

/// Callback receiving normalized progress.
pub type ProgressCallback = Box<dyn FnMut(JobProgress) + Send + 'static>;

/// Normalized progress reported to the caller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JobProgress {
    /// Processing speed relative to realtime.
    pub speed: f64,
    /// Completed fraction, nominally `0.0..=1.0`.
    ///
    /// Not finite when the input duration is unknown.
    pub complete: f64,
    /// True for the final report.
    pub done: bool,
}

impl JobProgress {
    /// Normalize a raw progress record against the input summary.
    #[must_use]
    pub fn new(progress: &Progress, summary: &Summary) -> Self {
        Self {
            speed: progress.speed,
            complete: summary.completion(progress.out_time),
            done: progress.done,
        }
    }

    /// Returns false when the completed fraction is unknown.
    #[must_use]
    pub fn is_known(&self) -> bool {
        self.complete.is_finite()
    }
}

/// How ffmpeg delivers its progress report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressTransport {
    /// Standard output, read through a pipe.
    #[default]
    Pipe,
    /// HTTP POST to a local [`ProgressListener`](crate::progress::ProgressListener).
    Listener,
}

/// Options for [`FfRunner::run`](crate::job::FfRunner::run).
#[derive(Default)]
pub struct RunOptions {
    /// Input path or URL.
    pub input: String,
    /// Output path.
    pub output: String,
    /// Arguments placed between the input and the output.
    pub args: Vec<String>,
    /// Arguments placed before the input.
    pub input_args: Vec<String>,
    /// Progress callback.
    pub on_progress: Option<ProgressCallback>,
    /// Progress sampling period. Defaults to one second.
    pub progress_period: Option<Duration>,
    /// Pre-fetched metadata. The input is probed when absent.
    pub probe: Option<Probe>,
    /// Progress transport.
    pub transport: ProgressTransport,
}

impl RunOptions {
    #[must_use]
    pub fn new(input: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn input_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.input_args = args.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn on_progress<F>(mut self, f: F) -> Self
    where
        F: FnMut(JobProgress) + Send + 'static,
    {
        self.on_progress = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn progress_period(mut self, period: Duration) -> Self {
        self.progress_period = Some(period);
        self
    }

    #[must_use]
    pub fn probe(mut self, probe: Probe) -> Self {
        self.probe = Some(probe);
        self
    }

    #[must_use]
    pub fn transport(mut self, transport: ProgressTransport) -> Self {
        self.transport = transport;
        self
    }

    /// The sampling period with the default applied.
    #[must_use]
    pub fn effective_period(&self) -> Duration {
        self.progress_period
            .filter(|period| !period.is_zero())
            .unwrap_or(DEFAULT_PROGRESS_PERIOD)
    }
}

impl fmt::Debug for RunOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunOptions")
            .field("input", &self.input)
            .field("output", &self.output)
            .field("args", &self.args)
            .field("input_args", &self.input_args)
            .field("on_progress", &self.on_progress.is_some())
            .field("progress_period", &self.progress_period)
            .field("probe", &self.probe.is_some())
            .field("transport", &self.transport)
            .finish()
    }
}
