//! Supervised execution of one ffmpeg job.
//!
//! A launched job runs three tasks:
//!
//! 1. the progress consumer, reading the report from the pipe (or serving
//!    the HTTP listener),
//! 2. the shutdown coordinator, closing the progress source once the process
//!    finished or the job was cancelled,
//! 3. the process task, waiting for ffmpeg while draining its stderr into
//!    the diagnostic buffer.
//!
//! All three are joined before [`FfRunner::run`] returns. The first error
//! wins and cancels the others.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::BufReader;
use tokio::process::{ChildStderr, ChildStdout};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::FfConfig;
use crate::diagnostics::{DiagnosticSink, DEFAULT_DIAGNOSTIC_LINES};
use crate::job::{
    command_line, is_invalid_input, ExecError, FfmpegArgs, JobError, JobProgress, JobState,
    JobStateMachine, ProgressTransport, RunOptions, ToolProcess, PROGRESS_PIPE,
};
use crate::probe::{DurationParseError, Probe, ProbeClient, ProbeError, Summary};
use crate::progress::{read_progress, ListenerError, ListenerHandle, Progress, ProgressListener};

/// Default ffmpeg binary.
pub const DEFAULT_BINARY: &str = "ffmpeg";

/// Default grace between SIGTERM and SIGKILL when a job is cancelled.
pub const DEFAULT_TERMINATE_TIMEOUT: Duration = Duration::from_secs(2);

/// How long a progress source or stderr may stay open after the process
/// exited before it is closed.
pub const PIPE_DRAIN_GRACE: Duration = Duration::from_millis(250);

/// Error type for [`FfRunner::run`], tagged with the failing phase.
#[derive(thiserror::Error, Debug)]
pub enum RunError {
    /// Probing the input failed.
    #[error("probe: {0}")]
    Probe(#[source] ProbeError),
    /// The probe document has an unparseable duration.
    #[error("summary: {0}")]
    Summary(#[source] DurationParseError),
    /// The progress listener could not be bound.
    #[error("progress listener: {0}")]
    Listener(#[source] ListenerError),
    /// ffmpeg failed, was cancelled, or its progress stream broke.
    #[error("run: {0}")]
    Process(#[source] JobError),
}

impl RunError {
    /// The [`JobError`] of a failed probe or run, if any.
    #[must_use]
    pub fn job_error(&self) -> Option<&JobError> {
        match self {
            Self::Probe(ProbeError::Process(err)) | Self::Process(err) => Some(err),
            _ => None,
        }
    }

    /// Returns true if the input is unusable.
    #[must_use]
    pub fn is_invalid_input(&self) -> bool {
        is_invalid_input(self)
    }

    /// Returns true if the job was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.job_error().is_some_and(JobError::is_cancelled)
    }
}

type RawProgressFn = Box<dyn FnMut(Progress) + Send>;

/// Where the progress report comes from.
enum ProgressSource {
    Pipe(RawProgressFn),
    Listener(ProgressListener),
}

/// Closes the progress source on behalf of the coordinator.
#[derive(Clone)]
enum SourceCloser {
    Pipe(CancellationToken),
    Listener(ListenerHandle),
}

impl SourceCloser {
    fn close(&self) {
        match self {
            Self::Pipe(closed) => closed.cancel(),
            Self::Listener(handle) => handle.stop(),
        }
    }
}

/// Runs ffmpeg and ffprobe.
#[derive(Debug, Clone)]
pub struct FfRunner {
    binary: String,
    probe: ProbeClient,
    diagnostic_lines: usize,
    terminate_timeout: Duration,
}

impl Default for FfRunner {
    fn default() -> Self {
        Self::with_binaries(DEFAULT_BINARY, crate::probe::DEFAULT_PROBE_BINARY)
    }
}

impl FfRunner {
    /// Create a runner from configuration.
    #[must_use]
    pub fn new(config: &FfConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            probe: ProbeClient::new(config.binary_probe.clone())
                .with_diagnostic_lines(config.diagnostic_lines),
            diagnostic_lines: config.diagnostic_lines,
            terminate_timeout: config.terminate_timeout(),
        }
    }

    /// Create a runner for custom binaries with default settings.
    #[must_use]
    pub fn with_binaries(binary: impl Into<String>, binary_probe: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            probe: ProbeClient::new(binary_probe),
            diagnostic_lines: DEFAULT_DIAGNOSTIC_LINES,
            terminate_timeout: DEFAULT_TERMINATE_TIMEOUT,
        }
    }

    /// Set the grace between SIGTERM and SIGKILL on cancellation.
    #[must_use]
    pub fn with_terminate_timeout(mut self, timeout: Duration) -> Self {
        self.terminate_timeout = timeout;
        self
    }

    /// The ffmpeg binary.
    #[must_use]
    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Probe `input` with ffprobe.
    ///
    /// # Errors
    ///
    /// See [`ProbeClient::probe`].
    pub async fn probe(&self, input: &str, cancel: &CancellationToken) -> Result<Probe, ProbeError> {
        self.probe.probe(input, cancel).await
    }

    /// Run ffmpeg as described by `options`.
    ///
    /// Cancelling `cancel` terminates ffmpeg, closes the progress source and
    /// returns a cancelled [`JobError`]. Timeouts are built by cancelling
    /// the token.
    ///
    /// # Errors
    ///
    /// Returns `RunError` tagged with the phase that failed.
    pub async fn run(&self, options: RunOptions, cancel: &CancellationToken) -> Result<(), RunError> {
        let span = tracing::info_span!(
            "job",
            job_id = %Uuid::new_v4(),
            input = %options.input,
            output = %options.output,
        );
        self.run_job(options, cancel).instrument(span).await
    }

    async fn run_job(&self, mut options: RunOptions, cancel: &CancellationToken) -> Result<(), RunError> {
        let mut state = JobStateMachine::new();

        let probe = match options.probe.take() {
            Some(probe) => probe,
            None => self
                .probe(&options.input, cancel)
                .await
                .map_err(RunError::Probe)?,
        };
        state.transition(JobState::MetadataResolved);

        let summary = Summary::from_probe(&probe).map_err(RunError::Summary)?;
        let period = options.effective_period();

        let mut on_progress = options.on_progress.take();
        let report: RawProgressFn = Box::new(move |progress: Progress| {
            if let Some(callback) = on_progress.as_mut() {
                callback(JobProgress::new(&progress, &summary));
            }
        });

        let (source, progress_target, stdout) = match options.transport {
            ProgressTransport::Pipe => (
                ProgressSource::Pipe(report),
                PROGRESS_PIPE.to_string(),
                Stdio::piped(),
            ),
            ProgressTransport::Listener => {
                let listener = ProgressListener::bind(report)
                    .await
                    .map_err(RunError::Listener)?;
                let url = listener.url().to_string();
                (ProgressSource::Listener(listener), url, Stdio::null())
            }
        };

        let args = FfmpegArgs::new(options.input.as_str(), options.output.as_str())
            .input_args(&options.input_args)
            .args(&options.args)
            .progress_target(progress_target)
            .progress_period(period)
            .build_args();

        tracing::info!(
            binary = %self.binary,
            input = %options.input,
            output = %options.output,
            args = ?args,
            "Running ffmpeg"
        );
        tracing::debug!(command = %command_line(&self.binary, &args), "ffmpeg command line");

        let mut process = ToolProcess::spawn(&self.binary, &args, stdout).map_err(|source| {
            state.transition(JobState::Failed);
            RunError::Process(JobError::new(
                ExecError::Spawn {
                    binary: self.binary.clone(),
                    source,
                },
                Vec::new(),
            ))
        })?;
        state.transition(JobState::Launched);

        let diagnostics = DiagnosticSink::new(self.diagnostic_lines);
        let group = cancel.child_token();
        let finished = CancellationToken::new();
        let consumer_done = CancellationToken::new();

        let mut tasks = JoinSet::new();

        let closer = match source {
            ProgressSource::Pipe(report) => {
                let closed = CancellationToken::new();
                let stdout = process.take_stdout();
                tasks.spawn(consume_pipe(
                    stdout,
                    report,
                    closed.clone(),
                    consumer_done.clone(),
                ));
                SourceCloser::Pipe(closed)
            }
            ProgressSource::Listener(listener) => {
                let handle = listener.handle();
                let consumer_done = consumer_done.clone();
                tasks.spawn(async move {
                    let _done = consumer_done.drop_guard();
                    listener.run().await.map_err(ExecError::Listener)
                });
                SourceCloser::Listener(handle)
            }
        };

        tasks.spawn(coordinate_shutdown(
            closer,
            finished.clone(),
            consumer_done,
            group.clone(),
        ));

        let stderr = process.take_stderr();
        tasks.spawn(execute(
            process,
            self.binary.clone(),
            stderr,
            diagnostics.clone(),
            group.clone(),
            finished,
            self.terminate_timeout,
        ));

        let mut first_error: Option<ExecError> = None;
        while let Some(joined) = tasks.join_next().await {
            if state.state() == JobState::Launched {
                state.transition(JobState::Exiting);
            }
            let result = joined.unwrap_or_else(|e| Err(ExecError::Task(e.to_string())));
            if let Err(err) = result {
                group.cancel();
                first_error.get_or_insert(err);
            }
        }

        match first_error {
            None => {
                state.transition(JobState::Succeeded);
                Ok(())
            }
            Some(cause) => {
                state.transition(JobState::Failed);
                let lines = diagnostics.snapshot();
                tracing::warn!(error = %cause, logs = %lines.join("\n"), "ffmpeg failed");
                Err(RunError::Process(JobError::new(cause, lines)))
            }
        }
    }
}

/// Progress consumer for the pipe transport.
///
/// Stops without error when the coordinator closes the read end.
async fn consume_pipe(
    stdout: Option<ChildStdout>,
    mut report: RawProgressFn,
    closed: CancellationToken,
    consumer_done: CancellationToken,
) -> Result<(), ExecError> {
    let _done = consumer_done.drop_guard();
    let Some(stdout) = stdout else {
        return Err(ExecError::Progress(std::io::Error::other(
            "process stdout not available",
        )));
    };

    tokio::select! {
        result = read_progress(BufReader::new(stdout), |progress| report(progress)) => {
            result.map_err(ExecError::Progress)
        }
        () = closed.cancelled() => {
            tracing::trace!("Progress pipe closed by shutdown");
            Ok(())
        }
    }
}

/// Close the progress source once the process finished or the job was
/// cancelled, whichever comes first.
async fn coordinate_shutdown(
    closer: SourceCloser,
    finished: CancellationToken,
    consumer_done: CancellationToken,
    group: CancellationToken,
) -> Result<(), ExecError> {
    tokio::select! {
        () = finished.cancelled() => {
            tokio::select! {
                () = consumer_done.cancelled() => {}
                () = group.cancelled() => {}
                () = tokio::time::sleep(PIPE_DRAIN_GRACE) => {
                    tracing::debug!("Progress source still open after exit, closing");
                }
            }
        }
        () = group.cancelled() => {
            tracing::debug!("Job cancelled, closing progress source");
        }
    }
    closer.close();
    Ok(())
}

/// Wait for the process, draining stderr into `diagnostics`.
///
/// `finished` is cancelled when this returns.
async fn execute(
    mut process: ToolProcess,
    binary: String,
    stderr: Option<ChildStderr>,
    diagnostics: DiagnosticSink,
    group: CancellationToken,
    finished: CancellationToken,
    terminate_timeout: Duration,
) -> Result<(), ExecError> {
    let _finished = finished.drop_guard();
    tracing::debug!(pid = ?process.id(), "ffmpeg started");

    let mut drain = std::pin::pin!(drain_stderr(stderr, diagnostics.clone()));
    let mut drained = false;

    let status = {
        let mut wait = std::pin::pin!(async {
            tokio::select! {
                status = process.wait() => status.map_err(ExecError::Wait),
                () = group.cancelled() => {
                    tracing::debug!("Terminating ffmpeg");
                    if let Err(e) = process.graceful_terminate(terminate_timeout).await {
                        tracing::warn!(error = %e, "Failed to terminate ffmpeg");
                    }
                    Err(ExecError::Cancelled)
                }
            }
        });

        loop {
            tokio::select! {
                () = &mut drain, if !drained => drained = true,
                status = &mut wait => break status,
            }
        }
    };

    if !drained && tokio::time::timeout(PIPE_DRAIN_GRACE, drain).await.is_err() {
        tracing::debug!("stderr still open after exit, giving up on it");
        diagnostics.finish();
    }

    let status = status?;
    tracing::debug!(%status, "ffmpeg exited");
    if status.success() {
        Ok(())
    } else {
        Err(ExecError::Exit { binary, status })
    }
}

async fn drain_stderr(stderr: Option<ChildStderr>, diagnostics: DiagnosticSink) {
    let Some(stderr) = stderr else {
        diagnostics.finish();
        return;
    };
    if let Err(e) = diagnostics.drain(stderr).await {
        tracing::debug!(error = %e, "Failed to read ffmpeg stderr");
    }
}
