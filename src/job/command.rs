//! ffmpeg / ffprobe command lines and process control.
//!
//! See <https://ffmpeg.org/ffmpeg-all.html> for the flag reference.

use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::{Child, ChildStderr, ChildStdout, Command};

const F_HIDE_BANNER: &str = "-hide_banner";
const F_VERBOSE: &str = "-v";
const F_INPUT: &str = "-i";
const F_OVERWRITE: &str = "-y";
const F_PROGRESS: &str = "-progress";
const F_STATS_PERIOD: &str = "-stats_period";
const F_SEEKABLE: &str = "-seekable";
const F_XERROR: &str = "-xerror";
const F_NO_STDIN: &str = "-nostdin";

const F_PROBE_PRINT_FORMAT: &str = "-print_format";
const F_PROBE_SHOW_FORMAT: &str = "-show_format";
const F_PROBE_SHOW_STREAMS: &str = "-show_streams";

const PRINT_FORMAT_JSON: &str = "json";
const VERBOSE_ERROR: &str = "error";

/// Progress target writing the report to standard output.
pub const PROGRESS_PIPE: &str = "pipe:1";

/// Error type for process spawning operations.
#[derive(thiserror::Error, Debug)]
pub enum SpawnError {
    /// The binary was not found.
    #[error("binary not found")]
    NotFound,
    /// Permission denied when spawning.
    #[error("permission denied")]
    PermissionDenied,
    /// Other I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SpawnError {
    /// Create a `SpawnError` from an I/O error, classifying common cases.
    #[must_use]
    pub fn from_io(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound,
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied,
            _ => Self::Io(err),
        }
    }
}

/// Returns true for inputs read over HTTP(S), which need `-seekable 1`.
#[must_use]
pub fn is_http_input(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Render a stats period the way ffmpeg expects it (`1`, `0.5`).
#[must_use]
pub fn format_period(period: Duration) -> String {
    period.as_secs_f64().to_string()
}

/// Builder for the ffmpeg command line of a supervised job.
#[derive(Debug, Clone)]
pub struct FfmpegArgs {
    input: String,
    output: String,
    input_args: Vec<String>,
    args: Vec<String>,
    progress_target: String,
    progress_period: Duration,
}

impl FfmpegArgs {
    /// Create a builder for `input` -> `output`, reporting progress to stdout
    /// once per second.
    #[must_use]
    pub fn new(input: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            input_args: Vec::new(),
            args: Vec::new(),
            progress_target: PROGRESS_PIPE.to_string(),
            progress_period: Duration::from_secs(1),
        }
    }

    /// Arguments placed before `-i`.
    #[must_use]
    pub fn input_args(mut self, args: &[String]) -> Self {
        self.input_args = args.to_vec();
        self
    }

    /// Arguments placed between the input and the output.
    #[must_use]
    pub fn args(mut self, args: &[String]) -> Self {
        self.args = args.to_vec();
        self
    }

    /// Where ffmpeg sends its progress report (`pipe:1` or a URL).
    #[must_use]
    pub fn progress_target(mut self, target: impl Into<String>) -> Self {
        self.progress_target = target.into();
        self
    }

    /// Interval between progress reports.
    #[must_use]
    pub fn progress_period(mut self, period: Duration) -> Self {
        self.progress_period = period;
        self
    }

    /// Build the command-line arguments.
    #[must_use]
    pub fn build_args(&self) -> Vec<String> {
        let mut args: Vec<String> = [
            F_HIDE_BANNER,
            F_OVERWRITE,
            F_VERBOSE,
            VERBOSE_ERROR,
            F_XERROR,
            F_NO_STDIN,
            F_PROGRESS,
        ]
        .into_iter()
        .map(String::from)
        .collect();
        args.push(self.progress_target.clone());
        args.push(F_STATS_PERIOD.to_string());
        args.push(format_period(self.progress_period));

        if is_http_input(&self.input) {
            args.push(F_SEEKABLE.to_string());
            args.push("1".to_string());
        }

        args.extend(self.input_args.iter().cloned());
        args.push(F_INPUT.to_string());
        args.push(self.input.clone());
        args.extend(self.args.iter().cloned());
        args.push(self.output.clone());

        args
    }
}

/// Build the ffprobe command line for `input`.
#[must_use]
pub fn probe_args(input: &str) -> Vec<String> {
    let mut args: Vec<String> = [
        F_HIDE_BANNER,
        F_VERBOSE,
        VERBOSE_ERROR,
        F_PROBE_PRINT_FORMAT,
        PRINT_FORMAT_JSON,
        F_PROBE_SHOW_FORMAT,
        F_PROBE_SHOW_STREAMS,
    ]
    .into_iter()
    .map(String::from)
    .collect();

    if is_http_input(input) {
        args.push(F_SEEKABLE.to_string());
        args.push("1".to_string());
    }
    args.push(input.to_string());
    args
}

/// Shell-escaped rendering of a command line, for logs.
#[must_use]
pub fn command_line(binary: &str, args: &[String]) -> String {
    std::iter::once(binary)
        .chain(args.iter().map(String::as_str))
        .map(|arg| shell_escape::escape(arg.into()).into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

/// A running external tool process.
///
/// Standard input is closed, standard error is piped. The process is killed
/// if this handle is dropped before it exits.
#[derive(Debug)]
pub struct ToolProcess {
    child: Child,
}

impl ToolProcess {
    /// Spawn `binary` with `args`, sending standard output to `stdout`.
    ///
    /// # Errors
    ///
    /// Returns `SpawnError` if the process fails to spawn.
    pub fn spawn(binary: &str, args: &[String], stdout: Stdio) -> Result<Self, SpawnError> {
        let child = Command::new(binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(SpawnError::from_io)?;

        Ok(Self { child })
    }

    /// Take ownership of the stdout handle.
    ///
    /// This can only be called once; subsequent calls return `None`.
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    /// Take ownership of the stderr handle.
    ///
    /// This can only be called once; subsequent calls return `None`.
    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.child.stderr.take()
    }

    /// Get the process ID, if still running.
    #[must_use]
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Wait for the process to exit.
    ///
    /// # Errors
    ///
    /// Returns an error if waiting fails.
    pub async fn wait(&mut self) -> std::io::Result<ExitStatus> {
        self.child.wait().await
    }

    /// Forcefully kill the process.
    ///
    /// # Errors
    ///
    /// Returns an error if the kill signal cannot be sent.
    pub async fn kill(&mut self) -> std::io::Result<()> {
        self.child.kill().await
    }

    /// Attempt graceful termination with a timeout.
    ///
    /// On Unix, sends SIGTERM first, then SIGKILL after the timeout.
    /// On other platforms, falls back to immediate kill.
    ///
    /// # Errors
    ///
    /// Returns an error if termination fails.
    pub async fn graceful_terminate(&mut self, timeout: Duration) -> std::io::Result<()> {
        #[cfg(unix)]
        {
            self.graceful_terminate_unix(timeout).await
        }

        #[cfg(not(unix))]
        {
            let _ = timeout;
            self.kill().await
        }
    }

    #[cfg(unix)]
    async fn graceful_terminate_unix(&mut self, timeout: Duration) -> std::io::Result<()> {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let Some(pid) = self.id() else {
            // Already reaped.
            return Ok(());
        };

        let nix_pid = Pid::from_raw(i32::try_from(pid).unwrap_or(i32::MAX));
        let _ = kill(nix_pid, Signal::SIGTERM);

        match tokio::time::timeout(timeout, self.child.wait()).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(e),
            Err(_) => self.child.kill().await,
        }
    }
}
