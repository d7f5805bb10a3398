//! Assembles decoded progress lines into progress records.
//!
//! ffmpeg writes a block of `key=value` lines per report cycle and closes
//! each block with `progress=continue` (or `progress=done` for the last one).
//! The assembler accumulates the fields it understands and hands out a
//! finished [`Progress`] every time it sees the `progress` key.

use std::io::ErrorKind;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use super::ProgressLine;

/// Key carrying elapsed output time in microseconds.
pub const KEY_OUT_TIME_US: &str = "out_time_us";
/// Key carrying the processing speed, e.g. `10.8x`.
pub const KEY_SPEED: &str = "speed";
/// Key that closes a report block.
pub const KEY_PROGRESS: &str = "progress";
/// Value of [`KEY_PROGRESS`] on the final block.
pub const PROGRESS_DONE: &str = "done";

/// One report cycle of ffmpeg progress.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Progress {
    /// True for the final report.
    pub done: bool,
    /// Processing speed relative to realtime (`10.8x` is `10.8`).
    pub speed: f64,
    /// Elapsed output time.
    pub out_time: Duration,
}

/// Stateful accumulator of progress fields for a single stream.
#[derive(Debug, Default)]
pub struct ProgressAssembler {
    current: Progress,
}

impl ProgressAssembler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one raw line.
    ///
    /// Returns the completed record when the line closes a report block.
    /// Malformed lines and unparseable values are skipped.
    pub fn push_line(&mut self, raw: &str) -> Option<Progress> {
        let Ok(line) = ProgressLine::parse(raw) else {
            tracing::trace!(line = raw, "Skipping malformed progress line");
            return None;
        };

        match line.key.as_str() {
            KEY_OUT_TIME_US => {
                if let Ok(us) = line.value.trim().parse::<u64>() {
                    self.current.out_time = Duration::from_micros(us);
                }
                None
            }
            KEY_SPEED => {
                if let Some(speed) = parse_speed(&line.value) {
                    self.current.speed = speed;
                }
                None
            }
            KEY_PROGRESS => {
                self.current.done = line.value == PROGRESS_DONE;
                Some(std::mem::take(&mut self.current))
            }
            _ => None,
        }
    }

    #[cfg(test)]
    fn pending(&self) -> &Progress {
        &self.current
    }
}

/// Parse a speed value like `11.9x`.
fn parse_speed(value: &str) -> Option<f64> {
    let value = value.trim();
    let number = value.strip_suffix('x').unwrap_or(value);
    number.trim().parse().ok()
}

/// Longest progress line accepted. Longer lines are skipped up to their
/// newline.
pub const MAX_PROGRESS_LINE: usize = 64 * 1024;

/// Read progress lines until end of stream, calling `on_progress` for every
/// completed record.
///
/// This is the consumer shared by the pipe and the HTTP listener transports.
/// Lines are decoded lossily, so invalid UTF-8 only spoils the line it
/// appears on.
///
/// # Errors
///
/// Returns the underlying I/O error if reading fails. A broken pipe is
/// treated as end of stream.
pub async fn read_progress<R, F>(mut reader: R, mut on_progress: F) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    F: FnMut(Progress),
{
    let mut assembler = ProgressAssembler::new();
    let mut buf = Vec::new();
    let mut oversized = false;

    loop {
        buf.clear();
        let limit = (MAX_PROGRESS_LINE + 1) as u64;
        match (&mut reader).take(limit).read_until(b'\n', &mut buf).await {
            Ok(0) => return Ok(()),
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::BrokenPipe => return Ok(()),
            Err(e) => return Err(e),
        }

        let terminated = buf.last() == Some(&b'\n');
        if oversized {
            oversized = !terminated;
            continue;
        }
        if !terminated && buf.len() > MAX_PROGRESS_LINE {
            tracing::trace!(limit = MAX_PROGRESS_LINE, "Skipping oversized progress line");
            oversized = true;
            continue;
        }

        let line = trim_newline(&buf);
        if let Some(progress) = assembler.push_line(&String::from_utf8_lossy(line)) {
            on_progress(progress);
        }
    }
}

fn trim_newline(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
