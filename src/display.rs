//! Colored CLI display utilities for job output.

use std::io::{self, Write};
use std::time::Duration;

use chrono::Utc;
use owo_colors::OwoColorize;

use crate::job::{JobProgress, RunError};
use crate::probe::Summary;

/// Get current timestamp in the same format as tracing.
fn timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

/// Format a completion fraction as a percentage, or `?` when unknown.
#[must_use]
pub fn format_complete(progress: &JobProgress) -> String {
    if progress.is_known() {
        format!("{:5.1}%", (progress.complete * 100.0).clamp(0.0, 100.0))
    } else {
        "    ?".to_string()
    }
}

/// Format a duration as `HH:MM:SS.mmm`.
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    format!(
        "{:02}:{:02}:{:02}.{:03}",
        total / 3600,
        (total / 60) % 60,
        total % 60,
        duration.subsec_millis()
    )
}

/// Print a probe summary.
pub fn print_summary(input: &str, summary: &Summary) {
    let dimensions = if summary.has_video {
        format!("{}x{}", summary.width, summary.height)
    } else {
        "no video".to_string()
    };
    println!(
        "{} {} {} duration={} {} audio={}",
        timestamp().dimmed(),
        "[PROBE]".blue().bold(),
        input.cyan(),
        format_duration(summary.duration),
        dimensions,
        summary.has_audio
    );
    let _ = io::stdout().flush();
}

/// Print a progress report.
pub fn print_progress(progress: &JobProgress) {
    let tag = if progress.done {
        "[DONE]".green().bold().to_string()
    } else {
        "[PROGRESS]".cyan().bold().to_string()
    };
    println!(
        "{} {} {} speed={:.2}x",
        timestamp().dimmed(),
        tag,
        format_complete(progress),
        progress.speed
    );
    let _ = io::stdout().flush();
}

/// Print job completion.
pub fn print_success(output: &str) {
    println!(
        "{} {} {}",
        timestamp().dimmed(),
        "[JOB]".green().bold(),
        output
    );
    let _ = io::stdout().flush();
}

/// Print a failed job. The rendered error carries the diagnostic lines.
pub fn print_failure(err: &RunError) {
    eprintln!(
        "{} {} {}",
        timestamp().dimmed(),
        "[ERROR]".red().bold(),
        err.red()
    );
    if err.is_invalid_input() {
        eprintln!("{} input is not valid media", "[INVALID]".yellow().bold());
    } else if err.is_cancelled() {
        eprintln!("{} job cancelled", "[CANCELLED]".yellow().bold());
    }
    let _ = io::stderr().flush();
}
