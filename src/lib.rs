//! ff-supervisor - supervised ffmpeg jobs with structured progress and errors.

pub mod config;
pub mod diagnostics;
pub mod display;
pub mod job;
pub mod probe;
pub mod progress;

pub use job::{is_invalid_input, FfRunner, JobError, JobProgress, RunError, RunOptions};
pub use probe::{Probe, Summary};
