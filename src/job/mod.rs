//! Supervision of a single ffmpeg job.

mod command;
mod error;
mod options;
pub mod presets;
mod runner;
mod state;

pub use command::*;
pub use error::*;
pub use options::*;
pub use runner::*;
pub use state::*;
