//! Input inspection with ffprobe.

mod client;
mod summary;
mod types;

pub use client::*;
pub use summary::*;
pub use types::*;
