//! Capture of the external tool's diagnostic output.

mod buffer;
mod sink;

pub use buffer::*;
pub use sink::*;
