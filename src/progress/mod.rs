//! ffmpeg progress protocol: line decoding, record assembly and transports.

mod assembler;
mod line;
mod listener;

pub use assembler::*;
pub use line::*;
pub use listener::*;
