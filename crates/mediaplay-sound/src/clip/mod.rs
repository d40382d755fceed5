//! Buffered clip playback.

mod backend;
mod device;
mod format;
#[cfg(feature = "streaming")]
mod rodio_output;

pub use backend::ClipBackend;
pub use device::{ClipEventSink, ClipLine, ClipOutput, LineEvent};
pub use format::{normalize, AudioFormat, ClipMedia, Encoding};
#[cfg(feature = "streaming")]
pub use rodio_output::RodioOutput;
