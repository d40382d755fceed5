//! Output seam for buffered clips.
//!
//! A [`ClipOutput`] opens one [`ClipLine`] per loaded clip. Lines report
//! start/stop through a [`ClipEventSink`] from their own thread; they must
//! never emit from inside one of their own methods, since the backend calls
//! those while holding its lock.

use super::format::{AudioFormat, ClipMedia};
use mediaplay_common::Result;
use std::sync::{Arc, Weak};

/// Event reported by a clip line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEvent {
    /// Output started.
    Start,
    /// Output stopped, either on request or because the data ran out.
    Stop,
}

/// Opened, buffered output line holding one clip.
pub trait ClipLine: Send {
    /// Start (or continue) output from the current position.
    fn start(&mut self) -> Result<()>;

    /// Halt output, keeping the position.
    fn stop(&mut self) -> Result<()>;

    /// Move to a time offset.
    fn set_position_micros(&mut self, micros: u64) -> Result<()>;

    /// Move to a frame index.
    fn set_frame_position(&mut self, frame: u64) -> Result<()>;

    /// Whether output is running.
    fn is_running(&self) -> bool;

    /// Release the line; no events are reported afterwards.
    fn close(&mut self);
}

/// Factory for clip lines.
pub trait ClipOutput: Send + Sync {
    /// Whether a line for signed little-endian data in `format` can be opened.
    fn supports(&self, format: &AudioFormat) -> bool;

    /// Open a line over already-normalized media.
    fn open(&self, media: ClipMedia, events: ClipEventSink) -> Result<Box<dyn ClipLine>>;
}

pub(crate) trait LineListener: Send + Sync {
    fn line_event(self: Arc<Self>, line: u64, event: LineEvent);
}

/// Where a clip line reports its events.
///
/// Holds the backend weakly: events for a dropped backend, or for a line
/// that has since been replaced, are discarded.
#[derive(Clone)]
pub struct ClipEventSink {
    listener: Option<Weak<dyn LineListener>>,
    line: u64,
}

impl ClipEventSink {
    pub(crate) fn new(listener: Weak<dyn LineListener>, line: u64) -> Self {
        Self {
            listener: Some(listener),
            line,
        }
    }

    /// Sink that drops every event.
    pub fn detached() -> Self {
        Self {
            listener: None,
            line: 0,
        }
    }

    /// Report an event. Returns whether a live backend received it.
    pub fn emit(&self, event: LineEvent) -> bool {
        match self.listener.as_ref().and_then(Weak::upgrade) {
            Some(listener) => {
                listener.line_event(self.line, event);
                true
            }
            None => {
                log::trace!("clip line event {event:?} dropped, backend gone");
                false
            }
        }
    }
}

impl std::fmt::Debug for ClipEventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClipEventSink")
            .field("line", &self.line)
            .field(
                "attached",
                &self.listener.as_ref().is_some_and(|l| l.strong_count() > 0),
            )
            .finish()
    }
}
