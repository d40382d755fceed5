//! Playback control for frame animations and sounds.
//!
//! This crate bundles the mediaplay workspace behind one dependency:
//!
//! - [`anim`] - tick-driven frame sequencing ([`AnimationSequencer`],
//!   [`GroupSequencer`]) over shared frame sources
//! - [`sound`] - clip and sequenced sound players sharing one
//!   [`PlaybackState`] lifecycle, with exclusive sequencer access through
//!   [`DeviceArbiter`]
//! - [`common`] - errors, configuration and the watcher registry
//!
//! # Crate feature flags
//! - `streaming` (opt-in): real audio output for clips through rodio
//!   (`sound::RodioOutput`)
//!
//! # Quick start
//! ```
//! use mediaplay::prelude::*;
//! use std::sync::Arc;
//!
//! let frames = Arc::new(FrameSource::from_frames(vec!['a', 'b', 'c']));
//! let clock = ManualClock::new();
//! let seq = AnimationSequencer::with_clock(frames, 100, clock.clone());
//! seq.start();
//! clock.fire(250);
//! assert_eq!(seq.current_frame(), Some(&'c'));
//! ```

#![warn(missing_docs)]

pub use mediaplay_anim as anim;
pub use mediaplay_common as common;
pub use mediaplay_sound as sound;

pub use mediaplay_anim::{AnimationSequencer, GroupSequencer};
pub use mediaplay_common::{PlaybackConfig, PlaybackError, PlaybackState, Result};
pub use mediaplay_sound::{ClipBackend, DeviceArbiter, SequencedBackend, SoundPlayer};

/// Everything needed to drive animations and sounds.
pub mod prelude {
    pub use mediaplay_anim::{
        AdvanceResult, AnimationSequencer, Clock, FrameLibrary, FrameSource, GroupSequencer,
        IntervalClock, ManualClock, NamedFrameSource, SequenceWatcher,
    };
    pub use mediaplay_common::{
        PlaybackConfig, PlaybackError, PlaybackState, PlayerId, Result,
    };
    pub use mediaplay_sound::{
        AudioFormat, ClipBackend, ClipMedia, ClockedSequencer, DeviceArbiter, SequenceData,
        SequencedBackend, SoundLibrary, SoundPlayer, SoundWatcher,
    };
}
