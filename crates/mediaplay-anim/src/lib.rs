//! Tick-driven frame animation.
//!
//! An [`AnimationSequencer`] maps elapsed time onto a frame index over a
//! shared [`FrameSource`], notifying [`SequenceWatcher`]s when a cycle ends
//! or loops. [`GroupSequencer`] adds lookup by frame name over a
//! [`NamedFrameSource`]. Ticks come from a [`Clock`]: [`IntervalClock`] for
//! wall time, [`ManualClock`] when an external loop owns timing.
//!
//! # Example
//!
//! ```
//! use mediaplay_anim::{GroupSequencer, ManualClock, NamedFrameSource};
//! use std::sync::Arc;
//!
//! let group = Arc::new(
//!     NamedFrameSource::from_named([("idle", 0u8), ("walk1", 1), ("walk2", 2)]).unwrap(),
//! );
//! let clock = ManualClock::new();
//! let seq = GroupSequencer::with_clock(group, 200, clock.clone());
//!
//! seq.set_current_by_name("walk1").unwrap();
//! seq.start();
//! clock.fire(200);
//! assert_eq!(seq.current_name(), Some("walk2"));
//! ```

#![warn(missing_docs)]

pub mod clock;
pub mod group;
pub mod library;
pub mod sequencer;
pub mod source;

pub use clock::{Clock, IntervalClock, ManualClock, TickTarget};
pub use group::GroupSequencer;
pub use library::{FrameEntry, FrameLibrary};
pub use sequencer::{AdvanceResult, AnimationSequencer, SequenceWatcher};
pub use source::{FrameSource, FrameStore, NamedFrameSource};
