//! Sound playback control.
//!
//! Two backends implement the [`SoundPlayer`] trait on top of the shared
//! [`PlaybackStateMachine`]:
//!
//! - [`ClipBackend`] - a fully buffered clip on its own output line
//! - [`SequencedBackend`] - a sequenced score rendered by the one shared
//!   sequencer device, arbitrated by [`DeviceArbiter`]
//!
//! Device events (clip line stop, end-of-track meta events) arrive on device
//! threads. They are honored only while the player is playing; anything
//! else is a stale callback and is dropped.
//!
//! # Example
//!
//! ```
//! use mediaplay_sound::{
//!     ClockedSequencer, DeviceArbiter, SequenceData, SequencedBackend, SoundPlayer,
//! };
//!
//! let arbiter = DeviceArbiter::new(Box::new(ClockedSequencer::new())).unwrap();
//! let theme = SequencedBackend::new(arbiter.clone());
//! let jingle = SequencedBackend::new(arbiter.clone());
//! theme.load(SequenceData::new(480, 480 * 64, Vec::new())).unwrap();
//! jingle.load(SequenceData::new(480, 480 * 4, Vec::new())).unwrap();
//!
//! theme.play().unwrap();
//! jingle.play().unwrap(); // denied: theme holds the sequencer
//! assert!(theme.is_playing());
//! assert!(!jingle.is_playing());
//!
//! theme.stop().unwrap();
//! jingle.play().unwrap();
//! assert!(jingle.is_playing());
//! arbiter.close();
//! ```

#![warn(missing_docs)]

pub mod clip;
pub mod library;
pub mod player;
pub mod sequenced;
pub mod state;

pub use clip::{
    AudioFormat, ClipBackend, ClipEventSink, ClipLine, ClipMedia, ClipOutput, Encoding, LineEvent,
};
#[cfg(feature = "streaming")]
pub use clip::RodioOutput;
pub use library::{stem_name, SoundLibrary};
pub use player::{SoundPlayer, SoundWatcher};
pub use sequenced::{
    Acquire, ClockedSequencer, DeviceArbiter, DeviceLease, MetaEventListener, MetaEventSink,
    MetaMessage, SequenceData, SequencedBackend, SequencerDevice,
};
pub use state::{EndOutcome, PlaybackStateMachine};
