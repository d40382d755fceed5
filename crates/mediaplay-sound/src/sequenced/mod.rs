//! Sequenced (MIDI-style) playback through one shared sequencer device.

mod arbiter;
mod backend;
mod device;
mod soft;

pub use arbiter::{Acquire, DeviceArbiter, DeviceLease, MetaEventListener};
pub use backend::SequencedBackend;
pub use device::{
    MetaEventSink, MetaMessage, SequenceData, SequencerDevice, DEFAULT_TEMPO_MICROS_PER_QUARTER,
};
pub use soft::ClockedSequencer;
