//! Sequencer device seam and sequence data.

use mediaplay_common::{PlaybackError, Result};
use std::sync::{Arc, Weak};

/// Default tempo: 120 beats per minute.
pub const DEFAULT_TEMPO_MICROS_PER_QUARTER: u32 = 500_000;

/// Meta event emitted by a sequencer while playing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaMessage {
    /// Meta event type byte
    pub kind: u8,
    /// Event payload
    pub data: Vec<u8>,
}

impl MetaMessage {
    /// Meta type marking the end of a track.
    pub const END_OF_TRACK: u8 = 0x2F;

    /// Meta event without payload.
    pub fn new(kind: u8) -> Self {
        Self {
            kind,
            data: Vec::new(),
        }
    }

    /// End-of-track marker.
    pub fn end_of_track() -> Self {
        Self::new(Self::END_OF_TRACK)
    }

    /// Whether this is the end-of-track marker.
    pub fn is_end_of_track(&self) -> bool {
        self.kind == Self::END_OF_TRACK
    }
}

/// Timed event stream for a sequencer device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceData {
    /// Ticks per quarter note
    pub resolution_ppq: u16,
    /// Tempo (microseconds per quarter note)
    pub tempo_micros_per_quarter: u32,
    /// Length of the longest track in ticks
    pub length_ticks: u64,
    /// Raw event bytes, interpreted by the device
    pub events: Vec<u8>,
}

impl SequenceData {
    /// Sequence at the default tempo.
    pub fn new(resolution_ppq: u16, length_ticks: u64, events: Vec<u8>) -> Self {
        Self {
            resolution_ppq,
            tempo_micros_per_quarter: DEFAULT_TEMPO_MICROS_PER_QUARTER,
            length_ticks,
            events,
        }
    }

    /// Override the tempo.
    pub fn with_tempo(mut self, micros_per_quarter: u32) -> Self {
        self.tempo_micros_per_quarter = micros_per_quarter;
        self
    }

    /// Reject timing a device cannot schedule.
    pub fn validate(&self) -> Result<()> {
        if self.resolution_ppq == 0 {
            return Err(PlaybackError::InvalidData(
                "sequence resolution must be non-zero".into(),
            ));
        }
        if self.tempo_micros_per_quarter == 0 {
            return Err(PlaybackError::InvalidData(
                "sequence tempo must be non-zero".into(),
            ));
        }
        Ok(())
    }

    /// Playing time at the sequence tempo.
    pub fn duration_micros(&self) -> u64 {
        if self.resolution_ppq == 0 {
            return 0;
        }
        (u128::from(self.length_ticks) * u128::from(self.tempo_micros_per_quarter)
            / u128::from(self.resolution_ppq)) as u64
    }
}

/// The single shared sequencer.
///
/// Only the [`DeviceArbiter`](super::DeviceArbiter) calls these methods, under
/// its lock. Meta events must be delivered through the [`MetaEventSink`]
/// from the device's own thread, never from inside one of these calls.
pub trait SequencerDevice: Send {
    /// Acquire the device and register the event sink.
    fn open(&mut self, events: MetaEventSink) -> Result<()>;

    /// Replace the current sequence. Fails with `InvalidData` when the
    /// sequence cannot be played.
    fn load(&mut self, sequence: &SequenceData) -> Result<()>;

    /// Move to a time offset.
    fn set_position_micros(&mut self, micros: u64) -> Result<()>;

    /// Start (or continue) playback from the current position.
    fn start(&mut self) -> Result<()>;

    /// Halt playback, keeping the position.
    ///
    /// Also called on an idle device when its holder gives it up; an
    /// end-of-track detected before this call must not be reported after it.
    fn stop(&mut self) -> Result<()>;

    /// Whether playback is running.
    fn is_running(&self) -> bool;

    /// Release the device.
    fn close(&mut self);
}

pub(crate) trait MetaRouter: Send + Sync {
    fn route(self: Arc<Self>, message: &MetaMessage, still_current: &dyn Fn() -> bool);
}

/// Where a sequencer device delivers its meta events.
#[derive(Clone)]
pub struct MetaEventSink {
    router: Option<Weak<dyn MetaRouter>>,
}

impl MetaEventSink {
    pub(crate) fn new(router: Weak<dyn MetaRouter>) -> Self {
        Self {
            router: Some(router),
        }
    }

    /// Sink that drops every event.
    pub fn detached() -> Self {
        Self { router: None }
    }

    /// Deliver an event. Returns whether a live arbiter received it.
    pub fn emit(&self, message: &MetaMessage) -> bool {
        self.emit_if(message, || true)
    }

    /// Deliver an event unless `still_current` returns `false`.
    ///
    /// The check runs under the arbiter lock, after any device call already
    /// in progress and before the recipient is chosen. It must not call back
    /// into the arbiter.
    pub fn emit_if(&self, message: &MetaMessage, still_current: impl Fn() -> bool) -> bool {
        match self.router.as_ref().and_then(Weak::upgrade) {
            Some(router) => {
                router.route(message, &still_current);
                true
            }
            None => false,
        }
    }
}

impl std::fmt::Debug for MetaEventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetaEventSink")
            .field(
                "attached",
                &self.router.as_ref().is_some_and(|r| r.strong_count() > 0),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_from_tempo() {
        // 4 quarters at 120 bpm.
        let sequence = SequenceData::new(480, 1920, Vec::new());
        assert_eq!(sequence.duration_micros(), 2_000_000);
        assert_eq!(sequence.with_tempo(250_000).duration_micros(), 1_000_000);
    }

    #[test]
    fn test_zero_resolution_is_invalid() {
        let sequence = SequenceData::new(0, 100, Vec::new());
        assert!(matches!(
            sequence.validate(),
            Err(PlaybackError::InvalidData(_))
        ));
        assert_eq!(sequence.duration_micros(), 0);
    }

    #[test]
    fn test_detached_sink_drops_events() {
        assert!(!MetaEventSink::detached().emit(&MetaMessage::end_of_track()));
        assert!(MetaMessage::end_of_track().is_end_of_track());
        assert!(!MetaMessage::new(0x51).is_end_of_track());
    }
}
