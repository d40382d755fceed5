//! Software sequencer that only keeps time.
//!
//! [`ClockedSequencer`] renders nothing: it tracks the playback position of
//! the loaded sequence against wall time and emits an end-of-track meta event
//! when the sequence duration has elapsed. It stands in for a hardware
//! sequencer on machines without one, and in tests.

use super::device::{MetaEventSink, MetaMessage, SequenceData, SequencerDevice};
use mediaplay_common::{PlaybackError, Result};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

struct SoftState {
    events: Option<MetaEventSink>,
    duration_micros: u64,
    /// Position when the current run started (or the paused position).
    position_micros: u64,
    started_at: Option<Instant>,
    /// Bumped by every load and stop. An end-of-track is only reported if
    /// neither happened after it was detected.
    generation: u64,
    loaded: bool,
    closed: bool,
}

impl SoftState {
    fn bump(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }

    fn position(&self) -> u64 {
        match self.started_at {
            Some(started) => (self.position_micros + started.elapsed().as_micros() as u64)
                .min(self.duration_micros),
            None => self.position_micros,
        }
    }
}

struct SoftShared {
    state: Mutex<SoftState>,
    wake: Condvar,
}

/// Wall-clock [`SequencerDevice`] with no audio output.
pub struct ClockedSequencer {
    shared: Arc<SoftShared>,
}

impl ClockedSequencer {
    /// Create a closed device; the arbiter opens it.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(SoftShared {
                state: Mutex::new(SoftState {
                    events: None,
                    duration_micros: 0,
                    position_micros: 0,
                    started_at: None,
                    generation: 0,
                    loaded: false,
                    closed: false,
                }),
                wake: Condvar::new(),
            }),
        }
    }

    /// Current playback position.
    pub fn position_micros(&self) -> u64 {
        self.shared.state.lock().position()
    }
}

impl Default for ClockedSequencer {
    fn default() -> Self {
        Self::new()
    }
}

fn run_timer(shared: Arc<SoftShared>) {
    loop {
        let mut state = shared.state.lock();
        if state.closed {
            return;
        }
        let Some(started) = state.started_at else {
            shared.wake.wait(&mut state);
            continue;
        };

        let remaining = state.duration_micros.saturating_sub(state.position_micros);
        let Some(deadline) = started.checked_add(Duration::from_micros(remaining)) else {
            shared.wake.wait(&mut state);
            continue;
        };
        if Instant::now() < deadline {
            // Woken early by start/stop/seek; re-evaluate.
            shared.wake.wait_until(&mut state, deadline);
            continue;
        }

        state.position_micros = state.duration_micros;
        state.started_at = None;
        let generation = state.generation;
        let events = state.events.clone();
        drop(state);

        log::trace!("soft sequencer reached end of track");
        if let Some(events) = events {
            let unchanged = || shared.state.lock().generation == generation;
            events.emit_if(&MetaMessage::end_of_track(), unchanged);
        }
    }
}

impl SequencerDevice for ClockedSequencer {
    fn open(&mut self, events: MetaEventSink) -> Result<()> {
        let mut state = self.shared.state.lock();
        if state.closed {
            return Err(PlaybackError::DeviceUnavailable(
                "soft sequencer has been closed".into(),
            ));
        }
        if state.events.is_some() {
            return Ok(());
        }
        state.events = Some(events);
        drop(state);

        let shared = Arc::clone(&self.shared);
        thread::Builder::new()
            .name("mediaplay-soft-sequencer".into())
            .spawn(move || run_timer(shared))
            .map_err(|e| PlaybackError::DeviceUnavailable(format!("timer thread: {e}")))?;
        Ok(())
    }

    fn load(&mut self, sequence: &SequenceData) -> Result<()> {
        let mut state = self.shared.state.lock();
        state.bump();
        sequence.validate()?;
        state.duration_micros = sequence.duration_micros();
        state.position_micros = 0;
        state.started_at = None;
        state.loaded = true;
        drop(state);
        self.shared.wake.notify_all();
        Ok(())
    }

    fn set_position_micros(&mut self, micros: u64) -> Result<()> {
        let mut state = self.shared.state.lock();
        state.position_micros = micros.min(state.duration_micros);
        if state.started_at.is_some() {
            state.started_at = Some(Instant::now());
        }
        drop(state);
        self.shared.wake.notify_all();
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        let mut state = self.shared.state.lock();
        if state.closed || state.events.is_none() {
            return Err(PlaybackError::Device("soft sequencer is not open".into()));
        }
        if !state.loaded {
            return Err(PlaybackError::InvalidData("no sequence loaded".into()));
        }
        if state.started_at.is_none() {
            state.started_at = Some(Instant::now());
        }
        drop(state);
        self.shared.wake.notify_all();
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        let mut state = self.shared.state.lock();
        state.bump();
        state.position_micros = state.position();
        state.started_at = None;
        drop(state);
        self.shared.wake.notify_all();
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.shared.state.lock().started_at.is_some()
    }

    fn close(&mut self) {
        let mut state = self.shared.state.lock();
        state.closed = true;
        state.started_at = None;
        state.events = None;
        drop(state);
        self.shared.wake.notify_all();
    }
}

impl Drop for ClockedSequencer {
    fn drop(&mut self) {
        // Never join: the timer may be the thread dropping the last arbiter handle.
        self.close();
    }
}
