//! Playback state machine shared by every sound backend.
//!
//! The machine only tracks state and the looping flag; backends apply the
//! device side effects that go with each transition.
//!
//! | From    | Event                     | To              |
//! |---------|---------------------------|-----------------|
//! | any     | play                      | Playing         |
//! | any     | stop                      | StoppedManually |
//! | Playing | pause                     | Paused          |
//! | Paused  | resume                    | Playing         |
//! | Playing | device end, not looping   | Finished        |
//! | Playing | device end, looping       | Playing         |
//! | other   | device end                | (ignored)       |

use mediaplay_common::PlaybackState;

/// What a backend must do after a device end-of-stream signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndOutcome {
    /// The signal is stale (manual stop, pause, or not started).
    Ignored,
    /// Playback finished; notify `sequence_ended`.
    Finished,
    /// Playback loops; notify `sequence_looped`, rewind and restart.
    Looped,
}

/// Four-state playback lifecycle plus the looping flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlaybackStateMachine {
    state: PlaybackState,
    looping: bool,
}

impl PlaybackStateMachine {
    /// Fresh machine in [`PlaybackState::Finished`].
    pub fn new(looping: bool) -> Self {
        Self {
            state: PlaybackState::Finished,
            looping,
        }
    }

    /// Current state.
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Whether the next end-of-stream loops.
    pub fn is_looping(&self) -> bool {
        self.looping
    }

    /// Takes effect at the next end-of-stream evaluation.
    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    /// Enter `Playing` from any state.
    pub fn play(&mut self) {
        self.state = PlaybackState::Playing;
    }

    /// Enter `StoppedManually` from any state.
    pub fn stop(&mut self) {
        self.state = PlaybackState::StoppedManually;
    }

    /// `Playing` to `Paused`. Returns whether the transition happened.
    pub fn pause(&mut self) -> bool {
        if self.state == PlaybackState::Playing {
            self.state = PlaybackState::Paused;
            true
        } else {
            false
        }
    }

    /// `Paused` to `Playing`. Returns whether the transition happened.
    pub fn resume(&mut self) -> bool {
        if self.state == PlaybackState::Paused {
            self.state = PlaybackState::Playing;
            true
        } else {
            false
        }
    }

    /// Evaluate a device end-of-stream signal.
    pub fn device_ended(&mut self) -> EndOutcome {
        if self.state != PlaybackState::Playing {
            return EndOutcome::Ignored;
        }
        if self.looping {
            EndOutcome::Looped
        } else {
            self.state = PlaybackState::Finished;
            EndOutcome::Finished
        }
    }
}
