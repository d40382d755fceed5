//! Playback state and player identity.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Lifecycle of a sound player.
///
/// Device-originated end-of-stream signals are honored only while the state is
/// [`PlaybackState::Playing`]; in every other state they are stale and ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    /// `stop()` was called; position is back at the start.
    StoppedManually,
    /// `pause()` was called while playing; position retained.
    Paused,
    /// Device output is running.
    Playing,
    /// Reached the end without looping, or never played.
    #[default]
    Finished,
}

impl PlaybackState {
    /// Whether device output should currently be running.
    pub fn is_playing(self) -> bool {
        self == PlaybackState::Playing
    }

    /// Short lowercase label, used in log lines.
    pub fn as_str(self) -> &'static str {
        match self {
            PlaybackState::StoppedManually => "stopped",
            PlaybackState::Paused => "paused",
            PlaybackState::Playing => "playing",
            PlaybackState::Finished => "finished",
        }
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Process-unique identity of a sound player.
///
/// The arbiter compares holders by id, and watchers can use it to tell
/// which player a callback came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlayerId(u64);

static NEXT_PLAYER_ID: AtomicU64 = AtomicU64::new(1);

impl PlayerId {
    /// Allocate a fresh id.
    pub fn next() -> Self {
        PlayerId(NEXT_PLAYER_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "player#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_is_finished() {
        assert_eq!(PlaybackState::default(), PlaybackState::Finished);
        assert!(!PlaybackState::default().is_playing());
    }

    #[test]
    fn test_player_ids_are_unique() {
        let a = PlayerId::next();
        let b = PlayerId::next();
        assert_ne!(a, b);
        assert!(b.get() > a.get());
    }
}
