//! Unified sound player trait.
//!
//! Both backends expose the same object-safe [`SoundPlayer`] interface, so a
//! library can hand out `Arc<dyn SoundPlayer>` without callers caring whether
//! the sound is a buffered clip or a sequenced score.
//!
//! All operations take `&self`: backends serialize internally and may be
//! driven from device threads at the same time as from the caller.

use crate::state::EndOutcome;
use mediaplay_common::{PlaybackState, PlayerId, Result, WatcherSet};
use std::sync::Arc;

/// Observer of end-of-stream events.
///
/// Callbacks run on the device thread that reported the end, after the
/// player's lock has been released; they may call back into the player.
pub trait SoundWatcher: Send + Sync {
    /// The stream ended and the player is not looping.
    fn sequence_ended(&self, player: &dyn SoundPlayer);

    /// The stream ended and the player restarted it.
    fn sequence_looped(&self, player: &dyn SoundPlayer);
}

/// Object-safe playback control.
///
/// # Example
///
/// ```
/// use mediaplay_sound::SoundPlayer;
///
/// fn restart(player: &dyn SoundPlayer) -> mediaplay_common::Result<()> {
///     player.stop()?;
///     player.play()
/// }
/// ```
pub trait SoundPlayer: Send + Sync {
    /// Identity used by the arbiter and visible to watchers.
    fn id(&self) -> PlayerId;

    /// Play from the beginning.
    ///
    /// Fails with `NotLoaded` before media has been loaded.
    fn play(&self) -> Result<()>;

    /// Halt output and rewind.
    fn stop(&self) -> Result<()>;

    /// Halt output, keeping the position. No-op unless playing.
    fn pause(&self) -> Result<()>;

    /// Continue from the retained position. No-op unless paused.
    fn resume(&self) -> Result<()>;

    /// Reposition without changing state.
    fn seek(&self, position_micros: u64) -> Result<()>;

    /// Takes effect at the next end-of-stream.
    fn set_looping(&self, looping: bool);

    /// Whether the player restarts at end-of-stream.
    fn is_looping(&self) -> bool;

    /// Current lifecycle state.
    fn state(&self) -> PlaybackState;

    /// Check if currently playing.
    fn is_playing(&self) -> bool {
        self.state() == PlaybackState::Playing
    }

    /// Whether media has been loaded.
    fn is_loaded(&self) -> bool;

    /// Register a watcher. Returns `false` if it was already registered.
    fn add_watcher(&self, watcher: &Arc<dyn SoundWatcher>) -> bool;

    /// Unregister a watcher. Removing an absent watcher is a no-op.
    fn remove_watcher(&self, watcher: &Arc<dyn SoundWatcher>) -> bool;
}

/// Deliver the notification that matches an end-of-stream outcome.
pub(crate) fn notify_end(
    watchers: &WatcherSet<dyn SoundWatcher>,
    outcome: EndOutcome,
    player: &dyn SoundPlayer,
) {
    match outcome {
        EndOutcome::Finished => {
            log::debug!("{} finished", player.id());
            watchers.notify(|w| w.sequence_ended(player));
        }
        EndOutcome::Looped => {
            log::debug!("{} looped", player.id());
            watchers.notify(|w| w.sequence_looped(player));
        }
        EndOutcome::Ignored => {}
    }
}
