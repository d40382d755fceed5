//! Sound player over a buffered clip line.

use super::device::{ClipEventSink, ClipLine, ClipOutput, LineEvent, LineListener};
use super::format::ClipMedia;
use crate::player::{notify_end, SoundPlayer, SoundWatcher};
use crate::state::{EndOutcome, PlaybackStateMachine};
use mediaplay_common::{PlaybackError, PlaybackState, PlayerId, Result, WatcherSet};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};

struct ClipCore {
    machine: PlaybackStateMachine,
    line: Option<Box<dyn ClipLine>>,
    /// Bumped whenever the line is replaced; events carry the value they
    /// were opened with.
    line_generation: u64,
}

struct ClipInner {
    id: PlayerId,
    output: Arc<dyn ClipOutput>,
    core: Mutex<ClipCore>,
    watchers: WatcherSet<dyn SoundWatcher>,
}

/// Sound player that plays a fully buffered clip.
///
/// Clones are handles to the same player.
#[derive(Clone)]
pub struct ClipBackend {
    inner: Arc<ClipInner>,
}

impl ClipBackend {
    /// Create an empty player on `output`. Nothing plays until
    /// [`load`](Self::load) succeeds.
    pub fn new(output: Arc<dyn ClipOutput>) -> Self {
        Self {
            inner: Arc::new(ClipInner {
                id: PlayerId::next(),
                output,
                core: Mutex::new(ClipCore {
                    machine: PlaybackStateMachine::default(),
                    line: None,
                    line_generation: 0,
                }),
                watchers: WatcherSet::new(),
            }),
        }
    }

    /// Normalize `media` and open a line for it, replacing any previous clip.
    ///
    /// Fails with `UnsupportedFormat` when the data cannot be converted or the
    /// output rejects the converted format.
    pub fn load(&self, media: ClipMedia) -> Result<()> {
        let media = media.normalized()?;
        if !self.inner.output.supports(&media.format) {
            return Err(PlaybackError::UnsupportedFormat(format!(
                "output cannot play {}",
                media.format
            )));
        }

        let mut core = self.inner.core.lock();
        let generation = core.line_generation.wrapping_add(1);
        let listener: Weak<dyn LineListener> = Arc::downgrade(&self.inner) as _;
        let frames = media.frame_count();
        let line = self
            .inner
            .output
            .open(media, ClipEventSink::new(listener, generation))?;

        if let Some(mut old) = core.line.replace(line) {
            old.close();
        }
        core.line_generation = generation;
        if core.machine.state() != PlaybackState::Finished {
            core.machine.stop();
        }
        log::debug!("{} loaded clip ({frames} frames)", self.inner.id);
        Ok(())
    }

    /// Release the line. The player reads as not loaded afterwards.
    pub fn close(&self) {
        let mut core = self.inner.core.lock();
        if let Some(mut line) = core.line.take() {
            line.close();
            core.line_generation = core.line_generation.wrapping_add(1);
            core.machine.stop();
        }
    }

    /// Whether the underlying line reports running output.
    pub fn is_line_running(&self) -> bool {
        self.inner
            .core
            .lock()
            .line
            .as_ref()
            .is_some_and(|line| line.is_running())
    }
}

impl LineListener for ClipInner {
    fn line_event(self: Arc<Self>, line: u64, event: LineEvent) {
        if event != LineEvent::Stop {
            log::trace!("{} line event {event:?}", self.id);
            return;
        }

        let outcome = {
            let mut core = self.core.lock();
            if core.line_generation != line || core.line.is_none() {
                log::trace!("{} stop from replaced line ignored", self.id);
                return;
            }
            let outcome = core.machine.device_ended();
            if outcome == EndOutcome::Looped {
                if let Some(line) = core.line.as_mut() {
                    let restarted = line.set_frame_position(0).and_then(|()| line.start());
                    if let Err(err) = restarted {
                        log::warn!("{} could not restart looping clip: {err}", self.id);
                    }
                }
            }
            outcome
        };

        if outcome == EndOutcome::Ignored {
            log::trace!("{} stale stop event ignored", self.id);
            return;
        }
        let backend = ClipBackend { inner: self };
        notify_end(&backend.inner.watchers, outcome, &backend);
    }
}

impl SoundPlayer for ClipBackend {
    fn id(&self) -> PlayerId {
        self.inner.id
    }

    fn play(&self) -> Result<()> {
        let mut core = self.inner.core.lock();
        let line = core.line.as_mut().ok_or(PlaybackError::NotLoaded)?;
        line.set_frame_position(0)?;
        line.start()?;
        core.machine.play();
        log::debug!("{} playing", self.inner.id);
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        let mut core = self.inner.core.lock();
        let ClipCore { machine, line, .. } = &mut *core;
        let Some(line) = line.as_mut() else {
            return Ok(());
        };
        machine.stop();
        line.stop()?;
        line.set_frame_position(0)
    }

    fn pause(&self) -> Result<()> {
        let mut core = self.inner.core.lock();
        let ClipCore { machine, line, .. } = &mut *core;
        match line.as_mut() {
            Some(line) if machine.pause() => line.stop(),
            _ => Ok(()),
        }
    }

    fn resume(&self) -> Result<()> {
        let mut core = self.inner.core.lock();
        let ClipCore { machine, line, .. } = &mut *core;
        match line.as_mut() {
            Some(line) if machine.resume() => line.start(),
            _ => Ok(()),
        }
    }

    fn seek(&self, position_micros: u64) -> Result<()> {
        match self.inner.core.lock().line.as_mut() {
            Some(line) => line.set_position_micros(position_micros),
            None => Ok(()),
        }
    }

    fn set_looping(&self, looping: bool) {
        self.inner.core.lock().machine.set_looping(looping);
    }

    fn is_looping(&self) -> bool {
        self.inner.core.lock().machine.is_looping()
    }

    fn state(&self) -> PlaybackState {
        self.inner.core.lock().machine.state()
    }

    fn is_loaded(&self) -> bool {
        self.inner.core.lock().line.is_some()
    }

    fn add_watcher(&self, watcher: &Arc<dyn SoundWatcher>) -> bool {
        self.inner.watchers.add(watcher)
    }

    fn remove_watcher(&self, watcher: &Arc<dyn SoundWatcher>) -> bool {
        self.inner.watchers.remove(watcher)
    }
}

impl Drop for ClipInner {
    fn drop(&mut self) {
        if let Some(mut line) = self.core.get_mut().line.take() {
            line.close();
        }
    }
}

impl std::fmt::Debug for ClipBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let core = self.inner.core.lock();
        f.debug_struct("ClipBackend")
            .field("id", &self.inner.id)
            .field("state", &core.machine.state())
            .field("looping", &core.machine.is_looping())
            .field("loaded", &core.line.is_some())
            .finish()
    }
}
