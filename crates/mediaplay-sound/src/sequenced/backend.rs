//! Sound player that renders through the shared sequencer.

use super::arbiter::{Acquire, DeviceArbiter, MetaEventListener};
use super::device::{MetaMessage, SequenceData};
use crate::player::{notify_end, SoundPlayer, SoundWatcher};
use crate::state::{EndOutcome, PlaybackStateMachine};
use mediaplay_common::{PlaybackError, PlaybackState, PlayerId, Result, WatcherSet};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};

struct SequencedCore {
    machine: PlaybackStateMachine,
    sequence: Option<Arc<SequenceData>>,
}

struct SequencedInner {
    id: PlayerId,
    arbiter: DeviceArbiter,
    me: Weak<SequencedInner>,
    core: Mutex<SequencedCore>,
    watchers: WatcherSet<dyn SoundWatcher>,
}

impl SequencedInner {
    fn listener(&self) -> Option<Arc<dyn MetaEventListener>> {
        self.me
            .upgrade()
            .map(|inner| inner as Arc<dyn MetaEventListener>)
    }
}

/// Sound player for sequenced (MIDI-style) scores.
///
/// Playing requires holding the arbiter's device. A player that is denied
/// stays silent; `pause`, `resume` and `seek` only reach the device while
/// this player holds it. A player that finished naturally keeps holding the
/// device until it is stopped.
///
/// Clones are handles to the same player.
#[derive(Clone)]
pub struct SequencedBackend {
    inner: Arc<SequencedInner>,
}

impl SequencedBackend {
    /// Create an empty player that competes for `arbiter`'s device.
    pub fn new(arbiter: DeviceArbiter) -> Self {
        let inner = Arc::new_cyclic(|me| SequencedInner {
            id: PlayerId::next(),
            arbiter,
            me: me.clone(),
            core: Mutex::new(SequencedCore {
                machine: PlaybackStateMachine::default(),
                sequence: None,
            }),
            watchers: WatcherSet::new(),
        });
        Self { inner }
    }

    /// Attach the sequence to play. Replaces any previous sequence; the new
    /// one is handed to the device on the next `play`.
    pub fn load(&self, sequence: SequenceData) -> Result<()> {
        sequence.validate()?;
        log::debug!(
            "{} loaded sequence ({} us)",
            self.inner.id,
            sequence.duration_micros()
        );
        self.inner.core.lock().sequence = Some(Arc::new(sequence));
        Ok(())
    }

    /// The arbiter this player competes for.
    pub fn arbiter(&self) -> &DeviceArbiter {
        &self.inner.arbiter
    }

    /// Whether this player currently holds the device.
    pub fn holds_device(&self) -> bool {
        self.inner.arbiter.holder() == Some(self.inner.id)
    }
}

impl MetaEventListener for SequencedInner {
    fn player_id(&self) -> PlayerId {
        self.id
    }

    fn meta(self: Arc<Self>, message: &MetaMessage) {
        if !message.is_end_of_track() {
            log::trace!("{} meta event 0x{:02X}", self.id, message.kind);
            return;
        }

        let outcome = {
            let mut core = self.core.lock();
            if core.sequence.is_none() {
                return;
            }
            let outcome = core.machine.device_ended();
            if outcome == EndOutcome::Looped {
                let restarted = self.arbiter.query_holder(self.id).and_then(|lease| {
                    lease.with_device(|device| {
                        device.set_position_micros(0)?;
                        device.start()
                    })
                });
                if let Some(Err(err)) = restarted {
                    log::warn!("{} could not restart looping sequence: {err}", self.id);
                }
            }
            outcome
        };

        if outcome == EndOutcome::Ignored {
            log::trace!("{} stale end-of-track ignored", self.id);
            return;
        }
        let backend = SequencedBackend { inner: self };
        notify_end(&backend.inner.watchers, outcome, &backend);
    }

    fn revoked(self: Arc<Self>) {
        log::debug!("{} lost the sequencer", self.id);
        self.core.lock().machine.stop();
    }
}

impl SoundPlayer for SequencedBackend {
    fn id(&self) -> PlayerId {
        self.inner.id
    }

    fn play(&self) -> Result<()> {
        let mut core = self.inner.core.lock();
        let sequence = core.sequence.clone().ok_or(PlaybackError::NotLoaded)?;
        let Some(listener) = self.inner.listener() else {
            return Ok(());
        };

        let lease = match self.inner.arbiter.acquire(&listener)? {
            Acquire::Granted(lease) => lease,
            Acquire::Denied => {
                log::debug!("{} play ignored, sequencer busy", self.inner.id);
                return Ok(());
            }
        };

        let started = lease.with_device(|device| {
            device.load(&sequence)?;
            device.set_position_micros(0)?;
            device.start()
        });
        match started {
            Some(Ok(())) => {
                core.machine.play();
                log::debug!("{} playing", self.inner.id);
                Ok(())
            }
            Some(Err(err)) => {
                self.inner.arbiter.release(self.inner.id);
                Err(err)
            }
            // Closed between grant and use.
            None => Ok(()),
        }
    }

    fn stop(&self) -> Result<()> {
        let mut core = self.inner.core.lock();
        if core.sequence.is_none() {
            return Ok(());
        }
        core.machine.stop();

        let halted = self.inner.arbiter.query_holder(self.inner.id).and_then(|lease| {
            lease.with_device(|device| {
                device.stop()?;
                device.set_position_micros(0)
            })
        });
        self.inner.arbiter.release(self.inner.id);
        halted.unwrap_or(Ok(()))
    }

    fn pause(&self) -> Result<()> {
        let mut core = self.inner.core.lock();
        if core.sequence.is_none() {
            return Ok(());
        }
        let Some(lease) = self.inner.arbiter.query_holder(self.inner.id) else {
            return Ok(());
        };
        if !core.machine.pause() {
            return Ok(());
        }
        lease
            .with_device(|device| {
                if device.is_running() {
                    device.stop()
                } else {
                    Ok(())
                }
            })
            .unwrap_or(Ok(()))
    }

    fn resume(&self) -> Result<()> {
        let mut core = self.inner.core.lock();
        if core.sequence.is_none() {
            return Ok(());
        }
        let Some(lease) = self.inner.arbiter.query_holder(self.inner.id) else {
            return Ok(());
        };
        if !core.machine.resume() {
            return Ok(());
        }
        lease
            .with_device(|device| {
                if device.is_running() {
                    Ok(())
                } else {
                    device.start()
                }
            })
            .unwrap_or(Ok(()))
    }

    fn seek(&self, position_micros: u64) -> Result<()> {
        let core = self.inner.core.lock();
        if core.sequence.is_none() {
            return Ok(());
        }
        self.inner
            .arbiter
            .query_holder(self.inner.id)
            .and_then(|lease| {
                lease.with_device(|device| device.set_position_micros(position_micros))
            })
            .unwrap_or(Ok(()))
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
        self.inner.core.lock().sequence.is_some()
    }

    fn add_watcher(&self, watcher: &Arc<dyn SoundWatcher>) -> bool {
        self.inner.watchers.add(watcher)
    }

    fn remove_watcher(&self, watcher: &Arc<dyn SoundWatcher>) -> bool {
        self.inner.watchers.remove(watcher)
    }
}

impl Drop for SequencedInner {
    fn drop(&mut self) {
        self.arbiter.abandon(self.id);
    }
}

impl std::fmt::Debug for SequencedBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let core = self.inner.core.lock();
        f.debug_struct("SequencedBackend")
            .field("id", &self.inner.id)
            .field("state", &core.machine.state())
            .field("looping", &core.machine.is_looping())
            .field("loaded", &core.sequence.is_some())
            .finish()
    }
}
