//! Sequencer over a named frame group.

use crate::clock::{Clock, IntervalClock};
use crate::sequencer::AnimationSequencer;
use crate::source::NamedFrameSource;
use mediaplay_common::{PlaybackError, Result};
use std::ops::Deref;
use std::sync::Arc;

/// [`AnimationSequencer`] that can also be positioned by frame name.
///
/// Every sequencer operation is available through `Deref`.
pub struct GroupSequencer<F: Send + Sync + 'static> {
    inner: AnimationSequencer<NamedFrameSource<F>>,
}

impl<F: Send + Sync + 'static> GroupSequencer<F> {
    /// Create a wall-clock group sequencer.
    pub fn new(group: Arc<NamedFrameSource<F>>, period_ms: i64) -> Self {
        Self::with_clock(group, period_ms, IntervalClock::new())
    }

    /// Create a group sequencer driven by the given clock.
    pub fn with_clock(
        group: Arc<NamedFrameSource<F>>,
        period_ms: i64,
        clock: impl Clock + 'static,
    ) -> Self {
        Self {
            inner: AnimationSequencer::with_clock(group, period_ms, clock),
        }
    }

    /// Jump to the frame called `name`.
    ///
    /// Positions both the index and the elapsed counter, so the next tick
    /// advances from that frame, and begins a new run that can end again.
    /// The clock is left as it was.
    pub fn set_current_by_name(&self, name: &str) -> Result<()> {
        let group = self.inner.source();
        let index = group.index_of(name).ok_or_else(|| PlaybackError::NotFound {
            name: name.to_string(),
            scope: group.to_string(),
        })?;
        self.inner.jump_to(index);
        Ok(())
    }

    /// Name of the current frame.
    pub fn current_name(&self) -> Option<&str> {
        self.inner.source().name_at(self.inner.current_index())
    }

    /// The named frame group.
    pub fn group(&self) -> &Arc<NamedFrameSource<F>> {
        self.inner.source()
    }

    /// The plain sequencer handle, e.g. for watcher callbacks.
    pub fn sequencer(&self) -> &AnimationSequencer<NamedFrameSource<F>> {
        &self.inner
    }

    /// Stop the clock, detach it and release every watcher.
    pub fn destroy(self) {
        self.inner.destroy();
    }
}

impl<F: Send + Sync + 'static> Deref for GroupSequencer<F> {
    type Target = AnimationSequencer<NamedFrameSource<F>>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<F: Send + Sync + 'static> NamedFrameSource<F> {
    /// Create a wall-clock group sequencer over this group.
    pub fn animator(self: &Arc<Self>, period_ms: i64) -> GroupSequencer<F> {
        GroupSequencer::new(Arc::clone(self), period_ms)
    }
}

impl<F: Send + Sync + 'static> std::fmt::Debug for GroupSequencer<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupSequencer")
            .field("group", &self.group().to_string())
            .field("current", &self.current_name())
            .finish()
    }
}
