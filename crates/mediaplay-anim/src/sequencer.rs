//! Elapsed-time to frame-index sequencing.
//!
//! The sequencer accumulates elapsed time modulo the full cycle length
//! (`period * frame_count`) and derives the current frame from it, so
//! tick jitter never accumulates into drift. Reaching the last frame is the
//! end-of-cycle instant: a non-repeating sequencer stops its clock and
//! notifies `sequence_ended` once per run, a repeating one notifies
//! `sequence_looped` once per boundary crossing.

use crate::clock::{Clock, IntervalClock, TickTarget};
use crate::source::{FrameSource, FrameStore};
use mediaplay_common::{PlaybackError, Result, WatcherSet};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};

/// Observer of end-of-cycle events.
pub trait SequenceWatcher<S: FrameStore>: Send + Sync {
    /// The last frame was reached and the sequencer will not repeat.
    fn sequence_ended(&self, sequencer: &AnimationSequencer<S>);

    /// The last frame was reached and the sequencer keeps looping.
    fn sequence_looped(&self, sequencer: &AnimationSequencer<S>);
}

/// Result of advancing the sequencer by one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceResult {
    /// Current frame is unchanged.
    NoFrameChange,
    /// Moved to a different frame.
    FrameAdvanced,
    /// Reached the last frame while repeating.
    Looped,
    /// Reached the last frame without repeating; the clock was stopped.
    Completed,
}

/// Timing state guarded by the sequencer lock.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SequencerState {
    period_ms: u64,
    /// Kept wide so `period * frame_count` cannot overflow.
    elapsed_ms: u128,
    current: usize,
    repeating: bool,
    running: bool,
    /// Set once `sequence_ended` fired for the current run.
    end_reported: bool,
    destroyed: bool,
}

impl SequencerState {
    fn new(period_ms: u64) -> Self {
        Self {
            period_ms,
            elapsed_ms: 0,
            current: 0,
            repeating: false,
            running: false,
            end_reported: false,
            destroyed: false,
        }
    }

    /// Pure frame-index arithmetic for one tick.
    fn advance(&mut self, delta_ms: u64, frame_count: usize) -> AdvanceResult {
        if frame_count == 0 {
            self.current = 0;
            return AdvanceResult::NoFrameChange;
        }

        let previous = self.current;
        let crossed_cycle;
        if frame_count > 1 && self.period_ms > 0 {
            let period = u128::from(self.period_ms);
            let cycle = period * frame_count as u128;
            let delta = u128::from(delta_ms);
            crossed_cycle = delta >= cycle;
            self.elapsed_ms = (self.elapsed_ms % cycle + delta % cycle) % cycle;
            self.current = (self.elapsed_ms / period) as usize;
        } else {
            // A single frame is a whole cycle on every tick.
            crossed_cycle = frame_count == 1;
            self.current = 0;
        }

        let last = frame_count - 1;
        if self.current == last {
            if !self.repeating {
                if !self.end_reported {
                    self.end_reported = true;
                    self.running = false;
                    return AdvanceResult::Completed;
                }
            } else if previous != last || crossed_cycle {
                return AdvanceResult::Looped;
            }
        }

        if self.current != previous {
            AdvanceResult::FrameAdvanced
        } else {
            AdvanceResult::NoFrameChange
        }
    }

    /// Place the sequencer at the start of frame `index` for a new run.
    fn seek(&mut self, index: usize) {
        self.current = index;
        self.elapsed_ms = u128::from(self.period_ms) * index as u128;
        self.end_reported = false;
    }
}

struct Shared<S: FrameStore> {
    source: Arc<S>,
    state: Mutex<SequencerState>,
    watchers: WatcherSet<dyn SequenceWatcher<S>>,
    clock: Box<dyn Clock>,
}

impl<S: FrameStore> TickTarget for Shared<S> {
    fn on_tick(self: Arc<Self>, elapsed_ms: u64) {
        AnimationSequencer { shared: self }.advance(elapsed_ms);
    }
}

impl<S: FrameStore> Drop for Shared<S> {
    fn drop(&mut self) {
        self.clock.detach();
    }
}

/// Converts elapsed time into a current frame over a shared [`FrameStore`].
///
/// Lock order is sequencer state, then clock. Watchers are notified after the
/// state lock is released, on whichever thread delivered the tick, and may
/// call back into the sequencer.
///
/// # Example
///
/// ```
/// use mediaplay_anim::{AnimationSequencer, FrameSource, ManualClock};
/// use std::sync::Arc;
///
/// let frames: Arc<FrameSource<&str>> = Arc::new(["a", "b", "c"].into_iter().collect());
/// let clock = ManualClock::new();
/// let seq = AnimationSequencer::with_clock(frames, 100, clock.clone());
/// seq.start();
/// clock.fire(100);
/// assert_eq!(seq.current_frame(), Some(&"b"));
/// ```
pub struct AnimationSequencer<S: FrameStore> {
    shared: Arc<Shared<S>>,
}

impl<S: FrameStore> AnimationSequencer<S> {
    /// Create a sequencer driven by a wall-clock [`IntervalClock`].
    ///
    /// A negative `period_ms` leaves the period at zero.
    pub fn new(source: Arc<S>, period_ms: i64) -> Self {
        Self::with_clock(source, period_ms, IntervalClock::new())
    }

    /// Create a sequencer driven by the given clock.
    pub fn with_clock(source: Arc<S>, period_ms: i64, clock: impl Clock + 'static) -> Self {
        let period = u64::try_from(period_ms).unwrap_or(0);
        let shared = Arc::new(Shared {
            source,
            state: Mutex::new(SequencerState::new(period)),
            watchers: WatcherSet::new(),
            clock: Box::new(clock),
        });
        shared.clock.set_period(period);
        let target: Weak<dyn TickTarget> = Arc::downgrade(&shared) as Weak<dyn TickTarget>;
        shared.clock.attach(target);
        Self { shared }
    }

    /// Advance by `elapsed_ms` and notify watchers of any end-of-cycle event.
    ///
    /// This is the tick handler; clocks call it, and external schedulers may
    /// call it directly. It is a no-op after [`destroy`](Self::destroy).
    pub fn advance(&self, elapsed_ms: u64) -> AdvanceResult {
        let frame_count = self.shared.source.frame_count();
        let result = {
            let mut state = self.shared.state.lock();
            if state.destroyed {
                return AdvanceResult::NoFrameChange;
            }
            let result = state.advance(elapsed_ms, frame_count);
            if result == AdvanceResult::Completed {
                self.shared.clock.stop();
            }
            result
        };

        match result {
            AdvanceResult::Completed => {
                log::debug!("animation sequence ended after {frame_count} frames");
                self.shared.watchers.notify(|w| w.sequence_ended(self));
            }
            AdvanceResult::Looped => {
                log::trace!("animation sequence looped");
                self.shared.watchers.notify(|w| w.sequence_looped(self));
            }
            AdvanceResult::FrameAdvanced | AdvanceResult::NoFrameChange => {}
        }
        result
    }

    /// Start ticking from the current position.
    pub fn start(&self) {
        let mut state = self.shared.state.lock();
        if state.destroyed {
            return;
        }
        state.running = true;
        state.end_reported = false;
        self.shared.clock.start();
    }

    /// Resume ticking from where the sequencer was stopped.
    pub fn resume(&self) {
        self.start();
    }

    /// Stop ticking; the current frame is kept.
    pub fn stop(&self) {
        let mut state = self.shared.state.lock();
        state.running = false;
        self.shared.clock.stop();
    }

    /// Whether the clock is stopped.
    pub fn is_stopped(&self) -> bool {
        !self.shared.state.lock().running
    }

    /// Enable or disable looping.
    pub fn set_repeating(&self, repeating: bool) {
        self.shared.state.lock().repeating = repeating;
    }

    /// Whether the sequencer loops.
    pub fn is_repeating(&self) -> bool {
        self.shared.state.lock().repeating
    }

    /// Set the time between frames. Negative values are ignored.
    pub fn set_period(&self, period_ms: i64) {
        let Ok(period) = u64::try_from(period_ms) else {
            log::trace!("ignoring negative animation period {period_ms}");
            return;
        };
        let mut state = self.shared.state.lock();
        state.period_ms = period;
        self.shared.clock.set_period(period);
    }

    /// Time between frames.
    pub fn period_ms(&self) -> u64 {
        self.shared.state.lock().period_ms
    }

    /// Accumulated time within the current cycle, saturating at `u64::MAX`.
    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.shared.state.lock().elapsed_ms).unwrap_or(u64::MAX)
    }

    /// Current frame index.
    pub fn current_index(&self) -> usize {
        self.shared.state.lock().current
    }

    /// Current frame.
    pub fn current_frame(&self) -> Option<&S::Frame> {
        let index = self.current_index();
        self.shared.source.frame(index)
    }

    /// Number of frames in the underlying source.
    pub fn frame_count(&self) -> usize {
        self.shared.source.frame_count()
    }

    /// The shared frame source.
    pub fn source(&self) -> &Arc<S> {
        &self.shared.source
    }

    /// Restart from `index` and start the clock.
    ///
    /// Targets outside `1..frame_count` are rejected without touching any
    /// state; use [`start`](Self::start) to run from the first frame.
    pub fn restart_at(&self, index: usize) -> Result<()> {
        let frame_count = self.frame_count();
        if index == 0 || index >= frame_count {
            return Err(PlaybackError::InvalidRequest(format!(
                "restart index {index} outside 1..{frame_count}"
            )));
        }

        let mut state = self.shared.state.lock();
        if state.destroyed {
            return Ok(());
        }
        state.seek(index);
        state.running = true;
        self.shared.clock.start();
        Ok(())
    }

    /// Position on `index` without starting the clock.
    ///
    /// Repositioning begins a new run, so reaching the last frame again
    /// reports `sequence_ended` even if the previous run already did.
    pub(crate) fn jump_to(&self, index: usize) {
        let mut state = self.shared.state.lock();
        if state.destroyed {
            return;
        }
        state.seek(index);
    }

    /// At the last frame and not repeating.
    pub fn finished_looping(&self) -> bool {
        let frame_count = self.frame_count();
        let state = self.shared.state.lock();
        frame_count > 0 && state.current == frame_count - 1 && !state.repeating
    }

    /// Register a watcher. Returns `false` if it was already registered.
    pub fn add_watcher(&self, watcher: &Arc<dyn SequenceWatcher<S>>) -> bool {
        self.shared.watchers.add(watcher)
    }

    /// Unregister a watcher. Removing an absent watcher is a no-op.
    pub fn remove_watcher(&self, watcher: &Arc<dyn SequenceWatcher<S>>) -> bool {
        self.shared.watchers.remove(watcher)
    }

    /// Number of live watchers.
    pub fn watcher_count(&self) -> usize {
        self.shared.watchers.len()
    }

    /// Whether both handles refer to the same sequencer.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    /// Stop the clock, detach it and release every watcher.
    ///
    /// Ticks already in flight on another thread observe the destroyed flag
    /// and do nothing.
    pub fn destroy(self) {
        let mut state = self.shared.state.lock();
        state.destroyed = true;
        state.running = false;
        self.shared.clock.stop();
        self.shared.clock.detach();
        drop(state);
        self.shared.watchers.clear();
    }
}

impl<F: Send + Sync + 'static> FrameSource<F> {
    /// Create a wall-clock sequencer over this source.
    pub fn animator(self: &Arc<Self>, period_ms: i64) -> AnimationSequencer<FrameSource<F>> {
        AnimationSequencer::new(Arc::clone(self), period_ms)
    }
}

impl<S: FrameStore> Clone for AnimationSequencer<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S: FrameStore> std::fmt::Debug for AnimationSequencer<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("AnimationSequencer")
            .field("frames", &self.shared.source.frame_count())
            .field("period_ms", &state.period_ms)
            .field("elapsed_ms", &state.elapsed_ms)
            .field("current", &state.current)
            .field("repeating", &state.repeating)
            .field("running", &state.running)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counts {
        ended: AtomicUsize,
        looped: AtomicUsize,
    }

    impl<S: FrameStore> SequenceWatcher<S> for Counts {
        fn sequence_ended(&self, _: &AnimationSequencer<S>) {
            self.ended.fetch_add(1, Ordering::SeqCst);
        }

        fn sequence_looped(&self, _: &AnimationSequencer<S>) {
            self.looped.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn frames(count: usize) -> Arc<FrameSource<usize>> {
        Arc::new((0..count).collect())
    }

    fn sequencer(
        count: usize,
        period: i64,
    ) -> (AnimationSequencer<FrameSource<usize>>, ManualClock, Arc<Counts>) {
        let clock = ManualClock::new();
        let seq = AnimationSequencer::with_clock(frames(count), period, clock.clone());
        let counts = Arc::new(Counts::default());
        let watcher: Arc<dyn SequenceWatcher<FrameSource<usize>>> = counts.clone();
        seq.add_watcher(&watcher);
        (seq, clock, counts)
    }

    #[test]
    fn test_state_full_cycle_is_idempotent() {
        for (count, period) in [(2usize, 1u64), (5, 200), (10, 100), (7, 33)] {
            let mut state = SequencerState::new(period);
            state.repeating = true;
            state.advance(period * 3 + 1, count);
            let before = state.current;
            let cycle = period * count as u64;
            for _ in 0..count {
                state.advance(period, count);
            }
            assert_eq!(state.current, before, "count={count} period={period}");
            state.advance(cycle * 4, count);
            assert_eq!(state.current, before);
        }
    }

    #[test]
    fn test_state_static_when_period_zero_or_single_frame() {
        let mut state = SequencerState::new(0);
        state.repeating = true;
        assert_eq!(state.advance(500, 4), AdvanceResult::NoFrameChange);
        assert_eq!(state.current, 0);

        let mut single = SequencerState::new(100);
        assert_eq!(single.advance(100, 1), AdvanceResult::Completed);
        assert_eq!(single.current, 0);
    }

    #[test]
    fn test_state_empty_source_never_ends() {
        let mut state = SequencerState::new(100);
        assert_eq!(state.advance(100, 0), AdvanceResult::NoFrameChange);
        assert!(!state.end_reported);
    }

    #[test]
    fn test_ended_fires_once_per_run() {
        let (seq, clock, counts) = sequencer(4, 100);
        seq.start();

        clock.fire(100);
        clock.fire(100);
        assert_eq!(counts.ended.load(Ordering::SeqCst), 0);
        clock.fire(100);
        assert_eq!(seq.current_index(), 3);
        assert_eq!(counts.ended.load(Ordering::SeqCst), 1);
        assert!(seq.is_stopped());
        assert!(seq.finished_looping());

        // Clock is stopped: further fires are not delivered.
        assert!(!clock.fire(100));
        // Direct ticks at the last frame do not repeat the notification.
        seq.advance(0);
        assert_eq!(counts.ended.load(Ordering::SeqCst), 1);
        assert_eq!(counts.looped.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_new_run_can_end_again() {
        let (seq, clock, counts) = sequencer(3, 50);
        seq.start();
        clock.fire(100);
        assert_eq!(counts.ended.load(Ordering::SeqCst), 1);

        seq.start();
        clock.fire(50);
        clock.fire(50);
        clock.fire(50);
        assert_eq!(counts.ended.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_looped_fires_once_per_cycle() {
        let (seq, clock, counts) = sequencer(4, 100);
        seq.set_repeating(true);
        seq.start();

        for _ in 0..(4 * 5) {
            clock.fire(100);
        }
        assert_eq!(counts.looped.load(Ordering::SeqCst), 5);
        assert_eq!(counts.ended.load(Ordering::SeqCst), 0);
        assert!(!seq.is_stopped());
        assert!(!seq.finished_looping());
    }

    #[test]
    fn test_looped_not_repeated_while_lingering_on_last_frame() {
        let (seq, clock, counts) = sequencer(3, 100);
        seq.set_repeating(true);
        seq.start();

        clock.fire(200);
        assert_eq!(seq.current_index(), 2);
        clock.fire(30);
        clock.fire(30);
        assert_eq!(seq.current_index(), 2);
        assert_eq!(counts.looped.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_set_period_ignores_negative() {
        let (seq, clock, _) = sequencer(3, 100);
        seq.set_period(-5);
        assert_eq!(seq.period_ms(), 100);
        seq.set_period(0);
        assert_eq!(seq.period_ms(), 0);
        assert_eq!(clock.period_ms(), 0);
    }

    #[test]
    fn test_negative_constructor_period_is_zero() {
        let (seq, _, _) = sequencer(3, -20);
        assert_eq!(seq.period_ms(), 0);
        seq.advance(1_000);
        assert_eq!(seq.current_index(), 0);
    }

    #[test]
    fn test_restart_at_bounds() {
        let (seq, _, _) = sequencer(10, 100);
        seq.advance(300);
        let before = (seq.current_index(), seq.elapsed_ms(), seq.is_stopped());

        assert!(seq.restart_at(0).is_err());
        assert!(seq.restart_at(10).is_err());
        assert_eq!(
            (seq.current_index(), seq.elapsed_ms(), seq.is_stopped()),
            before
        );

        seq.restart_at(5).unwrap();
        assert_eq!(seq.current_index(), 5);
        assert_eq!(seq.elapsed_ms(), 500);
        assert!(!seq.is_stopped());
    }

    #[test]
    fn test_huge_period_does_not_overflow() {
        let (seq, _, counts) = sequencer(3, 100);
        seq.set_period(i64::MAX);

        assert_eq!(seq.advance(1), AdvanceResult::NoFrameChange);
        assert_eq!(seq.current_index(), 0);
        assert_eq!(seq.elapsed_ms(), 1);

        seq.restart_at(2).unwrap();
        assert_eq!(seq.elapsed_ms(), i64::MAX as u64 * 2);
        assert_eq!(seq.advance(1), AdvanceResult::Completed);
        assert_eq!(counts.ended.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_state_huge_period_wraps_cycle() {
        let period = i64::MAX as u64;
        let mut state = SequencerState::new(period);
        state.repeating = true;

        assert_eq!(state.advance(period, 3), AdvanceResult::FrameAdvanced);
        assert_eq!(state.advance(period, 3), AdvanceResult::Looped);
        assert_eq!(state.advance(period, 3), AdvanceResult::FrameAdvanced);
        assert_eq!(state.current, 0);
        assert_eq!(state.elapsed_ms, 0);
    }

    #[test]
    fn test_remove_watcher_stops_notifications() {
        let clock = ManualClock::new();
        let seq = AnimationSequencer::with_clock(frames(2), 10, clock.clone());
        let counts = Arc::new(Counts::default());
        let watcher: Arc<dyn SequenceWatcher<FrameSource<usize>>> = counts.clone();

        assert!(seq.add_watcher(&watcher));
        assert!(!seq.add_watcher(&watcher));
        assert!(seq.remove_watcher(&watcher));
        assert!(!seq.remove_watcher(&watcher));

        seq.start();
        clock.fire(10);
        assert_eq!(counts.ended.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_destroy_detaches_clock_and_watchers() {
        let (seq, clock, counts) = sequencer(3, 100);
        seq.start();
        seq.destroy();

        assert!(!clock.is_attached());
        assert!(!clock.fire(200));
        assert_eq!(counts.ended.load(Ordering::SeqCst), 0);
    }

    struct Restarter;

    impl SequenceWatcher<FrameSource<usize>> for Restarter {
        fn sequence_ended(&self, sequencer: &AnimationSequencer<FrameSource<usize>>) {
            sequencer.restart_at(1).unwrap();
        }

        fn sequence_looped(&self, _: &AnimationSequencer<FrameSource<usize>>) {}
    }

    #[test]
    fn test_watcher_can_restart_from_callback() {
        let clock = ManualClock::new();
        let seq = AnimationSequencer::with_clock(frames(3), 100, clock.clone());
        let watcher: Arc<dyn SequenceWatcher<FrameSource<usize>>> = Arc::new(Restarter);
        seq.add_watcher(&watcher);

        seq.start();
        clock.fire(200);
        assert_eq!(seq.current_index(), 1);
        assert!(!seq.is_stopped());
    }
}
