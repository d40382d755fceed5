//! Tick sources that drive animation sequencers.
//!
//! A [`Clock`] delivers ticks to a weakly-held [`TickTarget`]. Two
//! implementations are provided:
//!
//! - [`ManualClock`] - ticks only when the owner calls [`ManualClock::fire`];
//!   use it from a game loop or in tests.
//! - [`IntervalClock`] - a background thread that measures wall time and
//!   delivers a tick roughly every period.
//!
//! Clocks never hold their own lock while calling into the target.

use parking_lot::{Condvar, Mutex};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, Instant};

/// Receiver of clock ticks.
pub trait TickTarget: Send + Sync {
    /// Called with the milliseconds elapsed since the previous tick.
    fn on_tick(self: Arc<Self>, elapsed_ms: u64);
}

/// Periodic tick source.
pub trait Clock: Send + Sync {
    /// Bind the target that receives ticks.
    fn attach(&self, target: Weak<dyn TickTarget>);

    /// Unbind the target; no further ticks are delivered.
    fn detach(&self);

    /// Start (or keep) delivering ticks.
    fn start(&self);

    /// Stop delivering ticks.
    fn stop(&self);

    /// Whether ticks are being delivered.
    fn is_running(&self) -> bool;

    /// Change the interval between ticks.
    fn set_period(&self, period_ms: u64);
}

// ============================================================================
// ManualClock
// ============================================================================

#[derive(Default)]
struct ManualState {
    target: Option<Weak<dyn TickTarget>>,
    running: bool,
    period_ms: u64,
}

/// Clock driven by explicit [`fire`](ManualClock::fire) calls.
///
/// Clones share state, so a caller can keep one handle and give another to a
/// sequencer.
#[derive(Clone, Default)]
pub struct ManualClock {
    state: Arc<Mutex<ManualState>>,
}

impl ManualClock {
    /// Create a stopped, unattached clock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver one tick if the clock is running and its target is alive.
    ///
    /// Returns whether the tick was delivered.
    pub fn fire(&self, elapsed_ms: u64) -> bool {
        let target = {
            let state = self.state.lock();
            if !state.running {
                return false;
            }
            state.target.as_ref().and_then(Weak::upgrade)
        };
        match target {
            Some(target) => {
                target.on_tick(elapsed_ms);
                true
            }
            None => false,
        }
    }

    /// Deliver one tick of exactly the configured period.
    pub fn fire_period(&self) -> bool {
        let period = self.state.lock().period_ms;
        self.fire(period)
    }

    /// Last period configured by the attached sequencer.
    pub fn period_ms(&self) -> u64 {
        self.state.lock().period_ms
    }

    /// Whether a live target is attached.
    pub fn is_attached(&self) -> bool {
        self.state
            .lock()
            .target
            .as_ref()
            .is_some_and(|target| target.strong_count() > 0)
    }
}

impl Clock for ManualClock {
    fn attach(&self, target: Weak<dyn TickTarget>) {
        self.state.lock().target = Some(target);
    }

    fn detach(&self) {
        let mut state = self.state.lock();
        state.target = None;
        state.running = false;
    }

    fn start(&self) {
        self.state.lock().running = true;
    }

    fn stop(&self) {
        self.state.lock().running = false;
    }

    fn is_running(&self) -> bool {
        self.state.lock().running
    }

    fn set_period(&self, period_ms: u64) {
        self.state.lock().period_ms = period_ms;
    }
}

// ============================================================================
// IntervalClock
// ============================================================================

struct IntervalState {
    target: Option<Weak<dyn TickTarget>>,
    running: bool,
    period_ms: u64,
    /// Bumped on every start so the worker can reset its reference instant.
    generation: u64,
    shutdown: bool,
    worker_spawned: bool,
}

struct IntervalShared {
    state: Mutex<IntervalState>,
    wake: Condvar,
}

/// Wall-clock tick source backed by a worker thread.
///
/// The worker is spawned on the first [`start`](Clock::start) and exits when
/// the clock is dropped or detached, or when its target goes away. A period
/// of zero ticks as fast as the 1 ms floor allows.
pub struct IntervalClock {
    shared: Arc<IntervalShared>,
}

impl IntervalClock {
    /// Create a stopped clock.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(IntervalShared {
                state: Mutex::new(IntervalState {
                    target: None,
                    running: false,
                    period_ms: 0,
                    generation: 0,
                    shutdown: false,
                    worker_spawned: false,
                }),
                wake: Condvar::new(),
            }),
        }
    }

    fn spawn_worker(&self) {
        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name("mediaplay-interval-clock".into())
            .spawn(move || run_worker(shared));
        if let Err(err) = spawned {
            log::warn!("interval clock worker could not be spawned: {err}");
            self.shared.state.lock().worker_spawned = false;
        }
    }
}

impl Default for IntervalClock {
    fn default() -> Self {
        Self::new()
    }
}

fn run_worker(shared: Arc<IntervalShared>) {
    let mut last = Instant::now();
    let mut seen_generation = u64::MAX;

    loop {
        let mut state = shared.state.lock();
        if state.shutdown {
            return;
        }
        if !state.running {
            shared.wake.wait(&mut state);
            continue;
        }
        if state.generation != seen_generation {
            seen_generation = state.generation;
            last = Instant::now();
        }

        let period = Duration::from_millis(state.period_ms.max(1));
        let Some(deadline) = last.checked_add(period) else {
            // Period too long to ever elapse; sleep until reconfigured.
            shared.wake.wait(&mut state);
            continue;
        };
        let now = Instant::now();
        if now < deadline {
            // Woken early by start/stop/period changes; re-evaluate.
            shared.wake.wait_until(&mut state, deadline);
            continue;
        }

        let target = state.target.as_ref().and_then(Weak::upgrade);
        drop(state);

        let elapsed_ms = now.duration_since(last).as_millis() as u64;
        last += Duration::from_millis(elapsed_ms);

        match target {
            Some(target) => target.on_tick(elapsed_ms),
            None => {
                log::trace!("interval clock target gone, worker exiting");
                shared.state.lock().worker_spawned = false;
                return;
            }
        }
    }
}

impl Clock for IntervalClock {
    fn attach(&self, target: Weak<dyn TickTarget>) {
        self.shared.state.lock().target = Some(target);
        self.shared.wake.notify_all();
    }

    fn detach(&self) {
        let mut state = self.shared.state.lock();
        state.target = None;
        state.running = false;
        state.shutdown = true;
        drop(state);
        self.shared.wake.notify_all();
    }

    fn start(&self) {
        let mut state = self.shared.state.lock();
        if state.shutdown {
            return;
        }
        if !state.running {
            state.running = true;
            state.generation = state.generation.wrapping_add(1);
        }
        let needs_worker = !state.worker_spawned;
        state.worker_spawned = true;
        drop(state);

        if needs_worker {
            self.spawn_worker();
        }
        self.shared.wake.notify_all();
    }

    fn stop(&self) {
        self.shared.state.lock().running = false;
        self.shared.wake.notify_all();
    }

    fn is_running(&self) -> bool {
        self.shared.state.lock().running
    }

    fn set_period(&self, period_ms: u64) {
        self.shared.state.lock().period_ms = period_ms;
        self.shared.wake.notify_all();
    }
}

impl Drop for IntervalClock {
    fn drop(&mut self) {
        // Never join: the last strong handle may be dropped on the worker itself.
        self.shared.state.lock().shutdown = true;
        self.shared.wake.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

    #[derive(Default)]
    struct Recorder {
        ticks: AtomicUsize,
        total_ms: AtomicU64,
    }

    impl TickTarget for Recorder {
        fn on_tick(self: Arc<Self>, elapsed_ms: u64) {
            self.ticks.fetch_add(1, Ordering::SeqCst);
            self.total_ms.fetch_add(elapsed_ms, Ordering::SeqCst);
        }
    }

    fn attach(clock: &dyn Clock, recorder: &Arc<Recorder>) {
        let target: Arc<dyn TickTarget> = recorder.clone();
        clock.attach(Arc::downgrade(&target));
    }

    #[test]
    fn test_manual_clock_only_fires_while_running() {
        let clock = ManualClock::new();
        let recorder = Arc::new(Recorder::default());
        attach(&clock, &recorder);

        assert!(!clock.fire(10));
        clock.start();
        assert!(clock.fire(10));
        clock.stop();
        assert!(!clock.fire(10));
        assert_eq!(recorder.ticks.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_manual_clock_fire_period_uses_configured_period() {
        let clock = ManualClock::new();
        let recorder = Arc::new(Recorder::default());
        attach(&clock, &recorder);
        clock.set_period(40);
        clock.start();

        clock.fire_period();
        clock.fire_period();
        assert_eq!(recorder.total_ms.load(Ordering::SeqCst), 80);
    }

    #[test]
    fn test_manual_clock_drops_dead_target() {
        let clock = ManualClock::new();
        {
            let recorder = Arc::new(Recorder::default());
            attach(&clock, &recorder);
            assert!(clock.is_attached());
        }
        clock.start();
        assert!(!clock.is_attached());
        assert!(!clock.fire(5));
    }

    #[test]
    fn test_interval_clock_delivers_wall_time() {
        let clock = IntervalClock::new();
        let recorder = Arc::new(Recorder::default());
        attach(&clock, &recorder);
        clock.set_period(5);
        clock.start();

        let deadline = Instant::now() + Duration::from_secs(5);
        while recorder.ticks.load(Ordering::SeqCst) < 3 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(2));
        }
        clock.stop();

        let ticks = recorder.ticks.load(Ordering::SeqCst);
        assert!(ticks >= 3, "expected at least 3 ticks, got {ticks}");
        assert!(recorder.total_ms.load(Ordering::SeqCst) >= 10);
    }

    #[test]
    fn test_interval_clock_idles_on_unreachable_period() {
        let clock = IntervalClock::new();
        let recorder = Arc::new(Recorder::default());
        attach(&clock, &recorder);
        clock.set_period(u64::MAX);
        clock.start();
        thread::sleep(Duration::from_millis(20));
        assert_eq!(recorder.ticks.load(Ordering::SeqCst), 0);

        clock.set_period(1);
        let deadline = Instant::now() + Duration::from_secs(5);
        while recorder.ticks.load(Ordering::SeqCst) == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(2));
        }
        clock.stop();
        assert!(recorder.ticks.load(Ordering::SeqCst) > 0);
    }

    #[test]
    fn test_interval_clock_stops_delivering_after_detach() {
        let clock = IntervalClock::new();
        let recorder = Arc::new(Recorder::default());
        attach(&clock, &recorder);
        clock.set_period(1);
        clock.start();
        thread::sleep(Duration::from_millis(20));
        clock.detach();
        thread::sleep(Duration::from_millis(10));

        let after_detach = recorder.ticks.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(recorder.ticks.load(Ordering::SeqCst), after_detach);
        assert!(!clock.is_running());
    }
}
