use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

use mediaplay_common::{PlaybackError, PlaybackState, PlayerId, Result};
use mediaplay_sound::{
    ClockedSequencer, DeviceArbiter, MetaEventSink, MetaMessage, SequenceData, SequencedBackend,
    SequencerDevice, SoundPlayer, SoundWatcher,
};
use parking_lot::Mutex;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Records device calls and hands the event sink back to the test.
#[derive(Default)]
struct DeviceLog {
    sink: Mutex<Option<MetaEventSink>>,
    calls: Mutex<Vec<String>>,
    running: Mutex<bool>,
    reject_load: Mutex<bool>,
}

impl DeviceLog {
    fn emit(&self, message: MetaMessage) -> bool {
        let sink = self.sink.lock().clone();
        sink.is_some_and(|sink| sink.emit(&message))
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn clear(&self) {
        self.calls.lock().clear();
    }
}

struct FakeSequencer(Arc<DeviceLog>);

impl SequencerDevice for FakeSequencer {
    fn open(&mut self, events: MetaEventSink) -> Result<()> {
        *self.0.sink.lock() = Some(events);
        Ok(())
    }

    fn load(&mut self, sequence: &SequenceData) -> Result<()> {
        if *self.0.reject_load.lock() {
            return Err(PlaybackError::InvalidData("corrupt track".into()));
        }
        self.0.calls.lock().push(format!("load {}", sequence.length_ticks));
        Ok(())
    }

    fn set_position_micros(&mut self, micros: u64) -> Result<()> {
        self.0.calls.lock().push(format!("seek {micros}"));
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        *self.0.running.lock() = true;
        self.0.calls.lock().push("start".into());
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        *self.0.running.lock() = false;
        self.0.calls.lock().push("stop".into());
        Ok(())
    }

    fn is_running(&self) -> bool {
        *self.0.running.lock()
    }

    fn close(&mut self) {
        self.0.calls.lock().push("close".into());
    }
}

#[derive(Default)]
struct Tally {
    ended: AtomicUsize,
    looped: AtomicUsize,
    last: Mutex<Option<PlayerId>>,
}

impl SoundWatcher for Tally {
    fn sequence_ended(&self, player: &dyn SoundPlayer) {
        self.ended.fetch_add(1, Ordering::SeqCst);
        *self.last.lock() = Some(player.id());
    }

    fn sequence_looped(&self, player: &dyn SoundPlayer) {
        self.looped.fetch_add(1, Ordering::SeqCst);
        *self.last.lock() = Some(player.id());
    }
}

fn setup() -> (DeviceArbiter, Arc<DeviceLog>) {
    let device = Arc::new(DeviceLog::default());
    let arbiter = DeviceArbiter::new(Box::new(FakeSequencer(Arc::clone(&device)))).unwrap();
    (arbiter, device)
}

fn player(arbiter: &DeviceArbiter, ticks: u64) -> (SequencedBackend, Arc<Tally>) {
    let player = SequencedBackend::new(arbiter.clone());
    player.load(SequenceData::new(96, ticks, Vec::new())).unwrap();
    let tally = Arc::new(Tally::default());
    let watcher: Arc<dyn SoundWatcher> = tally.clone();
    player.add_watcher(&watcher);
    (player, tally)
}

#[test]
fn test_play_before_load_is_not_loaded() {
    init_logging();
    let (arbiter, device) = setup();
    let empty = SequencedBackend::new(arbiter.clone());

    assert!(matches!(empty.play(), Err(PlaybackError::NotLoaded)));
    empty.stop().unwrap();
    empty.pause().unwrap();
    empty.resume().unwrap();
    empty.seek(5).unwrap();
    assert_eq!(empty.state(), PlaybackState::Finished);
    assert!(device.calls().is_empty());
    assert_eq!(arbiter.holder(), None);
}

#[test]
fn test_handoff_between_players() {
    init_logging();
    let (arbiter, device) = setup();
    let (first, _) = player(&arbiter, 100);
    let (second, _) = player(&arbiter, 200);

    first.play().unwrap();
    assert_eq!(device.calls(), vec!["load 100", "seek 0", "start"]);
    assert!(first.holds_device());

    device.clear();
    second.play().unwrap();
    assert!(device.calls().is_empty());
    assert_eq!(second.state(), PlaybackState::Finished);

    // A non-holder cannot touch the device.
    second.pause().unwrap();
    second.seek(1_000).unwrap();
    second.resume().unwrap();
    assert!(device.calls().is_empty());

    first.stop().unwrap();
    assert_eq!(first.state(), PlaybackState::StoppedManually);
    assert_eq!(arbiter.holder(), None);

    device.clear();
    second.play().unwrap();
    assert_eq!(device.calls(), vec!["load 200", "seek 0", "start"]);
    assert_eq!(second.state(), PlaybackState::Playing);
}

#[test]
fn test_end_of_track_reaches_only_holder() {
    init_logging();
    let (arbiter, device) = setup();
    let (holder, holder_tally) = player(&arbiter, 10);
    let (other, other_tally) = player(&arbiter, 10);

    holder.play().unwrap();
    other.play().unwrap();
    assert!(device.emit(MetaMessage::end_of_track()));

    assert_eq!(holder.state(), PlaybackState::Finished);
    assert_eq!(holder_tally.ended.load(Ordering::SeqCst), 1);
    assert_eq!(*holder_tally.last.lock(), Some(holder.id()));
    assert_eq!(other_tally.ended.load(Ordering::SeqCst), 0);

    // Finishing does not give the device up.
    assert!(holder.holds_device());
    other.play().unwrap();
    assert_eq!(other.state(), PlaybackState::Finished);
}

#[test]
fn test_other_meta_events_ignored() {
    init_logging();
    let (arbiter, device) = setup();
    let (holder, tally) = player(&arbiter, 10);
    holder.play().unwrap();

    device.emit(MetaMessage::new(0x51));
    assert_eq!(holder.state(), PlaybackState::Playing);
    assert_eq!(tally.ended.load(Ordering::SeqCst), 0);
}

#[test]
fn test_end_while_paused_is_ignored() {
    init_logging();
    let (arbiter, device) = setup();
    let (holder, tally) = player(&arbiter, 10);
    holder.play().unwrap();
    holder.pause().unwrap();
    assert_eq!(holder.state(), PlaybackState::Paused);

    device.emit(MetaMessage::end_of_track());
    assert_eq!(holder.state(), PlaybackState::Paused);
    assert_eq!(tally.ended.load(Ordering::SeqCst), 0);

    device.clear();
    holder.resume().unwrap();
    assert_eq!(device.calls(), vec!["start"]);
    assert_eq!(holder.state(), PlaybackState::Playing);
}

#[test]
fn test_looping_rewinds_and_restarts() {
    init_logging();
    let (arbiter, device) = setup();
    let (holder, tally) = player(&arbiter, 10);
    holder.set_looping(true);
    holder.play().unwrap();

    device.clear();
    *device.running.lock() = false;
    device.emit(MetaMessage::end_of_track());
    device.emit(MetaMessage::end_of_track());

    assert_eq!(tally.looped.load(Ordering::SeqCst), 2);
    assert_eq!(tally.ended.load(Ordering::SeqCst), 0);
    assert_eq!(holder.state(), PlaybackState::Playing);
    assert_eq!(device.calls(), vec!["seek 0", "start", "seek 0", "start"]);

    holder.set_looping(false);
    device.emit(MetaMessage::end_of_track());
    assert_eq!(tally.ended.load(Ordering::SeqCst), 1);
}

#[test]
fn test_rejected_sequence_releases_device() {
    init_logging();
    let (arbiter, device) = setup();
    let (first, _) = player(&arbiter, 10);
    *device.reject_load.lock() = true;

    assert!(matches!(first.play(), Err(PlaybackError::InvalidData(_))));
    assert_eq!(first.state(), PlaybackState::Finished);
    assert_eq!(arbiter.holder(), None);
}

#[test]
fn test_close_revokes_holder() {
    init_logging();
    let (arbiter, device) = setup();
    let (holder, _) = player(&arbiter, 10);
    holder.play().unwrap();

    arbiter.close();
    assert_eq!(holder.state(), PlaybackState::StoppedManually);
    assert!(device.calls().ends_with(&["stop".to_string(), "close".to_string()]));
    assert!(matches!(
        holder.play(),
        Err(PlaybackError::DeviceUnavailable(_))
    ));
    device.emit(MetaMessage::end_of_track());
    assert_eq!(holder.state(), PlaybackState::StoppedManually);
}

#[test]
fn test_dropping_holder_frees_device() {
    init_logging();
    let (arbiter, device) = setup();
    {
        let (holder, _) = player(&arbiter, 10);
        holder.play().unwrap();
    }
    assert_eq!(arbiter.holder(), None);
    assert!(!*device.running.lock());

    let (next, _) = player(&arbiter, 10);
    next.play().unwrap();
    assert!(next.is_playing());
}

#[test]
fn test_concurrent_play_grants_one_holder() {
    init_logging();
    const PLAYERS: usize = 8;
    let (arbiter, _) = setup();
    let players: Vec<SequencedBackend> = (0..PLAYERS).map(|_| player(&arbiter, 10).0).collect();

    for round in 0..100 {
        let start = Barrier::new(PLAYERS);
        thread::scope(|scope| {
            for player in &players {
                let start = &start;
                scope.spawn(move || {
                    start.wait();
                    player.play().unwrap();
                });
            }
        });

        let playing: Vec<PlayerId> = players
            .iter()
            .filter(|p| p.is_playing())
            .map(|p| p.id())
            .collect();
        assert_eq!(playing.len(), 1, "round {round}: {playing:?}");
        assert_eq!(arbiter.holder(), Some(playing[0]));

        for player in &players {
            player.stop().unwrap();
        }
        assert_eq!(arbiter.holder(), None);
    }
}

#[test]
fn test_end_of_track_racing_stop_is_absorbed() {
    init_logging();
    for round in 0..100 {
        let (arbiter, device) = setup();
        let (holder, tally) = player(&arbiter, 10);
        holder.play().unwrap();

        let start = Barrier::new(3);
        thread::scope(|scope| {
            for _ in 0..2 {
                scope.spawn(|| {
                    start.wait();
                    device.emit(MetaMessage::end_of_track());
                });
            }
            start.wait();
            holder.stop().unwrap();
        });

        let ended = tally.ended.load(Ordering::SeqCst);
        assert!(ended <= 1, "round {round}: ended {ended} times");
        assert_eq!(holder.state(), PlaybackState::StoppedManually);
        assert_eq!(arbiter.holder(), None);

        device.emit(MetaMessage::end_of_track());
        assert_eq!(tally.ended.load(Ordering::SeqCst), ended);
        assert_eq!(holder.state(), PlaybackState::StoppedManually);
    }
}

#[test]
fn test_end_of_track_racing_pause_settles() {
    init_logging();
    for round in 0..100 {
        let (arbiter, device) = setup();
        let (holder, tally) = player(&arbiter, 10);
        holder.play().unwrap();

        let start = Barrier::new(2);
        thread::scope(|scope| {
            scope.spawn(|| {
                start.wait();
                device.emit(MetaMessage::end_of_track());
            });
            start.wait();
            holder.pause().unwrap();
        });

        let ended = tally.ended.load(Ordering::SeqCst);
        match holder.state() {
            PlaybackState::Finished => assert_eq!(ended, 1, "round {round}"),
            PlaybackState::Paused => assert_eq!(ended, 0, "round {round}"),
            other => panic!("round {round}: unexpected state {other:?}"),
        }
        assert!(holder.holds_device());
    }
}

#[test]
fn test_clocked_sequencer_loops_then_finishes() {
    init_logging();
    let arbiter = DeviceArbiter::new(Box::new(ClockedSequencer::new())).unwrap();
    // 2 ticks at 96 ppq and 120 bpm is about 10 ms.
    let (song, tally) = player(&arbiter, 2);
    song.set_looping(true);
    song.play().unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while tally.looped.load(Ordering::SeqCst) < 2 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(2));
    }
    assert!(tally.looped.load(Ordering::SeqCst) >= 2);

    song.set_looping(false);
    let deadline = Instant::now() + Duration::from_secs(5);
    while song.state() != PlaybackState::Finished && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(2));
    }
    assert_eq!(song.state(), PlaybackState::Finished);
    assert_eq!(tally.ended.load(Ordering::SeqCst), 1);
    arbiter.close();
}
