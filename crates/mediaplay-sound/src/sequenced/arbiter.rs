//! Exclusive access to the single sequencer device.
//!
//! Many sequenced players may exist, but only one at a time can hold the
//! device. Holding is advisory: a player that is denied simply does not
//! play. Meta events from the device are routed to the holder only.
//!
//! The arbiter lock is always taken after a player's own lock, never
//! before. Listener callbacks run after the arbiter lock is released.

use super::device::{MetaEventSink, MetaMessage, MetaRouter, SequencerDevice};
use mediaplay_common::{PlaybackError, PlayerId, Result};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};

/// Receiver of device meta events while holding the device.
pub trait MetaEventListener: Send + Sync {
    /// Identity compared against the current holder.
    fn player_id(&self) -> PlayerId;

    /// A meta event arrived while this listener held the device.
    fn meta(self: Arc<Self>, message: &MetaMessage);

    /// The arbiter was closed while this listener held the device.
    fn revoked(self: Arc<Self>);
}

struct Holder {
    id: PlayerId,
    listener: Weak<dyn MetaEventListener>,
}

struct ArbiterState {
    device: Box<dyn SequencerDevice>,
    holder: Option<Holder>,
    closed: bool,
}

struct ArbiterInner {
    state: Mutex<ArbiterState>,
}

impl ArbiterInner {
    /// Current holder, clearing it if its listener has been dropped.
    fn live_holder(state: &mut ArbiterState) -> Option<&Holder> {
        if state
            .holder
            .as_ref()
            .is_some_and(|h| h.listener.strong_count() == 0)
        {
            if let Some(stale) = state.holder.take() {
                log::debug!("{} dropped while holding the sequencer", stale.id);
                if let Err(err) = state.device.stop() {
                    log::warn!("sequencer stop failed: {err}");
                }
            }
        }
        state.holder.as_ref()
    }
}

impl MetaRouter for ArbiterInner {
    fn route(self: Arc<Self>, message: &MetaMessage, still_current: &dyn Fn() -> bool) {
        let listener = {
            let mut state = self.state.lock();
            if state.closed {
                return;
            }
            if !still_current() {
                log::trace!("stale meta event 0x{:02X} dropped", message.kind);
                return;
            }
            let listener = ArbiterInner::live_holder(&mut state).and_then(|h| h.listener.upgrade());
            listener
        };
        match listener {
            Some(listener) => listener.meta(message),
            None => log::trace!("meta event 0x{:02X} with no holder dropped", message.kind),
        }
    }
}

/// Outcome of [`DeviceArbiter::acquire`].
#[derive(Debug)]
pub enum Acquire {
    /// The requester now holds the device.
    Granted(DeviceLease),
    /// Another player holds the device.
    Denied,
}

impl Acquire {
    /// The lease, if granted.
    pub fn granted(self) -> Option<DeviceLease> {
        match self {
            Acquire::Granted(lease) => Some(lease),
            Acquire::Denied => None,
        }
    }
}

/// Proof that a player held the device when the lease was issued.
///
/// Every use re-checks the holder, so a lease outliving its grant does
/// nothing.
#[derive(Clone)]
pub struct DeviceLease {
    arbiter: Arc<ArbiterInner>,
    holder: PlayerId,
}

impl DeviceLease {
    /// Player this lease was issued to.
    pub fn holder(&self) -> PlayerId {
        self.holder
    }

    /// Run `f` on the device if the lease is still current.
    pub fn with_device<R>(&self, f: impl FnOnce(&mut dyn SequencerDevice) -> R) -> Option<R> {
        let mut state = self.arbiter.state.lock();
        if state.closed || state.holder.as_ref().map(|h| h.id) != Some(self.holder) {
            return None;
        }
        Some(f(&mut *state.device))
    }

    /// Whether the lease is still current.
    pub fn is_current(&self) -> bool {
        let state = self.arbiter.state.lock();
        !state.closed && state.holder.as_ref().map(|h| h.id) == Some(self.holder)
    }
}

impl std::fmt::Debug for DeviceLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceLease")
            .field("holder", &self.holder)
            .finish()
    }
}

/// Owner of the shared sequencer device.
///
/// Clones are handles to the same arbiter.
#[derive(Clone)]
pub struct DeviceArbiter {
    inner: Arc<ArbiterInner>,
}

impl DeviceArbiter {
    /// Take ownership of `device` and open it.
    ///
    /// Fails with `DeviceUnavailable` if the device cannot be opened.
    pub fn new(device: Box<dyn SequencerDevice>) -> Result<Self> {
        let inner = Arc::new(ArbiterInner {
            state: Mutex::new(ArbiterState {
                device,
                holder: None,
                closed: false,
            }),
        });

        let router: Weak<dyn MetaRouter> = Arc::downgrade(&inner) as _;
        let opened = inner.state.lock().device.open(MetaEventSink::new(router));
        opened.map_err(|err| match err {
            PlaybackError::DeviceUnavailable(_) => err,
            other => PlaybackError::DeviceUnavailable(other.to_string()),
        })?;

        log::debug!("sequencer device opened");
        Ok(Self { inner })
    }

    /// Request exclusive use of the device.
    ///
    /// Granted when the device is idle or already held by the requester,
    /// which then becomes the only recipient of meta events. Fails with
    /// `DeviceUnavailable` after [`close`](Self::close).
    pub fn acquire(&self, requester: &Arc<dyn MetaEventListener>) -> Result<Acquire> {
        let id = requester.player_id();
        let mut state = self.inner.state.lock();
        if state.closed {
            return Err(PlaybackError::DeviceUnavailable(
                "sequencer has been closed".into(),
            ));
        }

        match ArbiterInner::live_holder(&mut state).map(|h| h.id) {
            Some(holder) if holder != id => {
                log::debug!("sequencer denied to {id}, held by {holder}");
                return Ok(Acquire::Denied);
            }
            Some(_) => {}
            None => {
                log::debug!("sequencer granted to {id}");
                state.holder = Some(Holder {
                    id,
                    listener: Arc::downgrade(requester),
                });
            }
        }

        Ok(Acquire::Granted(DeviceLease {
            arbiter: Arc::clone(&self.inner),
            holder: id,
        }))
    }

    /// Give the device up. Ignored unless `requester` holds it.
    pub fn release(&self, requester: PlayerId) -> bool {
        let mut state = self.inner.state.lock();
        if state.holder.as_ref().map(|h| h.id) == Some(requester) {
            state.holder = None;
            log::debug!("sequencer released by {requester}");
            true
        } else {
            false
        }
    }

    /// Release on behalf of a player that is going away, halting the device
    /// if that player held it.
    ///
    /// The device is stopped even when idle so that an end-of-track it is
    /// about to report is recognised as stale.
    pub(crate) fn abandon(&self, requester: PlayerId) {
        let mut state = self.inner.state.lock();
        if state.holder.as_ref().map(|h| h.id) != Some(requester) {
            return;
        }
        state.holder = None;
        if !state.closed {
            if let Err(err) = state.device.stop() {
                log::warn!("sequencer stop failed: {err}");
            }
        }
        log::debug!("sequencer abandoned by {requester}");
    }

    /// A lease if `requester` currently holds the device.
    pub fn query_holder(&self, requester: PlayerId) -> Option<DeviceLease> {
        let mut state = self.inner.state.lock();
        if state.closed {
            return None;
        }
        let holder = ArbiterInner::live_holder(&mut state).map(|h| h.id);
        (holder == Some(requester)).then(|| DeviceLease {
            arbiter: Arc::clone(&self.inner),
            holder: requester,
        })
    }

    /// Current holder, if any.
    pub fn holder(&self) -> Option<PlayerId> {
        let mut state = self.inner.state.lock();
        ArbiterInner::live_holder(&mut state).map(|h| h.id)
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    /// Stop playback, revoke the holder and close the device.
    ///
    /// The revoked holder ends up `StoppedManually`. Later acquires fail with
    /// `DeviceUnavailable`. Closing twice is a no-op.
    pub fn close(&self) {
        let revoked = {
            let mut state = self.inner.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            let holder = state.holder.take();
            if state.device.is_running() {
                if let Err(err) = state.device.stop() {
                    log::warn!("sequencer stop failed during close: {err}");
                }
            }
            state.device.close();
            holder.and_then(|h| h.listener.upgrade())
        };

        log::debug!("sequencer device closed");
        if let Some(listener) = revoked {
            listener.revoked();
        }
    }
}

impl std::fmt::Debug for DeviceArbiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("DeviceArbiter")
            .field("holder", &state.holder.as_ref().map(|h| h.id))
            .field("closed", &state.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequenced::SequenceData;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct NullDevice {
        running: bool,
        fail_open: bool,
    }

    impl SequencerDevice for NullDevice {
        fn open(&mut self, _: MetaEventSink) -> Result<()> {
            if self.fail_open {
                Err(PlaybackError::Device("no synthesizer".into()))
            } else {
                Ok(())
            }
        }
        fn load(&mut self, _: &SequenceData) -> Result<()> {
            Ok(())
        }
        fn set_position_micros(&mut self, _: u64) -> Result<()> {
            Ok(())
        }
        fn start(&mut self) -> Result<()> {
            self.running = true;
            Ok(())
        }
        fn stop(&mut self) -> Result<()> {
            self.running = false;
            Ok(())
        }
        fn is_running(&self) -> bool {
            self.running
        }
        fn close(&mut self) {}
    }

    struct Listener {
        id: PlayerId,
        revoked: AtomicBool,
        metas: AtomicUsize,
    }

    impl Listener {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                id: PlayerId::next(),
                revoked: AtomicBool::new(false),
                metas: AtomicUsize::new(0),
            })
        }
    }

    impl MetaEventListener for Listener {
        fn player_id(&self) -> PlayerId {
            self.id
        }
        fn meta(self: Arc<Self>, _: &MetaMessage) {
            self.metas.fetch_add(1, Ordering::SeqCst);
        }
        fn revoked(self: Arc<Self>) {
            self.revoked.store(true, Ordering::SeqCst);
        }
    }

    fn arbiter() -> DeviceArbiter {
        DeviceArbiter::new(Box::<NullDevice>::default()).unwrap()
    }

    #[test]
    fn test_open_failure_is_device_unavailable() {
        let device = NullDevice {
            fail_open: true,
            ..Default::default()
        };
        assert!(matches!(
            DeviceArbiter::new(Box::new(device)),
            Err(PlaybackError::DeviceUnavailable(_))
        ));
    }

    #[test]
    fn test_grant_is_exclusive_and_idempotent() {
        let arbiter = arbiter();
        let a = Listener::new();
        let b = Listener::new();
        let a_dyn: Arc<dyn MetaEventListener> = a.clone();
        let b_dyn: Arc<dyn MetaEventListener> = b.clone();

        assert!(arbiter.acquire(&a_dyn).unwrap().granted().is_some());
        assert!(arbiter.acquire(&a_dyn).unwrap().granted().is_some());
        assert!(matches!(arbiter.acquire(&b_dyn).unwrap(), Acquire::Denied));
        assert_eq!(arbiter.holder(), Some(a.id));

        assert!(!arbiter.release(b.id));
        assert!(arbiter.release(a.id));
        assert!(arbiter.acquire(&b_dyn).unwrap().granted().is_some());
        assert!(arbiter.query_holder(a.id).is_none());
        assert!(arbiter.query_holder(b.id).is_some());
    }

    #[test]
    fn test_stale_lease_does_nothing() {
        let arbiter = arbiter();
        let a: Arc<dyn MetaEventListener> = Listener::new();
        let lease = arbiter.acquire(&a).unwrap().granted().unwrap();
        assert_eq!(lease.with_device(|d| d.start().is_ok()), Some(true));

        arbiter.release(a.player_id());
        assert!(!lease.is_current());
        assert_eq!(lease.with_device(|_| ()), None);
    }

    #[test]
    fn test_dropped_holder_frees_device() {
        let arbiter = arbiter();
        {
            let a: Arc<dyn MetaEventListener> = Listener::new();
            arbiter.acquire(&a).unwrap();
        }
        let b: Arc<dyn MetaEventListener> = Listener::new();
        assert!(arbiter.acquire(&b).unwrap().granted().is_some());
    }

    #[test]
    fn test_close_revokes_holder() {
        let arbiter = arbiter();
        let a = Listener::new();
        let a_dyn: Arc<dyn MetaEventListener> = a.clone();
        arbiter.acquire(&a_dyn).unwrap();

        arbiter.close();
        assert!(a.revoked.load(Ordering::SeqCst));
        assert!(arbiter.is_closed());
        assert!(matches!(
            arbiter.acquire(&a_dyn),
            Err(PlaybackError::DeviceUnavailable(_))
        ));
        arbiter.close();
    }

    #[test]
    fn test_meta_routed_only_to_holder() {
        let arbiter = arbiter();
        let a = Listener::new();
        let b = Listener::new();
        let a_dyn: Arc<dyn MetaEventListener> = a.clone();
        arbiter.acquire(&a_dyn).unwrap();

        let router: Arc<ArbiterInner> = Arc::clone(&arbiter.inner);
        router.route(&MetaMessage::end_of_track(), &|| true);
        assert_eq!(a.metas.load(Ordering::SeqCst), 1);
        assert_eq!(b.metas.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_stale_meta_is_dropped() {
        let arbiter = arbiter();
        let a = Listener::new();
        let a_dyn: Arc<dyn MetaEventListener> = a.clone();
        arbiter.acquire(&a_dyn).unwrap();

        let router: Arc<ArbiterInner> = Arc::clone(&arbiter.inner);
        router.route(&MetaMessage::end_of_track(), &|| false);
        assert_eq!(a.metas.load(Ordering::SeqCst), 0);
    }
}
