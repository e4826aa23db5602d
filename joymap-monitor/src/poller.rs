//! Local controller poller
//!
//! [`ControllerPoller`] is the Idle/Connected state machine; it does no I/O of
//! its own beyond calling the [`ControllerHost`]. [`PollerLoop`] drives it on a
//! dedicated thread at a fixed tick and forwards [`PollerUpdate`]s over a
//! channel.
//!
//! ```text
//!          attach / scan finds controller
//!   Idle ---------------------------------> Connected{slot}
//!    ^                                          |
//!    +---- detach / slot empty on sample -------+
//! ```

use std::thread::JoinHandle;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::connection::ConnectionState;
use crate::error::MonitorError;
use crate::host::{ControllerHandle, ControllerHost, HostNotification};
use crate::sample::ControllerSample;

/// One display refresh at 60 Hz
pub const DEFAULT_TICK: Duration = Duration::from_millis(16);

/// Poller state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    /// No controller tracked; scanning every tick
    Idle,
    /// Sampling the controller in `slot` every tick
    Connected { slot: usize },
}

/// Output of the poller, consumed by the render side
#[derive(Debug, Clone, PartialEq)]
pub enum PollerUpdate {
    /// A controller was attached. Derived UI must be rebuilt for `sample`'s
    /// cardinality.
    Attached {
        identity: String,
        sample: ControllerSample,
    },
    /// Fresh sample for the tracked controller
    Sample(ControllerSample),
    /// The tracked controller went away
    Detached,
    /// The host could not be created; the loop has exited
    Unavailable(String),
}

/// Idle/Connected state machine over a [`ControllerHost`]
pub struct ControllerPoller<H> {
    host: H,
    state: PollerState,
    connection: ConnectionState,
}

impl<H: ControllerHost> ControllerPoller<H> {
    pub fn new(host: H) -> Self {
        Self {
            host,
            state: PollerState::Idle,
            connection: ConnectionState::disconnected(),
        }
    }

    pub fn state(&self) -> PollerState {
        self.state
    }

    pub fn connection(&self) -> &ConnectionState {
        &self.connection
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Apply one host notification
    pub fn handle_notification(&mut self, notification: HostNotification) -> Option<PollerUpdate> {
        match notification {
            HostNotification::Attached(handle) => {
                info!("Controller attached: {} (slot {})", handle.id, handle.slot);
                Some(self.attach(handle))
            }
            HostNotification::Detached { slot } => {
                info!("Controller detached (slot {})", slot);
                self.detach()
            }
        }
    }

    /// One tick: drain notifications, then scan (idle) or sample (connected)
    pub fn tick(&mut self) -> Vec<PollerUpdate> {
        let mut updates: Vec<PollerUpdate> = self
            .host
            .poll_notifications()
            .into_iter()
            .filter_map(|n| self.handle_notification(n))
            .collect();

        match self.state {
            PollerState::Idle => {
                if let Some(handle) = self.host.discover().into_iter().next() {
                    info!("Discovered controller: {} (slot {})", handle.id, handle.slot);
                    updates.push(self.attach(handle));
                }
            }
            PollerState::Connected { slot } => match self.host.read_slot(slot) {
                Some(handle) => updates.push(PollerUpdate::Sample(ControllerSample::from_raw(
                    &handle.buttons,
                    &handle.axes,
                ))),
                None => {
                    debug!("Slot {} empty on sample, treating as detach", slot);
                    updates.extend(self.detach());
                }
            },
        }

        updates
    }

    fn attach(&mut self, handle: ControllerHandle) -> PollerUpdate {
        self.state = PollerState::Connected { slot: handle.slot };
        self.connection.mark_connected(handle.id.clone());
        PollerUpdate::Attached {
            identity: handle.id,
            sample: ControllerSample::from_raw(&handle.buttons, &handle.axes),
        }
    }

    fn detach(&mut self) -> Option<PollerUpdate> {
        let was_connected = self.state != PollerState::Idle;
        self.state = PollerState::Idle;
        self.connection.mark_disconnected();
        was_connected.then_some(PollerUpdate::Detached)
    }
}

struct LoopHandle {
    cancel: CancellationToken,
    thread: JoinHandle<()>,
}

/// Owner of the sampling thread.
///
/// At most one loop runs at a time: [`PollerLoop::start`] on a running loop is
/// a no-op, and [`PollerLoop::stop`] cancels the pending tick and clears the
/// handle so the loop can be started again.
#[derive(Default)]
pub struct PollerLoop {
    handle: Option<LoopHandle>,
}

impl PollerLoop {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|h| !h.thread.is_finished())
    }

    /// Spawn the sampling thread.
    ///
    /// The host is built on the sampling thread itself since controller APIs
    /// are generally not `Send`. Returns `Ok(false)` if a loop is already
    /// running.
    pub fn start<H, F>(
        &mut self,
        make_host: F,
        tick: Duration,
        tx: mpsc::UnboundedSender<PollerUpdate>,
    ) -> Result<bool, MonitorError>
    where
        H: ControllerHost + 'static,
        F: FnOnce() -> Result<H, MonitorError> + Send + 'static,
    {
        if self.is_running() {
            debug!("Poller loop already running");
            return Ok(false);
        }
        // Reap a loop that exited on its own
        self.stop();

        let cancel = CancellationToken::new();
        let loop_cancel = cancel.clone();
        let thread = std::thread::Builder::new()
            .name("controller-poller".into())
            .spawn(move || run_loop(make_host, tick, tx, loop_cancel))
            .map_err(|e| MonitorError::HostUnavailable(e.to_string()))?;

        self.handle = Some(LoopHandle { cancel, thread });
        Ok(true)
    }

    /// Cancel the loop and wait for the thread to exit. Idempotent.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.cancel.cancel();
            if handle.thread.join().is_err() {
                warn!("Poller thread panicked");
            }
        }
    }
}

impl Drop for PollerLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_loop<H, F>(
    make_host: F,
    tick: Duration,
    tx: mpsc::UnboundedSender<PollerUpdate>,
    cancel: CancellationToken,
) where
    H: ControllerHost,
    F: FnOnce() -> Result<H, MonitorError>,
{
    let host = match make_host() {
        Ok(host) => host,
        Err(e) => {
            warn!("Controller host unavailable: {}", e);
            let _ = tx.send(PollerUpdate::Unavailable(e.to_string()));
            return;
        }
    };

    debug!("Poller loop started ({:?} tick)", tick);
    let mut poller = ControllerPoller::new(host);

    while !cancel.is_cancelled() {
        for update in poller.tick() {
            if tx.send(update).is_err() {
                debug!("Poller receiver dropped, exiting");
                return;
            }
        }
        std::thread::sleep(tick);
    }

    debug!("Poller loop exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::RawButton;
    use std::collections::{BTreeMap, VecDeque};

    #[derive(Default)]
    struct FakeHost {
        slots: BTreeMap<usize, ControllerHandle>,
        pending: VecDeque<HostNotification>,
    }

    impl FakeHost {
        fn plug(&mut self, slot: usize, id: &str, notify: bool) {
            let handle = pad(slot, id, 0.0);
            self.slots.insert(slot, handle.clone());
            if notify {
                self.pending.push_back(HostNotification::Attached(handle));
            }
        }

        fn unplug(&mut self, slot: usize, notify: bool) {
            self.slots.remove(&slot);
            if notify {
                self.pending.push_back(HostNotification::Detached { slot });
            }
        }
    }

    impl ControllerHost for FakeHost {
        fn discover(&mut self) -> Vec<ControllerHandle> {
            self.slots.values().cloned().collect()
        }

        fn read_slot(&mut self, slot: usize) -> Option<ControllerHandle> {
            self.slots.get(&slot).cloned()
        }

        fn poll_notifications(&mut self) -> Vec<HostNotification> {
            self.pending.drain(..).collect()
        }
    }

    fn pad(slot: usize, id: &str, trigger: f64) -> ControllerHandle {
        ControllerHandle {
            slot,
            id: id.to_string(),
            buttons: vec![RawButton::Bare(0.0), RawButton::Bare(trigger)],
            axes: vec![0.0, 0.0],
        }
    }

    #[test]
    fn idle_scan_finds_present_controller() {
        let mut host = FakeHost::default();
        // Present before the poller existed: no attach notification
        host.plug(2, "8BitDo Pro 2", false);
        let mut poller = ControllerPoller::new(host);

        let updates = poller.tick();
        assert_eq!(poller.state(), PollerState::Connected { slot: 2 });
        assert_eq!(poller.connection().identity(), Some("8BitDo Pro 2"));
        assert!(matches!(
            &updates[..],
            [PollerUpdate::Attached { identity, .. }] if identity == "8BitDo Pro 2"
        ));
    }

    #[test]
    fn idle_scan_keeps_going_while_empty() {
        let mut poller = ControllerPoller::new(FakeHost::default());
        for _ in 0..5 {
            assert!(poller.tick().is_empty());
            assert_eq!(poller.state(), PollerState::Idle);
        }
        poller.host_mut().plug(0, "DualSense", false);
        poller.tick();
        assert_eq!(poller.state(), PollerState::Connected { slot: 0 });
    }

    #[test]
    fn connected_tick_samples_slot() {
        let mut poller = ControllerPoller::new(FakeHost::default());
        poller.host_mut().plug(0, "DualSense", true);
        poller.tick();

        poller.host_mut().slots.insert(0, pad(0, "DualSense", 1.0));
        let updates = poller.tick();
        match &updates[..] {
            [PollerUpdate::Sample(sample)] => {
                assert!(sample.buttons[1].pressed);
                assert_eq!(sample.buttons[1].value, 1.0);
            }
            other => panic!("expected one sample, got {other:?}"),
        }
    }

    #[test]
    fn empty_slot_is_implicit_detach() {
        let mut poller = ControllerPoller::new(FakeHost::default());
        poller.host_mut().plug(1, "Xbox", false);
        poller.tick();

        // Unplugged without a detach notification
        poller.host_mut().unplug(1, false);
        let updates = poller.tick();
        assert_eq!(updates, vec![PollerUpdate::Detached]);
        assert_eq!(poller.state(), PollerState::Idle);
        assert!(!poller.connection().is_connected());
    }

    #[test]
    fn detach_notification_goes_idle_then_rescans() {
        let mut poller = ControllerPoller::new(FakeHost::default());
        poller.host_mut().plug(0, "Pad A", true);
        poller.host_mut().plug(1, "Pad B", false);
        poller.tick();
        assert_eq!(poller.state(), PollerState::Connected { slot: 0 });

        poller.host_mut().unplug(0, true);
        let updates = poller.tick();
        // Detached, then the idle scan picks up the remaining controller
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0], PollerUpdate::Detached);
        assert!(matches!(&updates[1], PollerUpdate::Attached { identity, .. } if identity == "Pad B"));
        assert_eq!(poller.state(), PollerState::Connected { slot: 1 });
    }

    #[test]
    fn state_follows_latest_transition() {
        let mut poller = ControllerPoller::new(FakeHost::default());
        let script: &[(bool, bool)] = &[(true, true), (false, true), (true, false), (false, false)];
        for &(attach, notify) in script {
            if attach {
                poller.host_mut().plug(3, "Pad", notify);
            } else {
                poller.host_mut().unplug(3, notify);
            }
            poller.tick();
            let expected = if attach {
                PollerState::Connected { slot: 3 }
            } else {
                PollerState::Idle
            };
            assert_eq!(poller.state(), expected);
            assert_eq!(poller.connection().is_connected(), attach);
        }
    }

    #[test]
    fn detach_while_idle_emits_nothing() {
        let mut poller = ControllerPoller::new(FakeHost::default());
        assert_eq!(
            poller.handle_notification(HostNotification::Detached { slot: 4 }),
            None
        );
    }

    #[test]
    fn loop_start_is_reentrant_safe() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut poller_loop = PollerLoop::new();

        let make = || {
            let mut host = FakeHost::default();
            host.plug(0, "Pad", false);
            Ok(host)
        };
        assert!(poller_loop.start(make, Duration::from_millis(1), tx.clone()).unwrap());
        assert!(!poller_loop
            .start(|| Ok(FakeHost::default()), Duration::from_millis(1), tx.clone())
            .unwrap());
        assert!(poller_loop.is_running());

        let first = rx.blocking_recv().unwrap();
        assert!(matches!(first, PollerUpdate::Attached { .. }));

        poller_loop.stop();
        poller_loop.stop();
        assert!(!poller_loop.is_running());

        // Restart after stop
        assert!(poller_loop
            .start(|| Ok(FakeHost::default()), Duration::from_millis(1), tx)
            .unwrap());
        poller_loop.stop();
    }

    #[test]
    fn loop_reports_unavailable_host() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut poller_loop = PollerLoop::new();
        poller_loop
            .start(
                || Err::<FakeHost, _>(MonitorError::HostUnavailable("no backend".into())),
                Duration::from_millis(1),
                tx,
            )
            .unwrap();
        assert!(matches!(
            rx.blocking_recv(),
            Some(PollerUpdate::Unavailable(reason)) if reason.contains("no backend")
        ));
        poller_loop.stop();
    }
}
