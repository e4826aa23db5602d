//! Local controller environment
//!
//! The poller never talks to a controller API directly. It goes through
//! [`ControllerHost`], which exposes a discovery query, per-slot reads and the
//! asynchronous attach/detach notifications.

use crate::sample::RawButton;

#[cfg(feature = "gilrs")]
pub mod gilrs;

/// One connected controller as reported by the host
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerHandle {
    /// Host-assigned slot, stable while the controller stays attached
    pub slot: usize,
    /// Human-readable controller id
    pub id: String,
    pub buttons: Vec<RawButton>,
    pub axes: Vec<f64>,
}

/// Attach/detach notifications
#[derive(Debug, Clone, PartialEq)]
pub enum HostNotification {
    Attached(ControllerHandle),
    Detached { slot: usize },
}

/// Host controller environment
pub trait ControllerHost {
    /// Every controller currently present, ordered by slot
    fn discover(&mut self) -> Vec<ControllerHandle>;

    /// Current state of one slot, `None` if the slot is empty
    fn read_slot(&mut self, slot: usize) -> Option<ControllerHandle>;

    /// Drain notifications that arrived since the last call.
    ///
    /// These are not guaranteed to fire for controllers present before the
    /// host was created, which is why the poller keeps scanning while idle.
    fn poll_notifications(&mut self) -> Vec<HostNotification>;
}
