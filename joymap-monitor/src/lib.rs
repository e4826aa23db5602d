//! Live device-connection monitoring for the joymap configuration client
//!
//! Two independent channels are tracked:
//!
//! - a locally attached game controller, discovered and sampled by
//!   [`poller::ControllerPoller`] on a fixed tick
//! - a backend-managed input device whose events arrive over a server-pushed
//!   event stream, supervised by [`stream::BackendMonitor`] with bounded
//!   exponential backoff
//!
//! ```text
//! [ControllerHost] -> [ControllerPoller] --PollerUpdate--+
//!                                                         +--> [render] -> view models
//! [EventConnector] -> [StreamSupervisor] --snapshot------+
//! ```
//!
//! Each channel owns its own [`ConnectionState`]; the [`render`] module only
//! reads snapshots.

pub mod connection;
pub mod error;
pub mod history;
pub mod host;
pub mod poller;
pub mod reconnect;
pub mod render;
pub mod sample;
pub mod sse;
pub mod stream;

pub use connection::ConnectionState;
pub use error::MonitorError;
pub use history::{EventHistory, InputEvent, DEFAULT_HISTORY_CAPACITY};
pub use host::{ControllerHandle, ControllerHost, HostNotification};
pub use poller::{ControllerPoller, PollerLoop, PollerState, PollerUpdate, DEFAULT_TICK};
pub use reconnect::{ReconnectDecision, ReconnectState};
pub use render::{
    axis_name, axis_position, backend_view, button_intensity, controller_view, AxisRow, AxisZone,
    BackendView, ButtonRow, ControllerView, EventKind, EventRow, AXIS_DEADZONE,
    RECENT_EVENT_ROWS,
};
pub use sample::{ButtonState, ControllerSample, RawButton};
pub use sse::{HttpEventConnector, SseDecoder};
pub use stream::{
    BackendMonitor, BackendSnapshot, Effect, EventChannel, EventConnector, InputBackend,
    MonitorHandle, Notice, StreamPhase, StreamSettings, StreamSupervisor,
};

#[cfg(feature = "gilrs")]
pub use host::gilrs::GilrsHost;
