//! Monitor error types

use thiserror::Error;

/// Errors raised inside the monitoring subsystem.
///
/// None of these escape a callback boundary: the poller and the stream
/// supervisor turn them into state transitions or [`crate::Notice`]s.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MonitorError {
    /// The local controller API could not be initialised
    #[error("Controller host unavailable: {0}")]
    HostUnavailable(String),

    /// A request to the backend collaborator failed at the transport level
    #[error("Backend request failed: {0}")]
    Backend(String),

    /// The backend answered but refused to connect the device
    #[error("Backend rejected connection: {0}")]
    ConnectRejected(String),

    /// The backend answered with a non-success status
    #[error("HTTP {status}")]
    Http { status: u16 },

    /// The event channel broke or closed
    #[error("Event channel failed: {0}")]
    Channel(String),

    /// An event payload could not be parsed
    #[error("Malformed event payload: {0}")]
    Parse(String),

    /// The monitor task is gone
    #[error("Monitor stopped")]
    Stopped,
}

impl From<serde_json::Error> for MonitorError {
    fn from(e: serde_json::Error) -> Self {
        MonitorError::Parse(e.to_string())
    }
}
