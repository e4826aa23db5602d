//! Per-channel connection state

/// Whether a device is attached on one monitored channel.
///
/// `identity` is only ever present while `connected` is true; the fields are
/// private so the transition methods are the only way to change them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionState {
    connected: bool,
    identity: Option<String>,
    last_error: Option<String>,
}

impl ConnectionState {
    /// A channel with nothing attached
    pub fn disconnected() -> Self {
        Self::default()
    }

    /// Attach a device. Clears any previous error.
    pub fn mark_connected(&mut self, identity: impl Into<String>) {
        self.connected = true;
        self.identity = Some(identity.into());
        self.last_error = None;
    }

    /// Detach without recording an error. Idempotent.
    pub fn mark_disconnected(&mut self) {
        self.connected = false;
        self.identity = None;
    }

    /// Detach and record why.
    pub fn fail(&mut self, reason: impl Into<String>) {
        self.mark_disconnected();
        self.last_error = Some(reason.into());
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}
