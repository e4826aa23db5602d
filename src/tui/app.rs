//! TUI application state

use joymap_monitor::{
    backend_view, controller_view, BackendSnapshot, BackendView, ConnectionState,
    ControllerSample, ControllerView, Notice, PollerUpdate,
};
use tracing::debug;

use crate::api::{DeviceInfo, InputDevice};
use crate::config::MonitorConfig;

/// Requests the run loop has to carry out against the service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    RefreshDevices,
    LoadDeviceInfo,
    Connect(String),
    Disconnect,
}

/// Result of an [`Action`], delivered back to the run loop
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    Devices(Result<Vec<InputDevice>, String>),
    DeviceInfo(Result<DeviceInfo, String>),
    /// Connect failures also arrive as notices
    Connect {
        path: String,
        result: Result<String, String>,
    },
    Disconnect(Result<(), String>),
}

/// Main application state
pub struct App {
    pub config: MonitorConfig,
    /// Local controller channel, mirrored from poller updates
    pub controller: ConnectionState,
    /// Latest controller sample
    pub sample: Option<ControllerSample>,
    /// Latest backend channel snapshot
    pub backend: BackendSnapshot,
    /// Devices offered by the service
    pub devices: Vec<InputDevice>,
    /// Virtual output device, once loaded
    pub device_info: Option<DeviceInfo>,
    /// Highlighted row in the device list
    pub selected_device: usize,
    /// Status message (for errors/info)
    pub status_message: Option<String>,
    pub status_is_error: bool,
    /// Show help overlay
    pub show_help: bool,
    /// Should quit
    pub should_quit: bool,
}

impl App {
    pub fn new(config: MonitorConfig) -> Self {
        Self {
            config,
            controller: ConnectionState::disconnected(),
            sample: None,
            backend: BackendSnapshot::default(),
            devices: Vec::new(),
            device_info: None,
            selected_device: 0,
            status_message: None,
            status_is_error: false,
            show_help: false,
            should_quit: false,
        }
    }

    pub fn apply_poller_update(&mut self, update: PollerUpdate) {
        match update {
            PollerUpdate::Attached { identity, sample } => {
                self.set_status(format!("Controller connected: {identity}"), false);
                self.controller.mark_connected(identity);
                // New cardinality; previous rows are discarded wholesale
                self.sample = Some(sample);
            }
            PollerUpdate::Sample(sample) => {
                self.sample = Some(sample);
            }
            PollerUpdate::Detached => {
                self.controller.mark_disconnected();
                self.sample = None;
                self.set_status("Controller disconnected", false);
            }
            PollerUpdate::Unavailable(reason) => {
                self.controller.fail(reason.clone());
                self.sample = None;
                self.set_status(format!("Controller access failed: {reason}"), true);
            }
        }
    }

    pub fn set_backend(&mut self, snapshot: BackendSnapshot) {
        self.backend = snapshot;
    }

    pub fn apply_notice(&mut self, notice: Notice) {
        debug!("Notice: {}", notice);
        self.set_status(notice.to_string(), notice.is_error());
    }

    /// Record that `action` has been sent off
    pub fn begin(&mut self, action: &Action) {
        if let Action::Connect(path) = action {
            self.set_status(format!("Connecting to {path}..."), false);
        }
    }

    pub fn apply_outcome(&mut self, outcome: ActionOutcome) {
        match outcome {
            ActionOutcome::Devices(Ok(devices)) => self.set_devices(devices),
            ActionOutcome::Devices(Err(e)) => {
                self.set_status(format!("Failed to list devices: {e}"), true);
            }
            ActionOutcome::DeviceInfo(Ok(info)) => self.device_info = Some(info),
            ActionOutcome::DeviceInfo(Err(e)) => {
                self.set_status(format!("Failed to load device info: {e}"), true);
            }
            ActionOutcome::Connect { path, result } => {
                if let Err(e) = result {
                    debug!("Connect to {} failed: {}", path, e);
                }
            }
            ActionOutcome::Disconnect(Err(e)) => {
                self.set_status(format!("Disconnect failed: {e}"), true);
            }
            ActionOutcome::Disconnect(Ok(())) => {}
        }
    }

    pub fn set_devices(&mut self, devices: Vec<InputDevice>) {
        if devices.is_empty() {
            self.set_status("No input devices found", true);
        } else {
            self.set_status(format!("Found {} input devices", devices.len()), false);
        }
        self.devices = devices;
        self.selected_device = self.selected_device.min(self.devices.len().saturating_sub(1));
    }

    pub fn set_status(&mut self, message: impl Into<String>, is_error: bool) {
        self.status_message = Some(message.into());
        self.status_is_error = is_error;
    }

    pub fn selected_device(&self) -> Option<&InputDevice> {
        self.devices.get(self.selected_device)
    }

    /// Move selection up
    pub fn select_prev(&mut self) {
        self.selected_device = self.selected_device.saturating_sub(1);
    }

    /// Move selection down
    pub fn select_next(&mut self) {
        if self.selected_device + 1 < self.devices.len() {
            self.selected_device += 1;
        }
    }

    /// Connect request for the highlighted device
    pub fn connect_selected(&mut self) -> Option<Action> {
        match self.selected_device() {
            Some(device) => Some(Action::Connect(device.path.clone())),
            None => {
                self.set_status("Select a device first (d to refresh)", true);
                None
            }
        }
    }

    pub fn controller_view(&self) -> ControllerView {
        controller_view(
            &self.controller,
            self.sample.as_ref(),
            self.config.poller.deadzone,
        )
    }

    pub fn backend_view(&self) -> BackendView {
        backend_view(
            &self.backend.connection,
            &self.backend.history,
            self.config.stream.recent_rows,
        )
    }
}
