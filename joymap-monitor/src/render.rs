//! Display models for both monitoring channels
//!
//! Everything here is a pure function of a [`ConnectionState`] and the latest
//! sample or event history. A disconnected channel always yields empty rows so
//! nothing stale stays on screen.

use chrono::{DateTime, Local, Utc};

use crate::connection::ConnectionState;
use crate::history::{distinct_event_names, InputEvent};
use crate::sample::ControllerSample;

/// Intensity of a fully released button
pub const BUTTON_OPACITY_MIN: f64 = 0.3;
/// Intensity added between released and fully pressed
pub const BUTTON_OPACITY_RANGE: f64 = 0.7;
/// Axis magnitude below which the stick counts as centred
pub const AXIS_DEADZONE: f64 = 0.1;
/// Rows in the recent-event panel
pub const RECENT_EVENT_ROWS: usize = 10;

const AXIS_NAMES: [&str; 8] = [
    "Left Stick X",
    "Left Stick Y",
    "Right Stick X",
    "Right Stick Y",
    "L2",
    "R2",
    "D-Pad X",
    "D-Pad Y",
];

const NO_TIME: &str = "--:--:--";

/// Map a button value in [0, 1] to a display intensity in [0.3, 1.0]
pub fn button_intensity(value: f64) -> f64 {
    BUTTON_OPACITY_MIN + value.clamp(0.0, 1.0) * BUTTON_OPACITY_RANGE
}

/// Map an axis value in [-1, 1] to a bar position in percent
pub fn axis_position(value: f64) -> f64 {
    (value.clamp(-1.0, 1.0) + 1.0) / 2.0 * 100.0
}

pub fn axis_name(index: usize) -> String {
    AXIS_NAMES
        .get(index)
        .map(|name| name.to_string())
        .unwrap_or_else(|| format!("Axis {index}"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisZone {
    Neutral,
    Active,
}

impl AxisZone {
    /// Strict comparison: a magnitude equal to the deadzone is active
    pub fn classify(value: f64, deadzone: f64) -> Self {
        if value.abs() < deadzone {
            AxisZone::Neutral
        } else {
            AxisZone::Active
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ButtonRow {
    pub label: String,
    pub pressed: bool,
    pub value: f64,
    pub intensity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AxisRow {
    pub label: String,
    pub value: f64,
    /// 0..=100
    pub position: f64,
    pub zone: AxisZone,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ControllerView {
    pub connected: bool,
    pub identity: Option<String>,
    pub status: String,
    pub buttons: Vec<ButtonRow>,
    pub axes: Vec<AxisRow>,
}

pub fn controller_view(
    connection: &ConnectionState,
    sample: Option<&ControllerSample>,
    deadzone: f64,
) -> ControllerView {
    let status = status_line(connection, "No controller detected");
    let sample = match (connection.is_connected(), sample) {
        (true, Some(sample)) => sample,
        _ => {
            return ControllerView {
                connected: connection.is_connected(),
                identity: connection.identity().map(str::to_string),
                status,
                buttons: Vec::new(),
                axes: Vec::new(),
            }
        }
    };

    let buttons = sample
        .buttons
        .iter()
        .enumerate()
        .map(|(i, button)| ButtonRow {
            label: format!("Button {i}"),
            pressed: button.pressed,
            value: button.value,
            intensity: button_intensity(button.value),
        })
        .collect();

    let axes = sample
        .axes
        .iter()
        .enumerate()
        .map(|(i, &value)| AxisRow {
            label: axis_name(i),
            value,
            position: axis_position(value),
            zone: AxisZone::classify(value, deadzone),
        })
        .collect();

    ControllerView {
        connected: true,
        identity: connection.identity().map(str::to_string),
        status,
        buttons,
        axes,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Press,
    Release,
}

impl EventKind {
    pub fn of(value: f64) -> Self {
        if value == 0.0 {
            EventKind::Release
        } else {
            EventKind::Press
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventRow {
    pub name: String,
    pub value: f64,
    pub kind: EventKind,
    /// Local wall-clock time of the event
    pub time: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BackendView {
    pub connected: bool,
    pub device_name: Option<String>,
    pub status: String,
    /// Newest first, at most the requested row count
    pub recent: Vec<EventRow>,
    /// Distinct event names in the retained history
    pub distinct_names: Vec<String>,
    pub retained: usize,
}

/// `history` is newest first, as kept by [`crate::EventHistory`]
pub fn backend_view(
    connection: &ConnectionState,
    history: &[InputEvent],
    recent_rows: usize,
) -> BackendView {
    let status = status_line(connection, "No device connected");
    if !connection.is_connected() {
        return BackendView {
            connected: false,
            device_name: None,
            status,
            recent: Vec::new(),
            distinct_names: Vec::new(),
            retained: 0,
        };
    }

    let recent = history
        .iter()
        .take(recent_rows)
        .map(|event| EventRow {
            name: event.event_name.clone(),
            value: event.value,
            kind: EventKind::of(event.value),
            time: format_timestamp(event.timestamp_secs),
        })
        .collect();

    BackendView {
        connected: true,
        device_name: connection.identity().map(str::to_string),
        status,
        recent,
        distinct_names: distinct_event_names(history.iter())
            .into_iter()
            .map(str::to_string)
            .collect(),
        retained: history.len(),
    }
}

fn status_line(connection: &ConnectionState, idle: &str) -> String {
    match (connection.identity(), connection.last_error()) {
        (Some(identity), _) if connection.is_connected() => format!("Connected: {identity}"),
        (_, Some(error)) => format!("{idle} ({error})"),
        _ => idle.to_string(),
    }
}

fn format_timestamp(secs: f64) -> String {
    if !secs.is_finite() || secs < 0.0 {
        return NO_TIME.to_string();
    }
    let whole = secs.trunc();
    let nanos = ((secs - whole) * 1e9) as u32;
    DateTime::<Utc>::from_timestamp(whole as i64, nanos.min(999_999_999))
        .map(|t| t.with_timezone(&Local).format("%H:%M:%S").to_string())
        .unwrap_or_else(|| NO_TIME.to_string())
}
