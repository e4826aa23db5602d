//! [`ControllerHost`] backed by gilrs
//!
//! Buttons and axes are read in the standard gamepad order so indices stay
//! stable no matter how the underlying driver enumerates codes.

use gilrs::{Axis, Button, EventType, Gamepad, GamepadId, Gilrs};
use tracing::debug;

use super::{ControllerHandle, ControllerHost, HostNotification};
use crate::error::MonitorError;
use crate::sample::RawButton;

/// Standard gamepad button order
const BUTTONS: [Button; 17] = [
    Button::South,
    Button::East,
    Button::West,
    Button::North,
    Button::LeftTrigger,
    Button::RightTrigger,
    Button::LeftTrigger2,
    Button::RightTrigger2,
    Button::Select,
    Button::Start,
    Button::LeftThumb,
    Button::RightThumb,
    Button::DPadUp,
    Button::DPadDown,
    Button::DPadLeft,
    Button::DPadRight,
    Button::Mode,
];

/// Sticks first, then analog triggers, then the d-pad axes
const AXES: [Axis; 8] = [
    Axis::LeftStickX,
    Axis::LeftStickY,
    Axis::RightStickX,
    Axis::RightStickY,
    Axis::LeftZ,
    Axis::RightZ,
    Axis::DPadX,
    Axis::DPadY,
];

pub struct GilrsHost {
    gilrs: Gilrs,
}

impl GilrsHost {
    pub fn new() -> Result<Self, MonitorError> {
        let gilrs = Gilrs::new().map_err(|e| MonitorError::HostUnavailable(e.to_string()))?;
        Ok(Self { gilrs })
    }
}

fn slot_of(id: GamepadId) -> usize {
    usize::from(id)
}

fn to_handle(id: GamepadId, gamepad: &Gamepad<'_>) -> ControllerHandle {
    let buttons = BUTTONS
        .iter()
        .map(|&button| match gamepad.button_data(button) {
            Some(data) => RawButton::Structured {
                pressed: data.is_pressed(),
                value: f64::from(data.value()),
            },
            None => RawButton::Bare(0.0),
        })
        .collect();
    let axes = AXES
        .iter()
        .map(|&axis| {
            gamepad
                .axis_data(axis)
                .map(|data| f64::from(data.value()))
                .unwrap_or(0.0)
        })
        .collect();

    ControllerHandle {
        slot: slot_of(id),
        id: gamepad.name().to_string(),
        buttons,
        axes,
    }
}

impl ControllerHost for GilrsHost {
    fn discover(&mut self) -> Vec<ControllerHandle> {
        let mut handles: Vec<_> = self
            .gilrs
            .gamepads()
            .map(|(id, gamepad)| to_handle(id, &gamepad))
            .collect();
        handles.sort_by_key(|h| h.slot);
        handles
    }

    fn read_slot(&mut self, slot: usize) -> Option<ControllerHandle> {
        self.gilrs
            .gamepads()
            .find(|(id, _)| slot_of(*id) == slot)
            .map(|(id, gamepad)| to_handle(id, &gamepad))
    }

    fn poll_notifications(&mut self) -> Vec<HostNotification> {
        let mut notifications = Vec::new();
        // Draining events also refreshes gilrs' cached gamepad state
        while let Some(event) = self.gilrs.next_event() {
            match event.event {
                EventType::Connected => {
                    let gamepad = self.gilrs.gamepad(event.id);
                    debug!("gilrs: gamepad {} connected", slot_of(event.id));
                    notifications.push(HostNotification::Attached(to_handle(event.id, &gamepad)));
                }
                EventType::Disconnected => {
                    debug!("gilrs: gamepad {} disconnected", slot_of(event.id));
                    notifications.push(HostNotification::Detached {
                        slot: slot_of(event.id),
                    });
                }
                _ => {}
            }
        }
        notifications
    }
}
