//! Controller samples
//!
//! Host environments report a button either as a `{pressed, value}` record or
//! as a bare number. [`RawButton`] captures both shapes and is normalised once,
//! at ingestion, into [`ButtonState`].

use serde::{Deserialize, Serialize};

/// A button exactly as the host reported it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawButton {
    /// Structured record with an explicit pressed flag
    Structured { pressed: bool, value: f64 },
    /// Single analog value; exactly 1.0 means pressed
    Bare(f64),
}

impl RawButton {
    pub fn normalize(self) -> ButtonState {
        match self {
            RawButton::Structured { pressed, value } => ButtonState { pressed, value },
            RawButton::Bare(value) => ButtonState {
                pressed: value == 1.0,
                value,
            },
        }
    }
}

/// Normalised button state
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ButtonState {
    pub pressed: bool,
    /// Analog value in [0, 1]
    pub value: f64,
}

/// Full controller state at one polling tick.
///
/// Indices are positional and stable for the lifetime of one connection.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ControllerSample {
    pub buttons: Vec<ButtonState>,
    /// Axis values in [-1, 1]
    pub axes: Vec<f64>,
}

impl ControllerSample {
    pub fn from_raw(buttons: &[RawButton], axes: &[f64]) -> Self {
        Self {
            buttons: buttons.iter().map(|b| b.normalize()).collect(),
            axes: axes.to_vec(),
        }
    }
}
