//! TUI (Terminal User Interface) for the monitor dashboard
//!
//! Shows the local controller and the backend input device side by side.

pub mod app;
pub mod render;
pub mod tasks;

pub use app::{Action, ActionOutcome, App};
pub use tasks::spawn_action;
