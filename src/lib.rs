//! joymap: terminal client for the joystick mapping service
//!
//! Talks to the mapping service's REST API, and hosts the live monitoring
//! dashboard built on [`joymap_monitor`].

pub mod api;
pub mod config;
pub mod tui;

pub use api::{ApiClient, ApiError, DeviceInfo, InputDevice, Mapping, MappingSet};
pub use config::MonitorConfig;
