//! Backend input events and their bounded history

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::error::MonitorError;

/// Number of events retained by default
pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

/// One event pushed by the backend input device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputEvent {
    /// evdev-style name, e.g. `BTN_SOUTH` or `ABS_X`
    pub event_name: String,
    pub value: f64,
    /// Seconds since the Unix epoch, fractional
    #[serde(rename = "timestamp")]
    pub timestamp_secs: f64,
}

impl InputEvent {
    /// Parse one event-stream payload
    pub fn from_json(data: &str) -> Result<Self, MonitorError> {
        Ok(serde_json::from_str(data)?)
    }
}

/// Newest-first event log bounded to a fixed capacity.
///
/// Ordering is by receipt, never by the embedded timestamp.
#[derive(Debug, Clone)]
pub struct EventHistory {
    events: VecDeque<InputEvent>,
    capacity: usize,
}

impl EventHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Prepend an event, evicting the oldest beyond capacity
    pub fn push(&mut self, event: InputEvent) {
        self.events.push_front(event);
        self.events.truncate(self.capacity);
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Newest first
    pub fn iter(&self) -> impl Iterator<Item = &InputEvent> {
        self.events.iter()
    }

    /// The `n` most recent events, newest first
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &InputEvent> {
        self.events.iter().take(n)
    }

    /// Distinct event names in the retained window, in newest-first order of
    /// first appearance
    pub fn distinct_names(&self) -> Vec<&str> {
        distinct_event_names(self.events.iter())
    }

    pub fn to_vec(&self) -> Vec<InputEvent> {
        self.events.iter().cloned().collect()
    }
}

impl Default for EventHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

pub(crate) fn distinct_event_names<'a>(
    events: impl Iterator<Item = &'a InputEvent>,
) -> Vec<&'a str> {
    let mut names: Vec<&str> = Vec::new();
    for event in events {
        if !names.contains(&event.event_name.as_str()) {
            names.push(&event.event_name);
        }
    }
    names
}
