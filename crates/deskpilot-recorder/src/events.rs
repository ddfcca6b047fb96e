//! Recorded event types
//!
//! A workflow file looks like:
//!
//! ```json
//! {"name": "login", "created_at": "2024-05-01T10:00:00Z", "duration": 4.2,
//!  "actions_count": 2,
//!  "actions": [{"type": "mouse_click", "x": 10, "y": 20, "button": "left", "timestamp": 0.8},
//!              {"type": "key_press", "key": "enter", "timestamp": 1.9}]}
//! ```

use chrono::{DateTime, Utc};
use deskpilot_core::MouseButton;
use serde::{Deserialize, Serialize};

/// A persisted recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub name: String,
    #[serde(alias = "createdAt")]
    pub created_at: DateTime<Utc>,
    /// Seconds between arm and stop.
    #[serde(alias = "durationSeconds", default)]
    pub duration: f64,
    #[serde(alias = "actionsCount", default)]
    pub actions_count: usize,
    #[serde(default)]
    pub actions: Vec<RecordedEvent>,
}

impl Workflow {
    pub fn new(name: impl Into<String>, duration: f64, actions: Vec<RecordedEvent>) -> Self {
        Self {
            name: name.into(),
            created_at: Utc::now(),
            duration,
            actions_count: actions.len(),
            actions,
        }
    }

    pub fn counts(&self) -> EventCounts {
        let mut counts = EventCounts::default();
        for e in &self.actions {
            match e.data {
                EventData::MouseClick { .. } => counts.clicks += 1,
                EventData::MouseScroll { .. } => counts.scrolls += 1,
                EventData::KeyPress { .. } => counts.keys += 1,
            }
        }
        counts
    }
}

/// Single event: payload plus seconds since recording start
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedEvent {
    #[serde(flatten)]
    pub data: EventData,
    pub timestamp: f64,
}

impl RecordedEvent {
    pub fn new(data: EventData, timestamp: f64) -> Self {
        Self { data, timestamp }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventData {
    MouseClick {
        x: i32,
        y: i32,
        #[serde(default)]
        button: MouseButton,
    },
    MouseScroll {
        x: i32,
        y: i32,
        dx: i64,
        dy: i64,
    },
    /// `key` is a single character or a key name such as `ctrl_l` or `esc`.
    KeyPress { key: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EventCounts {
    pub clicks: usize,
    pub scrolls: usize,
    pub keys: usize,
}

/// Listing entry for a stored workflow.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowSummary {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub actions_count: usize,
    pub duration: f64,
}
