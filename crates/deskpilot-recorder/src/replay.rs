//! Workflow replay through a [`DesktopInput`]

use crate::events::{EventData, Workflow};
use crate::storage::WorkflowStorage;
use deskpilot_core::clock::{secs, Sleeper, ThreadSleeper};
use deskpilot_core::keys::canonical_key;
use deskpilot_core::{DesktopInput, Error, ErrorCode, Result};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Replay recorded workflows
pub struct Replayer {
    input: Arc<dyn DesktopInput>,
    sleeper: Arc<dyn Sleeper>,
    settle: Duration,
    max_gap: Duration,
}

impl Replayer {
    pub fn new(input: Arc<dyn DesktopInput>) -> Self {
        Self {
            input,
            sleeper: Arc::new(ThreadSleeper),
            settle: Duration::from_secs(2),
            max_gap: Duration::from_secs(2),
        }
    }

    pub fn sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Pause before the first event so the user can let go of the mouse
    pub fn settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// Longest pause between two events, whatever the recording says
    pub fn max_gap(mut self, max_gap: Duration) -> Self {
        self.max_gap = max_gap;
        self
    }

    /// Load `id` from `storage` and play it.
    pub fn replay(&self, storage: &WorkflowStorage, id: &str, speed: f64) -> Result<ReplayReport> {
        let workflow = storage.load(id)?;
        info!(id = %id, name = %workflow.name, "replaying workflow");
        self.play(&workflow, speed)
    }

    /// Play a workflow (speed 1.0 = real-time, 2.0 = twice as fast).
    ///
    /// Events that fail are logged and skipped; the report counts them.
    pub fn play(&self, workflow: &Workflow, speed: f64) -> Result<ReplayReport> {
        if !speed.is_finite() || speed <= 0.0 {
            return Err(Error::new(
                ErrorCode::InvalidAction,
                format!("Replay speed must be a positive number, got {}", speed),
            ));
        }

        let mut report = ReplayReport {
            events_total: workflow.actions.len(),
            ..Default::default()
        };
        if workflow.actions.is_empty() {
            return Ok(report);
        }

        self.sleeper.sleep(self.settle);

        let mut last_t = 0.0;
        for (i, event) in workflow.actions.iter().enumerate() {
            let delay = secs((event.timestamp - last_t) / speed);
            if !delay.is_zero() {
                self.sleeper.sleep(delay.min(self.max_gap));
            }
            last_t = event.timestamp;

            match self.emit(&event.data) {
                Ok(()) => {
                    report.events_played += 1;
                    match event.data {
                        EventData::MouseClick { .. } => report.clicks += 1,
                        EventData::MouseScroll { .. } => report.scrolls += 1,
                        EventData::KeyPress { .. } => report.keys += 1,
                    }
                }
                Err(e) => {
                    warn!("event {} failed, skipping: {}", i, e);
                    report.events_failed += 1;
                }
            }
        }

        info!(
            played = report.events_played,
            failed = report.events_failed,
            "replay finished"
        );
        Ok(report)
    }

    fn emit(&self, data: &EventData) -> Result<()> {
        debug!(?data, "replay event");
        match data {
            EventData::MouseClick { x, y, button } => self.input.click(*x, *y, *button),
            EventData::MouseScroll { x, y, dx, dy } => self.input.scroll(*x, *y, *dx, *dy),
            EventData::KeyPress { key } => {
                if key.chars().count() == 1 {
                    self.input.type_text(key)
                } else {
                    self.input.key_press(&canonical_key(key))
                }
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReplayReport {
    pub events_total: usize,
    pub events_played: usize,
    pub events_failed: usize,
    pub clicks: usize,
    pub scrolls: usize,
    pub keys: usize,
}
