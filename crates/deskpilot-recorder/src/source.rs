//! Where raw input comes from
//!
//! A source fans live input out to subscribers over two channels, one for
//! the pointer and one for the keyboard. Dropping the receivers ends the
//! subscription.

use crossbeam_channel::Receiver;
use deskpilot_core::{MouseButton, Result};
use std::time::Instant;

#[derive(Debug, Clone, PartialEq)]
pub enum RawKind {
    ButtonPress { x: f64, y: f64, button: MouseButton },
    ButtonRelease { x: f64, y: f64, button: MouseButton },
    Wheel { x: f64, y: f64, dx: i64, dy: i64 },
    Move { x: f64, y: f64 },
    KeyPress { key: String },
    KeyRelease { key: String },
}

impl RawKind {
    pub fn is_pointer(&self) -> bool {
        !matches!(self, RawKind::KeyPress { .. } | RawKind::KeyRelease { .. })
    }
}

/// One input event as observed by a source, stamped on arrival.
#[derive(Debug, Clone, PartialEq)]
pub struct RawInput {
    pub at: Instant,
    pub kind: RawKind,
}

impl RawInput {
    pub fn now(kind: RawKind) -> Self {
        Self { at: Instant::now(), kind }
    }
}

pub struct Subscription {
    pub pointer: Receiver<RawInput>,
    pub keyboard: Receiver<RawInput>,
}

pub trait InputSource: Send + Sync {
    fn subscribe(&self) -> Result<Subscription>;
}

/// The global hook for this build.
pub fn default_source() -> std::sync::Arc<dyn InputSource> {
    crate::platform::current::source()
}
