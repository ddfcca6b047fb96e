//! Keyboard and mouse input simulation

use crate::error::Result;
use crate::screen::Screenshot;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    #[default]
    Left,
    Right,
    Middle,
    #[serde(other)]
    Other,
}

impl MouseButton {
    pub fn as_str(self) -> &'static str {
        match self {
            MouseButton::Left => "left",
            MouseButton::Right => "right",
            MouseButton::Middle => "middle",
            MouseButton::Other => "other",
        }
    }
}

/// The live desktop: global pointer/keyboard injection and screen capture.
///
/// Key names passed here are canonical (see [`crate::keys::canonical_key`]);
/// implementations may reject names they cannot map.
pub trait DesktopInput: Send + Sync {
    fn click(&self, x: i32, y: i32, button: MouseButton) -> Result<()>;

    fn drag(&self, from: (i32, i32), to: (i32, i32)) -> Result<()>;

    fn scroll(&self, x: i32, y: i32, dx: i64, dy: i64) -> Result<()>;

    /// Type literal text, character by character.
    fn type_text(&self, text: &str) -> Result<()>;

    /// Tap one named key or character.
    fn key_press(&self, key: &str) -> Result<()>;

    /// Hold every key but the last, tap the last, release in reverse.
    fn key_combo(&self, keys: &[&str]) -> Result<()>;

    fn screenshot(&self) -> Result<Screenshot>;

    /// Launch an application by name.
    fn open_application(&self, name: &str) -> Result<()>;
}
