//! Backend used when native input support is compiled out.
//!
//! Applications can still be launched; everything touching the pointer,
//! keyboard or screen fails with `Unsupported`.

use crate::error::{Error, Result};
use crate::input::{DesktopInput, MouseButton};
use crate::screen::Screenshot;
use std::sync::Arc;

const FEATURE: &str = "native";

#[derive(Debug, Default)]
pub struct UnsupportedDesktop;

pub fn desktop() -> Arc<dyn DesktopInput> {
    Arc::new(UnsupportedDesktop)
}

impl DesktopInput for UnsupportedDesktop {
    fn click(&self, _x: i32, _y: i32, _button: MouseButton) -> Result<()> {
        Err(Error::unsupported("Pointer input", FEATURE))
    }

    fn drag(&self, _from: (i32, i32), _to: (i32, i32)) -> Result<()> {
        Err(Error::unsupported("Pointer input", FEATURE))
    }

    fn scroll(&self, _x: i32, _y: i32, _dx: i64, _dy: i64) -> Result<()> {
        Err(Error::unsupported("Pointer input", FEATURE))
    }

    fn type_text(&self, _text: &str) -> Result<()> {
        Err(Error::unsupported("Keyboard input", FEATURE))
    }

    fn key_press(&self, _key: &str) -> Result<()> {
        Err(Error::unsupported("Keyboard input", FEATURE))
    }

    fn key_combo(&self, _keys: &[&str]) -> Result<()> {
        Err(Error::unsupported("Keyboard input", FEATURE))
    }

    fn screenshot(&self) -> Result<Screenshot> {
        Err(Error::unsupported("Screen capture", FEATURE))
    }

    fn open_application(&self, name: &str) -> Result<()> {
        super::launch_application(name)
    }
}
