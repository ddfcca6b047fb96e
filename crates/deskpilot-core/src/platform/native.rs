//! Native desktop backend: rdev for injection, xcap for capture

use crate::error::{Error, Result};
use crate::input::{DesktopInput, MouseButton};
use crate::keys::canonical_key;
use crate::screen::Screenshot;
use rdev::{Button, EventType, Key};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::debug;

/// Gap between synthetic events; some window systems drop events sent faster.
const EVENT_GAP: Duration = Duration::from_millis(20);

#[derive(Debug, Default)]
pub struct NativeDesktop;

pub fn desktop() -> Arc<dyn DesktopInput> {
    Arc::new(NativeDesktop)
}

fn send(event: &EventType) -> Result<()> {
    rdev::simulate(event)
        .map_err(|e| Error::interaction("simulate input", format!("{:?} rejected: {:?}", event, e)))?;
    thread::sleep(EVENT_GAP);
    Ok(())
}

fn button(b: MouseButton) -> Button {
    match b {
        MouseButton::Left | MouseButton::Other => Button::Left,
        MouseButton::Right => Button::Right,
        MouseButton::Middle => Button::Middle,
    }
}

fn move_to(x: i32, y: i32) -> Result<()> {
    send(&EventType::MouseMove { x: x as f64, y: y as f64 })
}

fn tap(key: Key, shift: bool) -> Result<()> {
    if shift {
        send(&EventType::KeyPress(Key::ShiftLeft))?;
    }
    let result = send(&EventType::KeyPress(key)).and_then(|_| send(&EventType::KeyRelease(key)));
    if shift {
        send(&EventType::KeyRelease(Key::ShiftLeft))?;
    }
    result
}

impl DesktopInput for NativeDesktop {
    fn click(&self, x: i32, y: i32, b: MouseButton) -> Result<()> {
        debug!(x, y, button = b.as_str(), "click");
        move_to(x, y)?;
        send(&EventType::ButtonPress(button(b)))?;
        send(&EventType::ButtonRelease(button(b)))
    }

    fn drag(&self, from: (i32, i32), to: (i32, i32)) -> Result<()> {
        move_to(from.0, from.1)?;
        send(&EventType::ButtonPress(Button::Left))?;
        // Intermediate points so drop targets see movement
        for step in 1..=10 {
            let x = from.0 + (to.0 - from.0) * step / 10;
            let y = from.1 + (to.1 - from.1) * step / 10;
            move_to(x, y)?;
        }
        send(&EventType::ButtonRelease(Button::Left))
    }

    fn scroll(&self, x: i32, y: i32, dx: i64, dy: i64) -> Result<()> {
        move_to(x, y)?;
        send(&EventType::Wheel { delta_x: dx, delta_y: dy })
    }

    fn type_text(&self, text: &str) -> Result<()> {
        for c in text.chars() {
            let (key, shift) = char_to_key(c).ok_or_else(|| {
                Error::interaction("type_text", format!("no key for character {:?}", c))
            })?;
            tap(key, shift)?;
        }
        Ok(())
    }

    fn key_press(&self, name: &str) -> Result<()> {
        let (key, shift) = resolve(name)?;
        tap(key, shift)
    }

    fn key_combo(&self, names: &[&str]) -> Result<()> {
        let Some((last, held)) = names.split_last() else {
            return Ok(());
        };
        let held = held
            .iter()
            .map(|n| resolve(n).map(|(k, _)| k))
            .collect::<Result<Vec<_>>>()?;
        let (last, shift) = resolve(last)?;

        for k in &held {
            send(&EventType::KeyPress(*k))?;
        }
        let result = tap(last, shift);
        for k in held.iter().rev() {
            send(&EventType::KeyRelease(*k))?;
        }
        result
    }

    fn screenshot(&self) -> Result<Screenshot> {
        let monitors = xcap::Monitor::all()
            .map_err(|e| Error::interaction("screenshot", format!("failed to list monitors: {}", e)))?;
        let mut fallback = None;
        for monitor in monitors {
            match monitor.is_primary() {
                Ok(true) => {
                    return monitor
                        .capture_image()
                        .map_err(|e| Error::interaction("screenshot", e));
                }
                Ok(false) => {
                    if fallback.is_none() {
                        fallback = Some(monitor);
                    }
                }
                Err(e) => debug!("skipping monitor: {}", e),
            }
        }
        let monitor = fallback
            .ok_or_else(|| Error::interaction("screenshot", "no monitor available"))?;
        monitor
            .capture_image()
            .map_err(|e| Error::interaction("screenshot", e))
    }

    fn open_application(&self, name: &str) -> Result<()> {
        super::launch_application(name)
    }
}

fn resolve(name: &str) -> Result<(Key, bool)> {
    let canonical = canonical_key(name);
    if let Some(key) = named_key(&canonical) {
        return Ok((key, false));
    }
    let mut chars = canonical.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        if let Some(found) = char_to_key(c) {
            return Ok(found);
        }
    }
    Err(Error::interaction("press_key", format!("unknown key {:?}", name)))
}

fn named_key(name: &str) -> Option<Key> {
    Some(match name {
        "ctrl" => Key::ControlLeft,
        "alt" => Key::Alt,
        "shift" => Key::ShiftLeft,
        "cmd" => Key::MetaLeft,
        "escape" => Key::Escape,
        "enter" => Key::Return,
        "tab" => Key::Tab,
        "space" => Key::Space,
        "backspace" => Key::Backspace,
        "delete" => Key::Delete,
        "up" => Key::UpArrow,
        "down" => Key::DownArrow,
        "left" => Key::LeftArrow,
        "right" => Key::RightArrow,
        "home" => Key::Home,
        "end" => Key::End,
        "pageup" => Key::PageUp,
        "pagedown" => Key::PageDown,
        "insert" => Key::Insert,
        "capslock" => Key::CapsLock,
        "f1" => Key::F1,
        "f2" => Key::F2,
        "f3" => Key::F3,
        "f4" => Key::F4,
        "f5" => Key::F5,
        "f6" => Key::F6,
        "f7" => Key::F7,
        "f8" => Key::F8,
        "f9" => Key::F9,
        "f10" => Key::F10,
        "f11" => Key::F11,
        "f12" => Key::F12,
        _ => return None,
    })
}

/// Convert a char to (key, needs_shift) on a US layout
fn char_to_key(c: char) -> Option<(Key, bool)> {
    let upper = c.is_ascii_uppercase();
    Some(match c.to_ascii_lowercase() {
        'a' => (Key::KeyA, upper),
        'b' => (Key::KeyB, upper),
        'c' => (Key::KeyC, upper),
        'd' => (Key::KeyD, upper),
        'e' => (Key::KeyE, upper),
        'f' => (Key::KeyF, upper),
        'g' => (Key::KeyG, upper),
        'h' => (Key::KeyH, upper),
        'i' => (Key::KeyI, upper),
        'j' => (Key::KeyJ, upper),
        'k' => (Key::KeyK, upper),
        'l' => (Key::KeyL, upper),
        'm' => (Key::KeyM, upper),
        'n' => (Key::KeyN, upper),
        'o' => (Key::KeyO, upper),
        'p' => (Key::KeyP, upper),
        'q' => (Key::KeyQ, upper),
        'r' => (Key::KeyR, upper),
        's' => (Key::KeyS, upper),
        't' => (Key::KeyT, upper),
        'u' => (Key::KeyU, upper),
        'v' => (Key::KeyV, upper),
        'w' => (Key::KeyW, upper),
        'x' => (Key::KeyX, upper),
        'y' => (Key::KeyY, upper),
        'z' => (Key::KeyZ, upper),
        '0' | ')' => (Key::Num0, c == ')'),
        '1' | '!' => (Key::Num1, c == '!'),
        '2' | '@' => (Key::Num2, c == '@'),
        '3' | '#' => (Key::Num3, c == '#'),
        '4' | '$' => (Key::Num4, c == '$'),
        '5' | '%' => (Key::Num5, c == '%'),
        '6' | '^' => (Key::Num6, c == '^'),
        '7' | '&' => (Key::Num7, c == '&'),
        '8' | '*' => (Key::Num8, c == '*'),
        '9' | '(' => (Key::Num9, c == '('),
        ' ' => (Key::Space, false),
        '\n' => (Key::Return, false),
        '\t' => (Key::Tab, false),
        '\x08' => (Key::Backspace, false),
        '-' | '_' => (Key::Minus, c == '_'),
        '=' | '+' => (Key::Equal, c == '+'),
        '[' | '{' => (Key::LeftBracket, c == '{'),
        ']' | '}' => (Key::RightBracket, c == '}'),
        '\\' | '|' => (Key::BackSlash, c == '|'),
        ';' | ':' => (Key::SemiColon, c == ':'),
        '\'' | '"' => (Key::Quote, c == '"'),
        ',' | '<' => (Key::Comma, c == '<'),
        '.' | '>' => (Key::Dot, c == '>'),
        '/' | '?' => (Key::Slash, c == '?'),
        '`' | '~' => (Key::BackQuote, c == '~'),
        _ => return None,
    })
}
