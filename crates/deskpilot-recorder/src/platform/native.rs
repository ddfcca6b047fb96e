//! Global input hook using rdev
//!
//! `rdev::listen` can only run once per process and never returns, so one
//! hook thread is started lazily and fans events out to every live
//! subscription. Pointer coordinates only arrive with move events; the hook
//! remembers the last position and stamps it onto presses and wheel events.

use crate::source::{InputSource, RawInput, RawKind, Subscription};
use crossbeam_channel::{bounded, Sender, TrySendError};
use deskpilot_core::{Error, ErrorCode, MouseButton, Result};
use parking_lot::Mutex;
use rdev::{Button, EventType, Key};
use std::sync::{Arc, OnceLock};
use std::thread;
use tracing::{error, warn};

const CHANNEL_CAPACITY: usize = 4096;

struct Subscriber {
    pointer: Sender<RawInput>,
    keyboard: Sender<RawInput>,
}

#[derive(Default)]
struct Hub {
    subscribers: Mutex<Vec<Subscriber>>,
    failure: Mutex<Option<String>>,
}

impl Hub {
    fn publish(&self, input: RawInput) {
        let mut subs = self.subscribers.lock();
        subs.retain(|s| {
            let tx = if input.kind.is_pointer() { &s.pointer } else { &s.keyboard };
            match tx.try_send(input.clone()) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    warn!("input subscriber is lagging, dropping event");
                    true
                }
                Err(TrySendError::Disconnected(_)) => false,
            }
        });
    }
}

static HUB: OnceLock<Arc<Hub>> = OnceLock::new();

fn hub() -> Arc<Hub> {
    HUB.get_or_init(|| {
        let hub = Arc::new(Hub::default());
        let h = hub.clone();
        let spawned = thread::Builder::new()
            .name("input-hook".into())
            .spawn(move || run_hook(h));
        if let Err(e) = spawned {
            *hub.failure.lock() = Some(format!("failed to start input hook: {}", e));
        }
        hub
    })
    .clone()
}

fn run_hook(hub: Arc<Hub>) {
    let sink = hub.clone();
    let mut last = (0.0f64, 0.0f64);
    let result = rdev::listen(move |event: rdev::Event| {
        let kind = match event.event_type {
            EventType::MouseMove { x, y } => {
                last = (x, y);
                RawKind::Move { x, y }
            }
            EventType::ButtonPress(b) => RawKind::ButtonPress { x: last.0, y: last.1, button: button(b) },
            EventType::ButtonRelease(b) => {
                RawKind::ButtonRelease { x: last.0, y: last.1, button: button(b) }
            }
            EventType::Wheel { delta_x, delta_y } => RawKind::Wheel {
                x: last.0,
                y: last.1,
                dx: delta_x,
                dy: delta_y,
            },
            EventType::KeyPress(k) => RawKind::KeyPress { key: key_name(k, event.name.as_deref()) },
            EventType::KeyRelease(k) => RawKind::KeyRelease { key: key_name(k, None) },
        };
        sink.publish(RawInput::now(kind));
    });
    if let Err(e) = result {
        error!("input hook failed: {:?}", e);
        *hub.failure.lock() = Some(format!("input hook failed: {:?}", e));
    }
}

pub struct RdevSource;

pub fn source() -> Arc<dyn InputSource> {
    Arc::new(RdevSource)
}

impl InputSource for RdevSource {
    fn subscribe(&self) -> Result<Subscription> {
        let hub = hub();
        if let Some(reason) = hub.failure.lock().clone() {
            return Err(Error::new(ErrorCode::InteractionFailure, reason));
        }
        let (ptx, prx) = bounded(CHANNEL_CAPACITY);
        let (ktx, krx) = bounded(CHANNEL_CAPACITY);
        hub.subscribers.lock().push(Subscriber { pointer: ptx, keyboard: ktx });
        Ok(Subscription { pointer: prx, keyboard: krx })
    }
}

fn button(b: Button) -> MouseButton {
    match b {
        Button::Left => MouseButton::Left,
        Button::Right => MouseButton::Right,
        Button::Middle => MouseButton::Middle,
        Button::Unknown(_) => MouseButton::Other,
    }
}

/// Printable characters as typed, everything else by name (`ctrl_l`, `esc`, ...).
fn key_name(key: Key, typed: Option<&str>) -> String {
    if let Some(s) = typed {
        let mut chars = s.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            if !c.is_control() {
                return c.to_string();
            }
        }
    }
    let name = match key {
        Key::ControlLeft => "ctrl_l",
        Key::ControlRight => "ctrl_r",
        Key::Alt => "alt_l",
        Key::AltGr => "alt_gr",
        Key::ShiftLeft => "shift",
        Key::ShiftRight => "shift_r",
        Key::MetaLeft => "cmd",
        Key::MetaRight => "cmd_r",
        Key::Escape => "esc",
        Key::Return | Key::KpReturn => "enter",
        Key::Tab => "tab",
        Key::Space => "space",
        Key::Backspace => "backspace",
        Key::Delete => "delete",
        Key::UpArrow => "up",
        Key::DownArrow => "down",
        Key::LeftArrow => "left",
        Key::RightArrow => "right",
        Key::Home => "home",
        Key::End => "end",
        Key::PageUp => "page_up",
        Key::PageDown => "page_down",
        Key::Insert => "insert",
        Key::CapsLock => "caps_lock",
        Key::F1 => "f1",
        Key::F2 => "f2",
        Key::F3 => "f3",
        Key::F4 => "f4",
        Key::F5 => "f5",
        Key::F6 => "f6",
        Key::F7 => "f7",
        Key::F8 => "f8",
        Key::F9 => "f9",
        Key::F10 => "f10",
        Key::F11 => "f11",
        Key::F12 => "f12",
        other => return format!("{:?}", other).to_lowercase(),
    };
    name.to_string()
}
