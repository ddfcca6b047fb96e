//! deskpilot-core - building blocks for desktop and browser automation
//!
//! The action model, structured errors, and the collaborators an executor
//! drives: desktop input, a browser session, a planner and an AI capability.
//!
//! ## Backends
//!
//! - **Desktop**: rdev + xcap with the `native` feature, otherwise unsupported
//! - **Browser**: Chromium via DevTools with the `chrome` feature
//! - **AI**: Gemini when an API key is configured, otherwise [`ai::NullAi`]

pub mod action;
pub mod ai;
pub mod browser;
pub mod clock;
pub mod deadline;
pub mod error;
pub mod input;
pub mod keys;
pub mod platform;
pub mod screen;
pub mod selector;

pub use action::{Action, ActionKind, Family, Plan, PlanStep};
pub use ai::{AiCapability, NullAi, Planner, RecoveryRequest, Suggestion};
pub use browser::{BrowserLauncher, BrowserManager, BrowserSession};
pub use clock::{Sleeper, ThreadSleeper};
pub use error::{Error, ErrorCode, Result};
pub use input::{DesktopInput, MouseButton};
pub use screen::{PixelDiffPolicy, ScreenChangePolicy, Screenshot};

pub mod prelude {
    pub use crate::action::{Action, ActionKind, Plan, PlanStep};
    pub use crate::ai::{AiCapability, Planner};
    pub use crate::browser::{BrowserManager, BrowserSession};
    pub use crate::error::{Error, ErrorCode, Result};
    pub use crate::input::{DesktopInput, MouseButton};
    pub use crate::screen::{ScreenChangePolicy, Screenshot};
}

/// The desktop backend compiled into this build.
pub fn desktop() -> std::sync::Arc<dyn DesktopInput> {
    platform::current::desktop()
}
