//! deskpilot-recorder - record and replay desktop workflows
//!
//! Pointer presses, scrolls and key presses are captured with timestamps
//! relative to the start of a recording, saved as one JSON file per
//! workflow, and replayed through a [`deskpilot_core::DesktopInput`].
//!
//! ## Platform Support
//!
//! - **native** feature: global hook via rdev (X11, macOS, Windows)
//! - otherwise recording reports `Unsupported`; stored workflows can still
//!   be listed, inspected and replayed through any `DesktopInput`

pub mod events;
pub mod platform;
pub mod recorder;
pub mod replay;
pub mod source;
pub mod storage;

pub use events::*;
pub use recorder::{RecorderConfig, RecordingStatus, StopOutcome, WorkflowRecorder};
pub use replay::{ReplayReport, Replayer};
pub use source::{default_source, InputSource, RawInput, RawKind, Subscription};
pub use storage::WorkflowStorage;

pub mod prelude {
    pub use crate::events::*;
    pub use crate::recorder::{RecorderConfig, RecordingStatus, StopOutcome, WorkflowRecorder};
    pub use crate::replay::{ReplayReport, Replayer};
    pub use crate::storage::WorkflowStorage;
}
